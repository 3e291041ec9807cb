//! CQL binary protocol framing (version 4)
//!
//! This module provides buffer-backed encoding for the two request
//! frames this layer sends (STARTUP, QUERY) and streaming decoding of
//! response frames. Body-level primitives ([short], [int], [string],
//! [long string], [bytes], [string list], [string map]) live on
//! `FrameEncoder` and `ByteCursor`.

use std::io::BufRead;

use crate::utils::ProtocolError;

/// Protocol version this client pins
pub const PROTOCOL_VERSION: u8 = 0x04;

const REQUEST_VERSION: u8 = PROTOCOL_VERSION;
const RESPONSE_VERSION: u8 = PROTOCOL_VERSION | 0x80;
const HEADER_LEN: usize = 9;
// Per the protocol spec, frame bodies are capped at 256MB.
const MAX_BODY_LEN: u32 = 256 * 1024 * 1024;

/// Frame header flag bits
pub mod flags {
    pub const COMPRESSED: u8 = 0x01;
    pub const TRACING: u8 = 0x02;
    pub const CUSTOM_PAYLOAD: u8 = 0x04;
    pub const WARNING: u8 = 0x08;
}

/// Frame opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Error,
    Startup,
    Ready,
    Authenticate,
    Options,
    Supported,
    Query,
    Result,
    Prepare,
    Execute,
    Register,
    Event,
    Batch,
    AuthChallenge,
    AuthResponse,
    AuthSuccess,
}

impl Opcode {
    fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        Ok(match byte {
            0x00 => Opcode::Error,
            0x01 => Opcode::Startup,
            0x02 => Opcode::Ready,
            0x03 => Opcode::Authenticate,
            0x05 => Opcode::Options,
            0x06 => Opcode::Supported,
            0x07 => Opcode::Query,
            0x08 => Opcode::Result,
            0x09 => Opcode::Prepare,
            0x0A => Opcode::Execute,
            0x0B => Opcode::Register,
            0x0C => Opcode::Event,
            0x0D => Opcode::Batch,
            0x0E => Opcode::AuthChallenge,
            0x0F => Opcode::AuthResponse,
            0x10 => Opcode::AuthSuccess,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        })
    }

    fn byte(self) -> u8 {
        match self {
            Opcode::Error => 0x00,
            Opcode::Startup => 0x01,
            Opcode::Ready => 0x02,
            Opcode::Authenticate => 0x03,
            Opcode::Options => 0x05,
            Opcode::Supported => 0x06,
            Opcode::Query => 0x07,
            Opcode::Result => 0x08,
            Opcode::Prepare => 0x09,
            Opcode::Execute => 0x0A,
            Opcode::Register => 0x0B,
            Opcode::Event => 0x0C,
            Opcode::Batch => 0x0D,
            Opcode::AuthChallenge => 0x0E,
            Opcode::AuthResponse => 0x0F,
            Opcode::AuthSuccess => 0x10,
        }
    }

    /// Wire name, used in protocol errors
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Error => "ERROR",
            Opcode::Startup => "STARTUP",
            Opcode::Ready => "READY",
            Opcode::Authenticate => "AUTHENTICATE",
            Opcode::Options => "OPTIONS",
            Opcode::Supported => "SUPPORTED",
            Opcode::Query => "QUERY",
            Opcode::Result => "RESULT",
            Opcode::Prepare => "PREPARE",
            Opcode::Execute => "EXECUTE",
            Opcode::Register => "REGISTER",
            Opcode::Event => "EVENT",
            Opcode::Batch => "BATCH",
            Opcode::AuthChallenge => "AUTH_CHALLENGE",
            Opcode::AuthResponse => "AUTH_RESPONSE",
            Opcode::AuthSuccess => "AUTH_SUCCESS",
        }
    }
}

/// Query consistency levels used by this layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Consistency {
    One = 0x0001,
    Quorum = 0x0004,
    LocalQuorum = 0x0006,
    LocalOne = 0x000A,
}

/// One decoded response frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub opcode: Opcode,
    pub flags: u8,
    pub stream: i16,
    pub body: Vec<u8>,
}

/// Frame encoder with pre-allocated buffer
pub struct FrameEncoder {
    buf: Vec<u8>,
    body_start: usize,
}

impl FrameEncoder {
    /// Create new encoder with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            body_start: 0,
        }
    }

    /// Clear buffer for reuse
    pub fn clear(&mut self) {
        self.buf.clear();
        self.body_start = 0;
    }

    /// Get encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Encode a STARTUP frame
    pub fn encode_startup(&mut self, stream: i16) {
        self.begin_frame(Opcode::Startup, stream);
        self.write_string_map(&[("CQL_VERSION", "3.0.0")]);
        self.end_frame();
    }

    /// Encode a QUERY frame carrying one unprepared statement
    pub fn encode_query(&mut self, stream: i16, statement: &str, consistency: Consistency) {
        self.begin_frame(Opcode::Query, stream);
        self.write_long_string(statement);
        self.write_short(consistency as u16);
        self.buf.push(0x00); // no query flags: no values, metadata wanted
        self.end_frame();
    }

    fn begin_frame(&mut self, opcode: Opcode, stream: i16) {
        self.buf.push(REQUEST_VERSION);
        self.buf.push(0x00);
        self.buf.extend_from_slice(&stream.to_be_bytes());
        self.buf.push(opcode.byte());
        self.buf.extend_from_slice(&[0u8; 4]);
        self.body_start = self.buf.len();
    }

    fn end_frame(&mut self) {
        let body_len = (self.buf.len() - self.body_start) as u32;
        let at = self.body_start - 4;
        self.buf[at..at + 4].copy_from_slice(&body_len.to_be_bytes());
    }

    fn write_short(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_int(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_string(&mut self, value: &str) {
        self.write_short(value.len() as u16);
        self.buf.extend_from_slice(value.as_bytes());
    }

    fn write_long_string(&mut self, value: &str) {
        self.write_int(value.len() as i32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    fn write_string_map(&mut self, pairs: &[(&str, &str)]) {
        self.write_short(pairs.len() as u16);
        for (key, value) in pairs {
            self.write_string(key);
            self.write_string(value);
        }
    }
}

/// Frame decoder for streaming reads
pub struct FrameDecoder<R> {
    reader: R,
}

impl<R: BufRead> FrameDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Decode the next response frame from the stream
    pub fn decode(&mut self) -> Result<Frame, ProtocolError> {
        let mut header = [0u8; HEADER_LEN];
        self.reader.read_exact(&mut header)?;

        if header[0] != RESPONSE_VERSION {
            return Err(ProtocolError::UnsupportedVersion(header[0]));
        }

        let flags = header[1];
        let stream = i16::from_be_bytes([header[2], header[3]]);
        let opcode = Opcode::from_byte(header[4])?;
        let length = u32::from_be_bytes([header[5], header[6], header[7], header[8]]);

        if length > MAX_BODY_LEN {
            return Err(ProtocolError::FrameTooLarge(length));
        }

        let mut body = vec![0u8; length as usize];
        self.reader.read_exact(&mut body)?;

        Ok(Frame {
            opcode,
            flags,
            stream,
            body,
        })
    }
}

/// Primitive reader over a frame body
pub struct ByteCursor<'a> {
    buf: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], ProtocolError> {
        if self.buf.len() < len {
            return Err(ProtocolError::Truncated(what));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn skip(&mut self, len: usize, what: &'static str) -> Result<(), ProtocolError> {
        self.take(len, what).map(|_| ())
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.take(1, what)?[0])
    }

    pub fn read_short(&mut self, what: &'static str) -> Result<u16, ProtocolError> {
        let raw = self.take(2, what)?;
        Ok(u16::from_be_bytes([raw[0], raw[1]]))
    }

    pub fn read_int(&mut self, what: &'static str) -> Result<i32, ProtocolError> {
        let raw = self.take(4, what)?;
        Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Read a [string]: short length followed by UTF-8 bytes
    pub fn read_string(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        let len = self.read_short(what)? as usize;
        let raw = self.take(len, what)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|source| ProtocolError::InvalidUtf8 { what, source })
    }

    /// Read a [string list]: short count followed by that many [string]s
    pub fn read_string_list(&mut self, what: &'static str) -> Result<Vec<String>, ProtocolError> {
        let count = self.read_short(what)? as usize;
        let mut list = Vec::with_capacity(count);
        for _ in 0..count {
            list.push(self.read_string(what)?);
        }
        Ok(list)
    }

    /// Read a [bytes] value: int length (negative means null) and payload
    pub fn read_bytes(&mut self, what: &'static str) -> Result<Option<&'a [u8]>, ProtocolError> {
        let len = self.read_int(what)?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize, what)?))
    }

    /// Skip a [bytes map]: short count of [string] keys with [bytes] values
    pub fn skip_bytes_map(&mut self, what: &'static str) -> Result<(), ProtocolError> {
        let count = self.read_short(what)?;
        for _ in 0..count {
            self.read_string(what)?;
            self.read_bytes(what)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_startup_layout() {
        let mut encoder = FrameEncoder::with_capacity(64);
        encoder.encode_startup(0);

        let bytes = encoder.as_bytes();
        // header: version, flags, stream, opcode, body length
        assert_eq!(&bytes[..9], &[0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 22]);
        // body: one-entry string map
        assert_eq!(&bytes[9..11], &[0x00, 0x01]);
        assert_eq!(&bytes[11..13], &[0x00, 11]);
        assert_eq!(&bytes[13..24], b"CQL_VERSION");
        assert_eq!(&bytes[24..26], &[0x00, 5]);
        assert_eq!(&bytes[26..], b"3.0.0");
    }

    #[test]
    fn test_encode_query_layout() {
        let mut encoder = FrameEncoder::with_capacity(64);
        encoder.encode_query(1, "SELECT 1", Consistency::One);

        let bytes = encoder.as_bytes();
        assert_eq!(bytes[0], 0x04);
        assert_eq!(&bytes[2..4], &[0x00, 0x01]); // stream
        assert_eq!(bytes[4], 0x07); // QUERY
        assert_eq!(&bytes[5..9], &15u32.to_be_bytes());
        assert_eq!(&bytes[9..13], &8i32.to_be_bytes()); // long string length
        assert_eq!(&bytes[13..21], b"SELECT 1");
        assert_eq!(&bytes[21..23], &[0x00, 0x01]); // consistency ONE
        assert_eq!(bytes[23], 0x00); // query flags
    }

    #[test]
    fn test_encoder_clear_resets_frame_state() {
        let mut encoder = FrameEncoder::with_capacity(64);
        encoder.encode_startup(0);
        let first = encoder.as_bytes().to_vec();
        encoder.clear();
        encoder.encode_startup(0);
        assert_eq!(encoder.as_bytes(), &first[..]);
    }

    #[test]
    fn test_decode_ready_frame() {
        let data = [0x84, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00];
        let mut decoder = FrameDecoder::new(Cursor::new(&data[..]));
        let frame = decoder.decode().unwrap();
        assert_eq!(frame.opcode, Opcode::Ready);
        assert_eq!(frame.stream, 0);
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_decode_frame_with_body() {
        let mut data = vec![0x84, 0x08, 0x00, 0x07, 0x08, 0x00, 0x00, 0x00, 0x03];
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let mut decoder = FrameDecoder::new(Cursor::new(&data[..]));
        let frame = decoder.decode().unwrap();
        assert_eq!(frame.opcode, Opcode::Result);
        assert_eq!(frame.flags, flags::WARNING);
        assert_eq!(frame.stream, 7);
        assert_eq!(frame.body, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_decode_rejects_request_version() {
        let data = [0x04, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00];
        let mut decoder = FrameDecoder::new(Cursor::new(&data[..]));
        assert!(matches!(
            decoder.decode().unwrap_err(),
            ProtocolError::UnsupportedVersion(0x04)
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_opcode() {
        let data = [0x84, 0x00, 0x00, 0x00, 0x99, 0x00, 0x00, 0x00, 0x00];
        let mut decoder = FrameDecoder::new(Cursor::new(&data[..]));
        assert!(matches!(
            decoder.decode().unwrap_err(),
            ProtocolError::UnknownOpcode(0x99)
        ));
    }

    #[test]
    fn test_cursor_primitives() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x00, 0x03]); // short
        body.extend_from_slice(&7i32.to_be_bytes()); // int
        body.extend_from_slice(&[0x00, 0x02]); // string "hi"
        body.extend_from_slice(b"hi");

        let mut cursor = ByteCursor::new(&body);
        assert_eq!(cursor.read_short("short").unwrap(), 3);
        assert_eq!(cursor.read_int("int").unwrap(), 7);
        assert_eq!(cursor.read_string("string").unwrap(), "hi");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_cursor_null_bytes() {
        let body = (-1i32).to_be_bytes();
        let mut cursor = ByteCursor::new(&body);
        assert_eq!(cursor.read_bytes("value").unwrap(), None);
    }

    #[test]
    fn test_cursor_truncated_read_names_context() {
        let mut cursor = ByteCursor::new(&[0x00]);
        assert!(matches!(
            cursor.read_int("row count").unwrap_err(),
            ProtocolError::Truncated("row count")
        ));
    }

    #[test]
    fn test_cursor_string_list() {
        let mut body = vec![0x00, 0x02];
        body.extend_from_slice(&[0x00, 0x01]);
        body.extend_from_slice(b"a");
        body.extend_from_slice(&[0x00, 0x01]);
        body.extend_from_slice(b"b");

        let mut cursor = ByteCursor::new(&body);
        assert_eq!(
            cursor.read_string_list("warnings").unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
