//! Response body parsing for the query plane
//!
//! Decodes the frames this layer cares about (READY, AUTHENTICATE,
//! ERROR, RESULT Rows) and the row values the introspection queries
//! produce. Value decoding is typed for text, uuid, inet, int, bigint,
//! boolean and blob columns; anything else is carried as raw bytes.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::warn;
use uuid::Uuid;

use super::frame::{flags, ByteCursor, Frame, Opcode};
use crate::utils::ProtocolError;

const KIND_VOID: i32 = 0x0001;
const KIND_ROWS: i32 = 0x0002;

const GLOBAL_TABLES_SPEC: i32 = 0x0001;
const HAS_MORE_PAGES: i32 = 0x0002;
const NO_METADATA: i32 = 0x0004;

/// Parsed response frame
#[derive(Debug)]
pub enum Response {
    Ready,
    Authenticate(String),
    Result(CqlResult),
    Other(Opcode),
}

impl Response {
    /// Parse a response frame; ERROR frames surface as `Server` errors
    pub fn parse(frame: &Frame) -> Result<Response, ProtocolError> {
        let mut cursor = ByteCursor::new(&frame.body);
        strip_envelope(frame.flags, &mut cursor)?;

        match frame.opcode {
            Opcode::Error => {
                let code = cursor.read_int("error code")?;
                let message = cursor.read_string("error message")?;
                Err(ProtocolError::Server { code, message })
            }
            Opcode::Ready => Ok(Response::Ready),
            Opcode::Authenticate => Ok(Response::Authenticate(
                cursor.read_string("authenticator class")?,
            )),
            Opcode::Result => Ok(Response::Result(CqlResult::parse(&mut cursor)?)),
            other => Ok(Response::Other(other)),
        }
    }

    /// Wire name, used in protocol errors
    pub fn name(&self) -> &'static str {
        match self {
            Response::Ready => "READY",
            Response::Authenticate(_) => "AUTHENTICATE",
            Response::Result(_) => "RESULT",
            Response::Other(opcode) => opcode.name(),
        }
    }
}

/// Consume the optional prefixes the frame flags announce
fn strip_envelope(frame_flags: u8, cursor: &mut ByteCursor) -> Result<(), ProtocolError> {
    if frame_flags & flags::COMPRESSED != 0 {
        // Compression is never negotiated by this client.
        return Err(ProtocolError::UnexpectedFrame {
            expected: "uncompressed body",
            actual: "compressed body",
        });
    }
    if frame_flags & flags::TRACING != 0 {
        cursor.skip(16, "tracing ID")?;
    }
    if frame_flags & flags::WARNING != 0 {
        for warning in cursor.read_string_list("warnings")? {
            warn!(warning = %warning, "server warning");
        }
    }
    if frame_flags & flags::CUSTOM_PAYLOAD != 0 {
        cursor.skip_bytes_map("custom payload")?;
    }
    Ok(())
}

/// RESULT frame payloads
#[derive(Debug)]
pub enum CqlResult {
    Void,
    Rows(RowsResult),
    Other(i32),
}

impl CqlResult {
    fn parse(cursor: &mut ByteCursor) -> Result<Self, ProtocolError> {
        match cursor.read_int("result kind")? {
            KIND_VOID => Ok(CqlResult::Void),
            KIND_ROWS => Ok(CqlResult::Rows(RowsResult::parse(cursor)?)),
            other => Ok(CqlResult::Other(other)),
        }
    }
}

/// Column types appearing in result metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Custom(String),
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    Inet,
    Date,
    Time,
    Smallint,
    Tinyint,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
    Udt(Vec<(String, ColumnType)>),
    Tuple(Vec<ColumnType>),
    Other(u16),
}

impl ColumnType {
    fn parse(cursor: &mut ByteCursor) -> Result<Self, ProtocolError> {
        Ok(match cursor.read_short("type option")? {
            0x0000 => ColumnType::Custom(cursor.read_string("custom type class")?),
            0x0001 => ColumnType::Ascii,
            0x0002 => ColumnType::Bigint,
            0x0003 => ColumnType::Blob,
            0x0004 => ColumnType::Boolean,
            0x0005 => ColumnType::Counter,
            0x0006 => ColumnType::Decimal,
            0x0007 => ColumnType::Double,
            0x0008 => ColumnType::Float,
            0x0009 => ColumnType::Int,
            0x000B => ColumnType::Timestamp,
            0x000C => ColumnType::Uuid,
            0x000D => ColumnType::Varchar,
            0x000E => ColumnType::Varint,
            0x000F => ColumnType::Timeuuid,
            0x0010 => ColumnType::Inet,
            0x0011 => ColumnType::Date,
            0x0012 => ColumnType::Time,
            0x0013 => ColumnType::Smallint,
            0x0014 => ColumnType::Tinyint,
            0x0020 => ColumnType::List(Box::new(Self::parse(cursor)?)),
            0x0021 => ColumnType::Map(
                Box::new(Self::parse(cursor)?),
                Box::new(Self::parse(cursor)?),
            ),
            0x0022 => ColumnType::Set(Box::new(Self::parse(cursor)?)),
            0x0030 => {
                cursor.read_string("udt keyspace")?;
                cursor.read_string("udt name")?;
                let count = cursor.read_short("udt field count")?;
                let mut fields = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = cursor.read_string("udt field name")?;
                    fields.push((name, Self::parse(cursor)?));
                }
                ColumnType::Udt(fields)
            }
            0x0031 => {
                let count = cursor.read_short("tuple arity")?;
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    elements.push(Self::parse(cursor)?);
                }
                ColumnType::Tuple(elements)
            }
            other => ColumnType::Other(other),
        })
    }

    /// Decode one non-null cell of this type
    fn decode(&self, bytes: &[u8]) -> Result<CqlValue, ProtocolError> {
        Ok(match self {
            ColumnType::Ascii => CqlValue::Ascii(utf8(bytes, "ascii value")?),
            ColumnType::Varchar => CqlValue::Varchar(utf8(bytes, "varchar value")?),
            ColumnType::Boolean => {
                if bytes.len() != 1 {
                    return Err(ProtocolError::Truncated("boolean value"));
                }
                CqlValue::Boolean(bytes[0] != 0)
            }
            ColumnType::Int => {
                let raw: [u8; 4] = bytes
                    .try_into()
                    .map_err(|_| ProtocolError::Truncated("int value"))?;
                CqlValue::Int(i32::from_be_bytes(raw))
            }
            ColumnType::Bigint | ColumnType::Counter => {
                let raw: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| ProtocolError::Truncated("bigint value"))?;
                CqlValue::Bigint(i64::from_be_bytes(raw))
            }
            ColumnType::Uuid => CqlValue::Uuid(decode_uuid(bytes)?),
            ColumnType::Timeuuid => CqlValue::Timeuuid(decode_uuid(bytes)?),
            ColumnType::Inet => CqlValue::Inet(decode_inet(bytes)?),
            ColumnType::Blob => CqlValue::Blob(bytes.to_vec()),
            _ => CqlValue::Raw(bytes.to_vec()),
        })
    }
}

fn utf8(bytes: &[u8], what: &'static str) -> Result<String, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|source| ProtocolError::InvalidUtf8 { what, source })
}

fn decode_uuid(bytes: &[u8]) -> Result<Uuid, ProtocolError> {
    Uuid::from_slice(bytes).map_err(|_| ProtocolError::Truncated("uuid value"))
}

fn decode_inet(bytes: &[u8]) -> Result<IpAddr, ProtocolError> {
    if let Ok(raw) = <[u8; 4]>::try_from(bytes) {
        return Ok(IpAddr::V4(Ipv4Addr::from(raw)));
    }
    if let Ok(raw) = <[u8; 16]>::try_from(bytes) {
        return Ok(IpAddr::V6(Ipv6Addr::from(raw)));
    }
    Err(ProtocolError::Truncated("inet value"))
}

/// One decoded cell
#[derive(Debug, Clone, PartialEq)]
pub enum CqlValue {
    Null,
    Ascii(String),
    Varchar(String),
    Boolean(bool),
    Int(i32),
    Bigint(i64),
    Uuid(Uuid),
    Timeuuid(Uuid),
    Inet(IpAddr),
    Blob(Vec<u8>),
    Raw(Vec<u8>),
}

impl CqlValue {
    /// Get as text (ascii or varchar)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CqlValue::Ascii(s) | CqlValue::Varchar(s) => Some(s),
            _ => None,
        }
    }

    /// Get as UUID (uuid or timeuuid)
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            CqlValue::Uuid(u) | CqlValue::Timeuuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Get as IP address
    pub fn as_inet(&self) -> Option<IpAddr> {
        match self {
            CqlValue::Inet(ip) => Some(*ip),
            _ => None,
        }
    }
}

/// Column name and type from result metadata
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
}

/// One decoded row
#[derive(Debug, Clone)]
pub struct Row {
    pub values: Vec<CqlValue>,
}

/// A decoded Rows result
#[derive(Debug, Clone)]
pub struct RowsResult {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
}

impl RowsResult {
    fn parse(cursor: &mut ByteCursor) -> Result<Self, ProtocolError> {
        let meta_flags = cursor.read_int("metadata flags")?;
        let column_count = cursor.read_int("column count")?;

        if meta_flags & HAS_MORE_PAGES != 0 {
            cursor.read_bytes("paging state")?;
        }
        if meta_flags & NO_METADATA != 0 {
            return Err(ProtocolError::NoMetadata);
        }

        let global = meta_flags & GLOBAL_TABLES_SPEC != 0;
        if global {
            cursor.read_string("keyspace")?;
            cursor.read_string("table")?;
        }

        let mut columns = Vec::with_capacity(column_count.max(0) as usize);
        for _ in 0..column_count {
            if !global {
                cursor.read_string("keyspace")?;
                cursor.read_string("table")?;
            }
            let name = cursor.read_string("column name")?;
            let ty = ColumnType::parse(cursor)?;
            columns.push(ColumnSpec { name, ty });
        }

        let row_count = cursor.read_int("row count")?;
        let mut rows = Vec::with_capacity(row_count.max(0) as usize);
        for _ in 0..row_count {
            let mut values = Vec::with_capacity(columns.len());
            for spec in &columns {
                let value = match cursor.read_bytes("row value")? {
                    None => CqlValue::Null,
                    Some(bytes) => spec.ty.decode(bytes)?,
                };
                values.push(value);
            }
            rows.push(Row { values });
        }

        Ok(RowsResult { columns, rows })
    }

    /// Index of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|spec| spec.name == name)
    }

    /// Value of a named column in `row`
    pub fn value<'a>(&self, row: &'a Row, name: &str) -> Option<&'a CqlValue> {
        row.values.get(self.column_index(name)?)
    }
}
