//! Error types for cassandra-topology

use std::io;
use thiserror::Error;

/// Top-level library error
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("management plane error: {0}")]
    Management(#[from] ManagementError),

    #[error("query plane error: {0}")]
    Query(#[from] QueryError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from the HTTP management bridge
#[derive(Error, Debug)]
pub enum ManagementError {
    #[error("management request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("management endpoint {url} returned status {status}: {message}")]
    Status {
        url: String,
        status: u64,
        message: String,
    },

    #[error("attribute {attribute} is not {expected} (got {found})")]
    ShapeMismatch {
        attribute: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("no host ID known for {ip}")]
    HostIdNotFound { ip: String },
}

/// Connection-related errors on the query plane
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("TLS handshake failed: {0}")]
    TlsFailed(String),

    #[error("server requires authentication ({0}), none configured")]
    AuthRequired(String),

    #[error("connection closed unexpectedly")]
    Closed,
}

/// CQL wire protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("unsupported protocol version byte 0x{0:02X}")]
    UnsupportedVersion(u8),

    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("unexpected {actual} frame (expected {expected})")]
    UnexpectedFrame {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("frame body of {0} bytes exceeds protocol limit")]
    FrameTooLarge(u32),

    #[error("truncated frame body while reading {0}")]
    Truncated(&'static str),

    #[error("invalid UTF-8 in {what}: {source}")]
    InvalidUtf8 {
        what: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("result frame omitted column metadata")]
    NoMetadata,

    #[error("server error 0x{code:04X}: {message}")]
    Server { code: i32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced by the structured query client
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("session creation failed: {0}")]
    SessionFailed(String),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, TopologyError>;
