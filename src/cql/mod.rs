//! Structured query plane
//!
//! A minimal CQL v4 client used purely for topology introspection:
//! - Frame codec and body primitives
//! - RESULT/ERROR parsing with typed row values
//! - TCP/TLS connections with the STARTUP handshake
//! - Short-lived sessions running the two membership statements
//!
//! Health probing is not done over this plane; liveness comes from the
//! management plane's live-node attribute.

pub mod connection;
pub mod frame;
pub mod result;
pub mod session;

pub use connection::CqlConnection;
pub use frame::{Consistency, Frame, FrameDecoder, FrameEncoder, Opcode, PROTOCOL_VERSION};
pub use result::{ColumnSpec, ColumnType, CqlResult, CqlValue, Response, Row, RowsResult};
pub use session::{list_members, CqlSession, LOCAL_STATEMENT, NATIVE_PORT, PEERS_STATEMENT};
