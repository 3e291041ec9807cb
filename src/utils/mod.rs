//! Utility modules

pub mod error;

pub use error::{
    ConnectionError, ManagementError, ProtocolError, QueryError, Result, TopologyError,
};
