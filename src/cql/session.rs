//! Short-lived introspection sessions
//!
//! A session is opened against one address from a caller-supplied
//! allow-list, used for the two fixed membership statements, and
//! dropped. Nothing outside the allow-list is ever dialed.

use tracing::warn;

use crate::cluster::member::{collect_members, ClusterMember};
use crate::config::TlsConfig;
use crate::utils::QueryError;

use super::connection::CqlConnection;

/// Default native transport port
pub const NATIVE_PORT: u16 = 9042;

pub const PEERS_STATEMENT: &str = "SELECT peer, data_center, host_id, preferred_ip, rack, release_version, rpc_address FROM system.peers";
pub const LOCAL_STATEMENT: &str = "SELECT broadcast_address, data_center, host_id, rack, release_version, rpc_address FROM system.local";

/// An established query-plane session
#[derive(Debug)]
pub struct CqlSession {
    conn: CqlConnection,
}

impl CqlSession {
    /// Connect to the first reachable address of the allow-list
    pub fn connect(addresses: &[String], tls: Option<&TlsConfig>) -> Result<Self, QueryError> {
        let mut last_error = String::from("no addresses supplied");

        for address in addresses {
            let (host, port) = split_address(address);
            match CqlConnection::connect(host, port, tls) {
                Ok(mut conn) => match conn.startup() {
                    Ok(()) => return Ok(Self { conn }),
                    Err(e) => {
                        warn!(address = %address, error = %e, "startup handshake failed");
                        last_error = e.to_string();
                    }
                },
                Err(e) => {
                    warn!(address = %address, error = %e, "connect failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(QueryError::SessionFailed(last_error))
    }

    /// List cluster members: every peer-table row, then the local row
    ///
    /// An undecodable row truncates that query's scan; rows already
    /// decoded are kept.
    pub fn list_members(&mut self) -> Result<Vec<ClusterMember>, QueryError> {
        let peers = self.conn.query(PEERS_STATEMENT)?;
        let mut members = collect_members(&peers, "peer");

        let local = self.conn.query(LOCAL_STATEMENT)?;
        members.extend(collect_members(&local, "broadcast_address"));

        Ok(members)
    }
}

/// One-shot member listing over a fresh session
///
/// The session is dropped unconditionally before returning, closing
/// its socket.
pub fn list_members(
    addresses: &[String],
    tls: Option<&TlsConfig>,
) -> Result<Vec<ClusterMember>, QueryError> {
    let mut session = CqlSession::connect(addresses, tls)?;
    session.list_members()
}

/// Split "host:port", defaulting to the native transport port
///
/// A bare IPv6 literal (more than one colon) is used whole.
fn split_address(address: &str) -> (&str, u16) {
    if address.matches(':').count() == 1 {
        if let Some((host, port_str)) = address.split_once(':') {
            if let Ok(port) = port_str.parse::<u16>() {
                return (host, port);
            }
        }
    }
    (address, NATIVE_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_address_with_port() {
        assert_eq!(split_address("10.0.0.1:9142"), ("10.0.0.1", 9142));
    }

    #[test]
    fn test_split_address_defaults_native_port() {
        assert_eq!(split_address("10.0.0.1"), ("10.0.0.1", NATIVE_PORT));
    }

    #[test]
    fn test_split_address_bare_ipv6_literal() {
        assert_eq!(split_address("fe80::1"), ("fe80::1", NATIVE_PORT));
    }

    #[test]
    fn test_connect_empty_allow_list_is_session_failure() {
        let err = CqlSession::connect(&[], None).unwrap_err();
        assert!(matches!(err, QueryError::SessionFailed(_)));
    }

    // Requires a running Cassandra node
    #[test]
    #[ignore]
    fn test_live_list_members() {
        let members =
            list_members(&["127.0.0.1".to_string()], None).expect("list members failed");
        assert!(!members.is_empty());
    }
}
