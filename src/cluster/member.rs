//! Cluster member records

use serde::Serialize;
use tracing::warn;

use crate::cql::result::{Row, RowsResult};

/// One row of cluster topology from the query plane
///
/// `peer` is the peer address for peer-table rows and the broadcast
/// address for the local row. No deduplication across the two queries
/// is performed at this layer; callers merging both sources should key
/// on `host_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterMember {
    pub peer: String,
    pub data_center: String,
    pub host_id: String,
    pub rack: String,
    pub release_version: String,
    pub rpc_address: String,
}

impl ClusterMember {
    fn from_row(result: &RowsResult, row: &Row, address_column: &str) -> Option<Self> {
        let text = |column: &str| -> Option<String> {
            result.value(row, column)?.as_str().map(str::to_string)
        };
        let inet = |column: &str| -> Option<String> {
            result.value(row, column)?.as_inet().map(|ip| ip.to_string())
        };

        Some(Self {
            peer: inet(address_column)?,
            data_center: text("data_center")?,
            host_id: result.value(row, "host_id")?.as_uuid()?.to_string(),
            rack: text("rack")?,
            release_version: text("release_version")?,
            rpc_address: inet("rpc_address")?,
        })
    }
}

/// Decode rows into member records
///
/// An undecodable row ends the scan; rows already decoded are kept.
pub(crate) fn collect_members(result: &RowsResult, address_column: &str) -> Vec<ClusterMember> {
    let mut members = Vec::with_capacity(result.rows.len());
    for row in &result.rows {
        match ClusterMember::from_row(result, row, address_column) {
            Some(member) => members.push(member),
            None => {
                warn!(
                    address_column,
                    decoded = members.len(),
                    "stopping row scan on undecodable row"
                );
                break;
            }
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::result::{ColumnSpec, ColumnType, CqlValue};
    use std::net::{IpAddr, Ipv4Addr};
    use uuid::Uuid;

    const HOST_ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    fn peer_columns() -> Vec<ColumnSpec> {
        [
            ("peer", ColumnType::Inet),
            ("data_center", ColumnType::Varchar),
            ("host_id", ColumnType::Uuid),
            ("rack", ColumnType::Varchar),
            ("release_version", ColumnType::Varchar),
            ("rpc_address", ColumnType::Inet),
        ]
        .into_iter()
        .map(|(name, ty)| ColumnSpec {
            name: name.to_string(),
            ty,
        })
        .collect()
    }

    fn peer_row(last_octet: u8) -> Row {
        Row {
            values: vec![
                CqlValue::Inet(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet))),
                CqlValue::Varchar("dc1".to_string()),
                CqlValue::Uuid(Uuid::parse_str(HOST_ID).unwrap()),
                CqlValue::Varchar("rack1".to_string()),
                CqlValue::Varchar("4.1.3".to_string()),
                CqlValue::Inet(IpAddr::V4(Ipv4Addr::new(10, 0, 1, last_octet))),
            ],
        }
    }

    #[test]
    fn test_collect_members_maps_fields_verbatim() {
        let result = RowsResult {
            columns: peer_columns(),
            rows: vec![peer_row(1), peer_row(2)],
        };

        let members = collect_members(&result, "peer");
        assert_eq!(members.len(), 2);
        assert_eq!(
            members[0],
            ClusterMember {
                peer: "10.0.0.1".to_string(),
                data_center: "dc1".to_string(),
                host_id: HOST_ID.to_string(),
                rack: "rack1".to_string(),
                release_version: "4.1.3".to_string(),
                rpc_address: "10.0.1.1".to_string(),
            }
        );
        assert_eq!(members[1].peer, "10.0.0.2");
    }

    #[test]
    fn test_collect_members_reads_local_address_column() {
        let mut columns = peer_columns();
        columns[0].name = "broadcast_address".to_string();
        let result = RowsResult {
            columns,
            rows: vec![peer_row(9)],
        };

        let members = collect_members(&result, "broadcast_address");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].peer, "10.0.0.9");
    }

    #[test]
    fn test_collect_members_truncates_on_undecodable_row() {
        let mut bad_row = peer_row(3);
        bad_row.values[2] = CqlValue::Null; // host_id missing

        let result = RowsResult {
            columns: peer_columns(),
            rows: vec![peer_row(1), bad_row, peer_row(4)],
        };

        // scan stops at the bad row; the row after it is not reached
        let members = collect_members(&result, "peer");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].peer, "10.0.0.1");
    }

    #[test]
    fn test_collect_members_requires_address_column() {
        let result = RowsResult {
            columns: peer_columns(),
            rows: vec![peer_row(1)],
        };
        assert!(collect_members(&result, "broadcast_address").is_empty());
    }
}
