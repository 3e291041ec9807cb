//! Point-in-time membership snapshots

use serde::Serialize;

use crate::client::{ManagementPlane, ManagementPlaneExt};
use crate::utils::ManagementError;

/// Membership facts gathered from one node's management plane
///
/// One round of attribute reads; nothing is cached or refreshed. The
/// member list order is unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopologySnapshot {
    pub members: Vec<String>,
    pub down_count: usize,
    pub joining: Vec<String>,
    pub leaving: Vec<String>,
}

impl TopologySnapshot {
    /// Collect one snapshot through the given management plane
    pub fn gather<P: ManagementPlane>(plane: &P) -> Result<Self, ManagementError> {
        Ok(Self {
            members: plane.member_nodes()?,
            down_count: plane.unreachable_count()?,
            joining: plane.joining_nodes()?,
            leaving: plane.leaving_nodes()?,
        })
    }

    /// Number of known members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// True when no node is down, joining, or leaving
    pub fn is_settled(&self) -> bool {
        self.down_count == 0 && self.joining.is_empty() && self.leaving.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct RecordingPlane {
        attributes: HashMap<String, Value>,
        reads: RefCell<Vec<String>>,
    }

    impl RecordingPlane {
        fn new() -> Self {
            let mut attributes = HashMap::new();
            attributes.insert(
                "HostIdMap".to_string(),
                json!({"10.0.0.1": "id1", "10.0.0.2": "id2"}),
            );
            attributes.insert("UnreachableNodes".to_string(), json!(["10.0.0.2"]));
            attributes.insert("JoiningNodes".to_string(), json!(["10.0.0.3"]));
            attributes.insert("LeavingNodes".to_string(), json!([]));
            Self {
                attributes,
                reads: RefCell::new(Vec::new()),
            }
        }
    }

    impl ManagementPlane for RecordingPlane {
        fn read_attribute(&self, attribute: &str) -> Result<Value, ManagementError> {
            self.reads.borrow_mut().push(attribute.to_string());
            Ok(self.attributes[attribute].clone())
        }

        fn invoke_operation(
            &self,
            _operation: &str,
            _arguments: &[Value],
        ) -> Result<Value, ManagementError> {
            unreachable!("snapshot gathering must not invoke operations")
        }
    }

    #[test]
    fn test_gather_maps_each_attribute() {
        let plane = RecordingPlane::new();
        let snapshot = TopologySnapshot::gather(&plane).unwrap();

        let mut members = snapshot.members.clone();
        members.sort();
        assert_eq!(members, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(snapshot.down_count, 1);
        assert_eq!(snapshot.joining, vec!["10.0.0.3"]);
        assert!(snapshot.leaving.is_empty());
        assert_eq!(snapshot.member_count(), 2);
    }

    #[test]
    fn test_gather_reads_each_attribute_once() {
        let plane = RecordingPlane::new();
        TopologySnapshot::gather(&plane).unwrap();

        let mut reads = plane.reads.borrow().clone();
        reads.sort();
        assert_eq!(
            reads,
            vec!["HostIdMap", "JoiningNodes", "LeavingNodes", "UnreachableNodes"]
        );
    }

    #[test]
    fn test_gather_propagates_read_failure() {
        struct FailingPlane;
        impl ManagementPlane for FailingPlane {
            fn read_attribute(&self, attribute: &str) -> Result<Value, ManagementError> {
                Err(ManagementError::Status {
                    url: "mock".to_string(),
                    status: 503,
                    message: format!("{attribute} unavailable"),
                })
            }
            fn invoke_operation(
                &self,
                _operation: &str,
                _arguments: &[Value],
            ) -> Result<Value, ManagementError> {
                unreachable!()
            }
        }

        assert!(TopologySnapshot::gather(&FailingPlane).is_err());
    }

    #[test]
    fn test_settled_snapshot() {
        let snapshot = TopologySnapshot {
            members: vec!["10.0.0.1".to_string()],
            down_count: 0,
            joining: vec![],
            leaving: vec![],
        };
        assert!(snapshot.is_settled());

        let busy = TopologySnapshot {
            joining: vec!["10.0.0.4".to_string()],
            ..snapshot
        };
        assert!(!busy.is_settled());
    }
}
