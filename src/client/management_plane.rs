//! Management plane trait for per-node attribute and operation access
//!
//! This trait abstracts the JMX-over-HTTP bridge exposed by each node's
//! management agent. The base trait carries the two raw verbs (read an
//! attribute, invoke an operation); the typed membership operations are
//! built on top in `ManagementPlaneExt`.
//!
//! Implementations:
//! - `HttpBridge`: one HTTP request per call against the node's agent

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::warn;

use super::payload;
use crate::utils::ManagementError;

/// Management object holding cluster membership state
pub const STORAGE_SERVICE_MBEAN: &str = "org.apache.cassandra.db:type=StorageService";

const HOST_ID_MAP: &str = "HostIdMap";
const UNREACHABLE_NODES: &str = "UnreachableNodes";
const LEAVING_NODES: &str = "LeavingNodes";
const JOINING_NODES: &str = "JoiningNodes";
const LIVE_NODES: &str = "LiveNodes";

const DECOMMISSION: &str = "decommission";
const REMOVE_NODE: &str = "removeNode";

/// Raw management plane verbs
///
/// Each call is a fresh remote request; nothing is cached, batched,
/// or retried at this layer.
pub trait ManagementPlane {
    /// Read one attribute of the storage-service management object
    fn read_attribute(&self, attribute: &str) -> Result<Value, ManagementError>;

    /// Invoke one operation of the storage-service management object
    fn invoke_operation(
        &self,
        operation: &str,
        arguments: &[Value],
    ) -> Result<Value, ManagementError>;
}

/// Extension trait with the typed membership operations
///
/// Every failure path emits a warn-level event before returning the
/// error; callers must not treat logging as handling.
pub trait ManagementPlaneExt: ManagementPlane {
    /// Fetch the address-to-host-ID mapping
    fn host_id_map(&self) -> Result<HashMap<String, String>, ManagementError> {
        let value = self.read_attribute(HOST_ID_MAP).map_err(|e| {
            warn!(error = %e, "could not fetch host ID map");
            e
        })?;
        payload::string_map(HOST_ID_MAP, &value).map_err(|e| {
            warn!(error = %e, "host ID map attribute had unexpected shape");
            e
        })
    }

    /// Resolve the host ID of `target_ip`
    ///
    /// Fails with `HostIdNotFound` when the IP is absent from the map.
    fn resolve_host_id(&self, target_ip: &str) -> Result<String, ManagementError> {
        let mut map = self.host_id_map()?;
        map.remove(target_ip).ok_or_else(|| {
            warn!(target_ip, "no host ID entry for address");
            ManagementError::HostIdNotFound {
                ip: target_ip.to_string(),
            }
        })
    }

    /// List member addresses (the host-ID map key set), unspecified order
    fn member_nodes(&self) -> Result<Vec<String>, ManagementError> {
        Ok(self.host_id_map()?.into_keys().collect())
    }

    /// Number of nodes the target currently considers unreachable
    fn unreachable_count(&self) -> Result<usize, ManagementError> {
        let value = self.read_attribute(UNREACHABLE_NODES).map_err(|e| {
            warn!(error = %e, "could not fetch unreachable nodes");
            e
        })?;
        payload::list_len(UNREACHABLE_NODES, &value).map_err(|e| {
            warn!(error = %e, "unreachable nodes attribute had unexpected shape");
            e
        })
    }

    /// Addresses of nodes currently leaving the ring
    fn leaving_nodes(&self) -> Result<Vec<String>, ManagementError> {
        self.string_list_attribute(LEAVING_NODES)
    }

    /// Addresses of nodes currently joining the ring
    fn joining_nodes(&self) -> Result<Vec<String>, ManagementError> {
        self.string_list_attribute(JOINING_NODES)
    }

    /// Addresses the target currently considers live
    fn live_nodes(&self) -> Result<Vec<String>, ManagementError> {
        self.string_list_attribute(LIVE_NODES)
    }

    /// Ask the target node to decommission itself
    ///
    /// Best-effort: a remote error is logged and still returned.
    fn decommission(&self) -> Result<(), ManagementError> {
        self.invoke_operation(DECOMMISSION, &[])
            .map(|_| ())
            .map_err(|e| {
                warn!(error = %e, "could not decommission node");
                e
            })
    }

    /// Remove `target_ip` from the ring by its host ID
    ///
    /// The host ID is resolved through the same target; a failed
    /// resolution aborts the removal.
    fn remove_node(&self, target_ip: &str) -> Result<(), ManagementError> {
        let host_id = self.resolve_host_id(target_ip)?;
        self.invoke_operation(REMOVE_NODE, &[json!(host_id)])
            .map(|_| ())
            .map_err(|e| {
                warn!(target_ip, error = %e, "could not remove node");
                e
            })
    }

    /// Check whether `own_address` appears in the target's live-node list
    fn check_health(&self, own_address: &str) -> Result<bool, ManagementError> {
        let live = self.live_nodes().map_err(|e| {
            warn!(own_address, error = %e, "health probe failed");
            e
        })?;
        Ok(live.iter().any(|node| node == own_address))
    }

    #[doc(hidden)]
    fn string_list_attribute(
        &self,
        attribute: &'static str,
    ) -> Result<Vec<String>, ManagementError> {
        let value = self.read_attribute(attribute).map_err(|e| {
            warn!(attribute, error = %e, "could not fetch attribute");
            e
        })?;
        payload::string_list(attribute, &value).map_err(|e| {
            warn!(attribute, error = %e, "attribute had unexpected shape");
            e
        })
    }
}

// Blanket implementation: any ManagementPlane gets the typed operations
impl<T: ManagementPlane> ManagementPlaneExt for T {}
