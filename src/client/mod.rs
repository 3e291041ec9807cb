//! Management plane access layer

pub mod http_bridge;
pub mod management_plane;
pub mod payload;

pub use http_bridge::{HttpBridge, DEFAULT_MANAGEMENT_PORT};
pub use management_plane::{ManagementPlane, ManagementPlaneExt, STORAGE_SERVICE_MBEAN};
