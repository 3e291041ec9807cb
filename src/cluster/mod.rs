//! Cluster membership records and snapshots

pub mod member;
pub mod snapshot;

pub use member::ClusterMember;
pub use snapshot::TopologySnapshot;
