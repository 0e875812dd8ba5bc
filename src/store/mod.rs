//! The stores C2-C6: Node, Way, Relation, PBF Replay Log and
//! Generated-Geometry (spec §4.2-§4.6).

pub mod geometry_store;
pub mod node_store;
pub mod relation_store;
pub mod replay_log;
pub mod way_store;

pub use geometry_store::{GeometryNamespace, GeometryStore};
pub use node_store::NodeStore;
pub use relation_store::{RelationEntry, RelationStore};
pub use replay_log::ReplayLog;
pub use way_store::WayStore;
