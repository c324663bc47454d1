//! Shard connections, projections and coordinated writes
//!
//! Every query in this crate goes through a [`ShardHandle`], and every column
//! list comes from the projection table in [`projection`].

pub mod coordinator;
pub mod keys;
pub mod locks;
pub mod projection;
pub mod registry;
pub mod repository;
pub mod schema;

pub use coordinator::{GeneratedKeys, InsertPlan, Stage, Target};
pub use projection::{
    project, reconstruct, Canonical, CanonicalEntity, ColumnSet, EntityKind, FieldValue,
    PartialRow,
};
pub use registry::{ShardHandle, ShardRegistry, ShardStats};
