//! Federated sales data access
//!
//! One global shard and four local shards hold the same logical entities under
//! per-shard table names and column subsets. This crate resolves shard names
//! to connection pools, projects canonical entities onto each shard's column
//! set, coordinates multi-table inserts with generated keys, and composes the
//! form and aggregate report queries.

pub mod config;
pub mod database;
pub mod dates;
pub mod error;
pub mod model;
pub mod reports;
pub mod service;
pub mod shard;

#[cfg(feature = "server")]
pub mod api;

pub use config::{FederationConfig, PoolSettings};
pub use database::{GeneratedKeys, InsertPlan, ShardHandle, ShardRegistry};
pub use error::{DataAccessError, ErrorKind, Result};
pub use reports::ReportFilter;
pub use service::{SalesFederation, SalesPort};
pub use shard::Shard;
