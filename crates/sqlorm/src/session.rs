//! Datasource re-exports.
//!
//! `sqlorm::Datasource` is the unit of work: one connection, the objects
//! attached to it and their pending changes.
//!
//! The implementation lives in the separate `sqlorm-session` crate, pooling
//! in `sqlorm-pool`. This module exists so the `sqlorm` facade exposes both
//! without forcing users to depend on sub-crates directly.

pub use sqlorm_pool::{Pool, PoolConfig, PoolStats, PooledDatasource};
pub use sqlorm_session::{
    AdapterKind, ConnectionString, Datasource, DatasourceConfig, DatasourceState, FetchMode,
    PostInsert, ResultSet, SelectClause,
};
