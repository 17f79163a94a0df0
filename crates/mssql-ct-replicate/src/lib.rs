//! # mssql-ct-replicate
//!
//! Row-level replication between SQL Server databases driven by the source's
//! native change tracking.
//!
//! For each configured replication set the engine:
//!
//! - discovers change-tracking-enabled tables and their key columns from the
//!   source catalog
//! - reads (or bootstraps) each destination's last-applied version from its
//!   `SyncInfo` bookkeeping table
//! - groups destinations at the same baseline so they share one extraction
//! - pulls the delta with `CHANGETABLE`, under snapshot isolation when the
//!   source allows it
//! - replays the DML on each destination and advances `SyncInfo` in the same
//!   transaction
//!
//! Failures are isolated: a broken destination never stops the others, and
//! every error is surfaced in the final [`RunReport`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_ct_replicate::{Config, Orchestrator, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load("replication.yaml")?;
//!     let report = Orchestrator::new(config, false).run().await;
//!     println!("{} destinations synced", report.destinations_synced);
//!     Ok(())
//! }
//! ```

pub mod apply;
pub mod config;
pub mod core;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod metadata;
pub mod orchestrator;
pub mod version;

// Re-exports for convenient access
pub use crate::config::{Config, EndpointConfig, ReplicationSetConfig, Settings};
pub use crate::core::{
    ChangeBatch, ChangeOperation, ChangeRecord, ColumnDef, CtNullType, CtValue, TableDescriptor,
};
pub use crate::error::{ReplicateError, Result};
pub use crate::gateway::{IsolationLevel, SqlGateway};
pub use crate::orchestrator::{Orchestrator, RunReport};
