//! Core data model shared by every engine component.

mod batch;
mod table;
mod value;

pub use batch::{ChangeBatch, ChangeOperation, ChangeRecord};
pub use table::{ColumnDef, TableDescriptor};
pub use value::{decode_column, CtNullType, CtValue};

/// Canonical "never synced" baseline for a fresh destination.
pub const NEVER_SYNCED: i64 = 0;
