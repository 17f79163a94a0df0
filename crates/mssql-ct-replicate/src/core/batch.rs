//! Change records and batches.

use std::sync::Arc;

use crate::core::table::TableDescriptor;
use crate::core::value::CtValue;

/// Kind of DML recorded for a change row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl ChangeOperation {
    /// Parse the first character of `SYS_CHANGE_OPERATION`.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'I' => Some(ChangeOperation::Insert),
            'U' => Some(ChangeOperation::Update),
            'D' => Some(ChangeOperation::Delete),
            _ => None,
        }
    }
}

/// One row-level change extracted from the source.
///
/// `key_values` aligns positionally with the table's key columns and
/// `other_values` with its other columns; for deletes the other values are
/// whatever the left join produced (NULLs) and are never applied.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub table: Arc<TableDescriptor>,
    pub operation: ChangeOperation,
    /// Per-row change-tracking version.
    pub version: i64,
    pub key_values: Vec<CtValue>,
    pub other_values: Vec<CtValue>,
}

/// The full delta between a baseline version and the source's current version.
///
/// Created by the extractor, then handed read-only to every destination of the
/// version group that shares it.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Source `CHANGE_TRACKING_CURRENT_VERSION()` captured at extraction start.
    pub version: i64,
    pub records: Vec<ChangeRecord>,
}

impl ChangeBatch {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records ordered for application: row version ascending, then table name.
    ///
    /// Version order respects the source's commit order across tables; the
    /// table-name tiebreak keeps the order deterministic across runs.
    pub fn in_apply_order(&self) -> Vec<&ChangeRecord> {
        let mut ordered: Vec<&ChangeRecord> = self.records.iter().collect();
        ordered.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.table.name.cmp(&b.table.name))
        });
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::ColumnDef;

    fn table(name: &str) -> Arc<TableDescriptor> {
        Arc::new(TableDescriptor {
            name: name.into(),
            key_columns: vec![ColumnDef::new("[Id]", "int")],
            other_columns: vec![ColumnDef::new("[V]", "nvarchar")],
        })
    }

    fn record(table: &Arc<TableDescriptor>, op: ChangeOperation, version: i64) -> ChangeRecord {
        ChangeRecord {
            table: Arc::clone(table),
            operation: op,
            version,
            key_values: vec![CtValue::I32(1)],
            other_values: vec![CtValue::Text("x".into())],
        }
    }

    #[test]
    fn test_operation_codes() {
        assert_eq!(ChangeOperation::from_code('I'), Some(ChangeOperation::Insert));
        assert_eq!(ChangeOperation::from_code('U'), Some(ChangeOperation::Update));
        assert_eq!(ChangeOperation::from_code('D'), Some(ChangeOperation::Delete));
        assert_eq!(ChangeOperation::from_code('X'), None);
    }

    #[test]
    fn test_apply_order_is_version_then_table() {
        let t = table("[dbo].[T]");
        let mut batch = ChangeBatch::new(9);
        batch.records.push(record(&t, ChangeOperation::Delete, 8));
        batch.records.push(record(&t, ChangeOperation::Update, 7));

        let ordered = batch.in_apply_order();
        assert_eq!(ordered[0].version, 7);
        assert_eq!(ordered[0].operation, ChangeOperation::Update);
        assert_eq!(ordered[1].version, 8);
        assert_eq!(ordered[1].operation, ChangeOperation::Delete);
    }

    #[test]
    fn test_apply_order_breaks_version_ties_by_table_name() {
        let a = table("[dbo].[A]");
        let b = table("[dbo].[B]");
        let mut batch = ChangeBatch::new(5);
        batch.records.push(record(&b, ChangeOperation::Insert, 5));
        batch.records.push(record(&a, ChangeOperation::Insert, 5));

        let ordered = batch.in_apply_order();
        assert_eq!(ordered[0].table.name, "[dbo].[A]");
        assert_eq!(ordered[1].table.name, "[dbo].[B]");
    }
}
