//! Source catalog discovery for change-tracking-enabled tables.

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::{ColumnDef, TableDescriptor};
use crate::error::{ReplicateError, Result};
use crate::gateway::SqlGateway;

/// One row per (table, column), tagged with a nonzero index id iff the column
/// participates in any index. Names come back already bracket-wrapped so
/// downstream DML never re-quotes them.
const CATALOG_QUERY: &str = r#"
    SELECT
        '[' + s.name + '].[' + t.name + ']' AS table_name,
        '[' + c.name + ']' AS column_name,
        ty.name AS data_type,
        CAST(ISNULL(ic.index_id, 0) AS INT) AS index_id
    FROM sys.change_tracking_tables ctt
    JOIN sys.tables t ON t.object_id = ctt.object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    JOIN sys.columns c ON c.object_id = t.object_id
    JOIN sys.types ty ON ty.user_type_id = c.user_type_id
    LEFT JOIN (
        SELECT object_id, column_id, MIN(index_id) AS index_id
        FROM sys.index_columns
        GROUP BY object_id, column_id
    ) ic ON ic.object_id = c.object_id AND ic.column_id = c.column_id
    ORDER BY t.object_id, c.column_id
"#;

/// Enumerate every change-tracking-enabled table on the source, with its
/// key (indexed) and other columns.
///
/// Tables with no indexed columns are returned with an empty key list; the
/// orchestrator filters those out before use.
pub async fn discover_tables(source: &mut SqlGateway) -> Result<Vec<Arc<TableDescriptor>>> {
    let endpoint = source.endpoint().to_string();
    let rows = source
        .fetch(CATALOG_QUERY, &[])
        .await
        .map_err(|e| ReplicateError::metadata(&endpoint, e.to_string()))?;

    let catalog_rows = rows.iter().map(|row| CatalogRow {
        table: row.get::<&str, _>(0).unwrap_or_default().to_string(),
        column: row.get::<&str, _>(1).unwrap_or_default().to_string(),
        data_type: row.get::<&str, _>(2).unwrap_or_default().to_string(),
        index_id: row.get::<i32, _>(3).unwrap_or(0),
    });
    let tables = collect_tables(catalog_rows);

    info!(
        "Discovered {} change-tracked tables on {}",
        tables.len(),
        endpoint
    );
    for table in &tables {
        debug!(
            "{}: {} key columns, {} other columns",
            table.name,
            table.key_columns.len(),
            table.other_columns.len()
        );
    }

    Ok(tables)
}

/// Keep only tables whose bracket-stripped qualified name appears in the
/// allowlist. `None` means no filtering.
pub fn filter_allowlist(
    tables: Vec<Arc<TableDescriptor>>,
    allowlist: Option<&[String]>,
) -> Vec<Arc<TableDescriptor>> {
    match allowlist {
        None => tables,
        Some(names) => tables
            .into_iter()
            .filter(|t| names.iter().any(|n| n == &t.display_name()))
            .collect(),
    }
}

struct CatalogRow {
    table: String,
    column: String,
    data_type: String,
    index_id: i32,
}

/// Group ordered catalog rows into table descriptors, partitioning each
/// table's columns by index participation.
fn collect_tables(rows: impl Iterator<Item = CatalogRow>) -> Vec<Arc<TableDescriptor>> {
    let mut tables: Vec<Arc<TableDescriptor>> = Vec::new();
    let mut current: Option<TableDescriptor> = None;

    for row in rows {
        if current.as_ref().map(|t| t.name != row.table).unwrap_or(true) {
            if let Some(done) = current.take() {
                tables.push(Arc::new(done));
            }
            current = Some(TableDescriptor {
                name: row.table.clone(),
                key_columns: Vec::new(),
                other_columns: Vec::new(),
            });
        }

        let table = current.as_mut().unwrap();
        let column = ColumnDef::new(row.column, row.data_type);
        if row.index_id != 0 {
            table.key_columns.push(column);
        } else {
            table.other_columns.push(column);
        }
    }

    if let Some(done) = current.take() {
        tables.push(Arc::new(done));
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(table: &str, column: &str, data_type: &str, index_id: i32) -> CatalogRow {
        CatalogRow {
            table: table.into(),
            column: column.into(),
            data_type: data_type.into(),
            index_id,
        }
    }

    #[test]
    fn test_collect_partitions_columns_by_index_tag() {
        let rows = vec![
            row("[dbo].[Orders]", "[Id]", "int", 1),
            row("[dbo].[Orders]", "[Total]", "decimal", 0),
            row("[dbo].[Orders]", "[Placed]", "datetime2", 0),
            row("[dbo].[Heap]", "[Payload]", "nvarchar", 0),
        ];

        let tables = collect_tables(rows.into_iter());
        assert_eq!(tables.len(), 2);

        let orders = &tables[0];
        assert_eq!(orders.name, "[dbo].[Orders]");
        assert_eq!(orders.key_columns.len(), 1);
        assert_eq!(orders.key_columns[0].name, "[Id]");
        assert_eq!(orders.other_columns.len(), 2);

        let heap = &tables[1];
        assert!(!heap.has_keys());
    }

    #[test]
    fn test_collect_preserves_column_order() {
        let rows = vec![
            row("[dbo].[T]", "[A]", "int", 2),
            row("[dbo].[T]", "[B]", "int", 1),
            row("[dbo].[T]", "[C]", "nvarchar", 0),
        ];
        let tables = collect_tables(rows.into_iter());
        let keys: Vec<&str> = tables[0].key_columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(keys, vec!["[A]", "[B]"]);
    }

    #[test]
    fn test_filter_allowlist_matches_display_form() {
        let rows = vec![
            row("[dbo].[Orders]", "[Id]", "int", 1),
            row("[dbo].[Skipped]", "[Id]", "int", 1),
        ];
        let tables = collect_tables(rows.into_iter());

        let allow = vec!["dbo.Orders".to_string()];
        let kept = filter_allowlist(tables.clone(), Some(&allow));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "[dbo].[Orders]");

        // Case-sensitive match
        let allow_lower = vec!["dbo.orders".to_string()];
        assert!(filter_allowlist(tables.clone(), Some(&allow_lower)).is_empty());

        assert_eq!(filter_allowlist(tables, None).len(), 2);
    }

    #[test]
    fn test_filter_allowlist_ignores_unknown_names() {
        let rows = vec![row("[dbo].[Orders]", "[Id]", "int", 1)];
        let tables = collect_tables(rows.into_iter());
        let allow = vec!["dbo.Orders".to_string(), "dbo.NoSuchTable".to_string()];
        let kept = filter_allowlist(tables, Some(&allow));
        assert_eq!(kept.len(), 1);
    }
}
