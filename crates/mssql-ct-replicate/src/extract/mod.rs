//! Change extraction from the source's change-tracking tables.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::{decode_column, ChangeBatch, ChangeOperation, ChangeRecord, TableDescriptor};
use crate::error::{ReplicateError, Result};
use crate::gateway::{IsolationLevel, SqlGateway};

/// Extract all changes since `baseline` for the given tables.
///
/// When the source allows snapshot isolation the whole read runs inside one
/// snapshot transaction, so every table observes the same version. Without it,
/// rows versioned past the captured current version are discarded; they will
/// be picked up by the next run instead of being applied twice.
///
/// A retention failure on any table aborts the extraction for the whole
/// destination group; no partial batch is ever returned.
pub async fn extract_changes(
    source: &mut SqlGateway,
    baseline: i64,
    tables: &[Arc<TableDescriptor>],
    destinations: &[String],
) -> Result<ChangeBatch> {
    let snapshot = snapshot_isolation_enabled(source).await?;
    if snapshot {
        source.begin(IsolationLevel::Snapshot).await?;
    } else {
        debug!(
            "{}: snapshot isolation unavailable, extracting without a read transaction",
            source.endpoint()
        );
    }

    let result = extract_inner(source, baseline, tables, destinations, snapshot).await;

    if snapshot {
        match result {
            Ok(batch) => {
                // Read-only transaction; committing just releases the snapshot.
                source.commit().await?;
                Ok(batch)
            }
            Err(e) => {
                if let Err(rb) = source.rollback().await {
                    warn!("{}: rollback after failed extraction: {}", source.endpoint(), rb);
                }
                Err(e)
            }
        }
    } else {
        result
    }
}

async fn extract_inner(
    source: &mut SqlGateway,
    baseline: i64,
    tables: &[Arc<TableDescriptor>],
    destinations: &[String],
    snapshot: bool,
) -> Result<ChangeBatch> {
    let current = source
        .scalar_i64("SELECT CHANGE_TRACKING_CURRENT_VERSION()", &[])
        .await?
        .ok_or_else(|| {
            ReplicateError::extract(
                source.endpoint(),
                "change tracking is not enabled on the source database",
            )
        })?;

    let mut batch = ChangeBatch::new(current);
    let mut skewed = 0u64;

    for table in tables {
        check_retention(source, table, baseline, destinations).await?;

        let sql = change_query_sql(table);
        let rows = source
            .fetch(&sql, &[&baseline])
            .await
            .map_err(|e| ReplicateError::extract(&table.name, e.to_string()))?;

        for row in &rows {
            let record = parse_change_row(row, table)?;

            // Without a stable read window, a change committed mid-extraction
            // would be applied now and again on the next run.
            if !snapshot && record.version > current {
                warn!(
                    "{}: discarding change at version {} beyond current version {}",
                    table.name, record.version, current
                );
                skewed += 1;
                continue;
            }

            batch.records.push(record);
        }
    }

    info!(
        "{}: extracted {} changes since version {} (current {}{})",
        source.endpoint(),
        batch.len(),
        baseline,
        current,
        if skewed > 0 {
            format!(", {} discarded for version skew", skewed)
        } else {
            String::new()
        }
    );

    Ok(batch)
}

async fn snapshot_isolation_enabled(source: &mut SqlGateway) -> Result<bool> {
    let state = source
        .scalar_i64(
            "SELECT CAST(snapshot_isolation_state AS BIGINT) FROM sys.databases WHERE name = DB_NAME()",
            &[],
        )
        .await?;
    Ok(state == Some(1))
}

async fn check_retention(
    source: &mut SqlGateway,
    table: &TableDescriptor,
    baseline: i64,
    destinations: &[String],
) -> Result<()> {
    let min_valid = source
        .scalar_i64(
            "SELECT CHANGE_TRACKING_MIN_VALID_VERSION(OBJECT_ID(@P1))",
            &[&table.name.as_str()],
        )
        .await?
        .ok_or_else(|| {
            ReplicateError::extract(
                &table.name,
                "change tracking is not enabled for this table",
            )
        })?;

    if min_valid > baseline {
        return Err(ReplicateError::Retention {
            table: table.name.clone(),
            min_version: min_valid,
            baseline,
            destinations: destinations.join(", "),
        });
    }

    Ok(())
}

/// Build the per-table delta query.
///
/// Key columns come from the change table, which is authoritative for deletes
/// (the base row is gone); other columns come from the base table via left
/// join and are NULL for deleted rows.
fn change_query_sql(table: &TableDescriptor) -> String {
    let mut select_cols = vec![
        "c.SYS_CHANGE_OPERATION".to_string(),
        "c.SYS_CHANGE_VERSION".to_string(),
    ];
    select_cols.extend(table.key_columns.iter().map(|k| format!("c.{}", k.name)));
    select_cols.extend(table.other_columns.iter().map(|o| format!("t.{}", o.name)));

    let join_on = table
        .key_columns
        .iter()
        .map(|k| format!("c.{0} = t.{0}", k.name))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "SELECT {} FROM CHANGETABLE(CHANGES {}, @P1) c \
         LEFT OUTER JOIN {} t ON {} ORDER BY c.SYS_CHANGE_VERSION",
        select_cols.join(", "),
        table.name,
        table.name,
        join_on
    )
}

fn parse_change_row(row: &tiberius::Row, table: &Arc<TableDescriptor>) -> Result<ChangeRecord> {
    let expected = 2 + table.key_columns.len() + table.other_columns.len();
    assert_eq!(
        row.len(),
        expected,
        "change row for {} has {} columns, expected {}",
        table.name,
        row.len(),
        expected
    );

    let op_code: &str = row.get(0).unwrap_or_default();
    let operation = op_code
        .chars()
        .next()
        .and_then(ChangeOperation::from_code)
        .ok_or_else(|| {
            ReplicateError::extract(
                &table.name,
                format!("unrecognized change operation '{}'", op_code),
            )
        })?;

    let version: i64 = row.get(1).ok_or_else(|| {
        ReplicateError::extract(&table.name, "change row is missing SYS_CHANGE_VERSION")
    })?;

    let key_values = table
        .key_columns
        .iter()
        .enumerate()
        .map(|(i, col)| decode_column(row, 2 + i, &col.data_type))
        .collect();

    let key_count = table.key_columns.len();
    let other_values = table
        .other_columns
        .iter()
        .enumerate()
        .map(|(i, col)| decode_column(row, 2 + key_count + i, &col.data_type))
        .collect();

    Ok(ChangeRecord {
        table: Arc::clone(table),
        operation,
        version,
        key_values,
        other_values,
    })
}
