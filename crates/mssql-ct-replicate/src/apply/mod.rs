//! Applying a change batch to one destination.

use tiberius::ToSql;
use tracing::{debug, info, warn};

use crate::core::{ChangeBatch, ChangeOperation, ChangeRecord, CtValue, TableDescriptor};
use crate::error::{ReplicateError, Result};
use crate::gateway::{IsolationLevel, SqlGateway};

/// Apply every change in the batch and advance `SyncInfo` to the batch
/// version, atomically. On any failure the transaction is rolled back and the
/// destination stays at its previous version.
///
/// In dry-run mode nothing is executed; each statement is logged together
/// with its parameter values, and the reported count is what would have been
/// applied.
pub async fn apply_changes(
    dest: &mut SqlGateway,
    batch: &ChangeBatch,
    isolation: IsolationLevel,
    dry_run: bool,
) -> Result<u64> {
    let destination = dest.endpoint().to_string();

    if dry_run {
        return Ok(log_plan(&destination, batch));
    }

    dest.begin(isolation)
        .await
        .map_err(|e| ReplicateError::apply(&destination, e.to_string()))?;

    match apply_in_transaction(dest, batch).await {
        Ok(applied) => {
            dest.commit()
                .await
                .map_err(|e| ReplicateError::apply(&destination, e.to_string()))?;
            info!(
                "{}: applied {} changes, now at version {}",
                destination, applied, batch.version
            );
            Ok(applied)
        }
        Err(e) => {
            if let Err(rb) = dest.rollback().await {
                warn!("{}: rollback failed: {}", destination, rb);
            }
            Err(ReplicateError::apply(&destination, e.to_string()))
        }
    }
}

async fn apply_in_transaction(dest: &mut SqlGateway, batch: &ChangeBatch) -> Result<u64> {
    let mut applied = 0u64;

    for record in batch.in_apply_order() {
        let Some((sql, values)) = statement_for(record) else {
            debug!(
                "{}: skipping update with no non-key columns at version {}",
                record.table.name, record.version
            );
            continue;
        };
        let params: Vec<&dyn ToSql> = values.iter().map(|&v| v as &dyn ToSql).collect();
        dest.execute(&sql, &params).await?;
        applied += 1;
    }

    // Last statement before commit, so a version is never recorded without
    // its DML.
    dest.execute("UPDATE SyncInfo SET Version = @P1", &[&batch.version])
        .await?;

    Ok(applied)
}

fn log_plan(destination: &str, batch: &ChangeBatch) -> u64 {
    let mut planned = 0u64;

    for record in batch.in_apply_order() {
        let Some((sql, values)) = statement_for(record) else {
            continue;
        };
        info!("{}: {}", destination, sql);
        info!("{}:   {}", destination, format_params(&values));
        planned += 1;
    }

    info!(
        "{}: UPDATE SyncInfo SET Version = @P1",
        destination
    );
    info!("{}:   @P1 = {}", destination, batch.version);

    planned
}

/// DML and parameter values for one change record, or `None` for the
/// degenerate update of a table whose every column is a key.
fn statement_for(record: &ChangeRecord) -> Option<(String, Vec<&CtValue>)> {
    match record.operation {
        ChangeOperation::Insert => {
            let values = record
                .key_values
                .iter()
                .chain(record.other_values.iter())
                .collect();
            Some((insert_sql(&record.table), values))
        }
        ChangeOperation::Update => {
            if record.table.other_columns.is_empty() {
                return None;
            }
            let values = record
                .key_values
                .iter()
                .chain(record.other_values.iter())
                .collect();
            Some((update_sql(&record.table), values))
        }
        ChangeOperation::Delete => {
            Some((delete_sql(&record.table), record.key_values.iter().collect()))
        }
    }
}

/// `IDENTITY_INSERT` is toggled unconditionally; for tables without an
/// identity column it is a no-op.
fn insert_sql(table: &TableDescriptor) -> String {
    let columns: Vec<&str> = table.all_column_names().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("@P{}", i)).collect();

    format!(
        "SET IDENTITY_INSERT {table} ON; \
         INSERT INTO {table} ({columns}) VALUES ({values}); \
         SET IDENTITY_INSERT {table} OFF",
        table = table.name,
        columns = columns.join(", "),
        values = placeholders.join(", ")
    )
}

fn update_sql(table: &TableDescriptor) -> String {
    let key_count = table.key_columns.len();

    let assignments: Vec<String> = table
        .other_columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = @P{}", col.name, key_count + i + 1))
        .collect();

    format!(
        "UPDATE {} SET {} WHERE {}",
        table.name,
        assignments.join(", "),
        key_predicate(table)
    )
}

fn delete_sql(table: &TableDescriptor) -> String {
    format!("DELETE FROM {} WHERE {}", table.name, key_predicate(table))
}

fn key_predicate(table: &TableDescriptor) -> String {
    table
        .key_columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = @P{}", col.name, i + 1))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Render parameter values as `@Pn = value` pairs for the dry-run plan.
fn format_params(values: &[&CtValue]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| format!("@P{} = {}", i + 1, v))
        .collect::<Vec<_>>()
        .join(", ")
}
