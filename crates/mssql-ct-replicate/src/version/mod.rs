//! Per-destination version bookkeeping.
//!
//! Each destination carries a single-row `SyncInfo` table recording the last
//! change-tracking version successfully applied to it. A destination without
//! one is bootstrapped from its own `CHANGE_TRACKING_CURRENT_VERSION()`: the
//! destination is assumed to be a snapshot taken at that version, so
//! pre-existing rows are not re-inserted.

use tracing::info;

use crate::core::NEVER_SYNCED;
use crate::error::{ReplicateError, Result};
use crate::gateway::SqlGateway;

/// Single-row bookkeeping table, enforced by the check constraint.
const SYNC_INFO_DDL: &str = "CREATE TABLE SyncInfo \
    (Id INT NOT NULL PRIMARY KEY DEFAULT 1 CHECK (Id = 1), Version BIGINT NOT NULL)";

/// Read the destination's last-applied version, bootstrapping `SyncInfo` on
/// first contact (unless dry-run).
///
/// Any failure here excludes the destination from the current run.
pub async fn current_version(dest: &mut SqlGateway, dry_run: bool) -> Result<i64> {
    let destination = dest.endpoint().to_string();
    read_or_bootstrap(dest, dry_run).await.map_err(|e| match e {
        ReplicateError::Version { .. } => e,
        other => ReplicateError::version(destination, other.to_string()),
    })
}

async fn read_or_bootstrap(dest: &mut SqlGateway, dry_run: bool) -> Result<i64> {
    let exists = dest
        .scalar_i64("SELECT CAST(OBJECT_ID('SyncInfo') AS BIGINT)", &[])
        .await?
        .is_some();

    if exists {
        let version = dest.scalar_i64("SELECT Version FROM SyncInfo", &[]).await?;
        return version.ok_or_else(|| {
            ReplicateError::version(dest.endpoint(), "SyncInfo exists but holds no row")
        });
    }

    // First contact: adopt the destination's own CT version as the baseline.
    // NULL means change tracking is not enabled there; start from scratch.
    let baseline = dest
        .scalar_i64("SELECT CHANGE_TRACKING_CURRENT_VERSION()", &[])
        .await?
        .unwrap_or(NEVER_SYNCED);

    if dry_run {
        info!(
            "{}: no SyncInfo; would bootstrap at version {} (dry-run)",
            dest.endpoint(),
            baseline
        );
        return Ok(baseline);
    }

    dest.batch(SYNC_INFO_DDL).await?;
    dest.execute(
        "INSERT INTO SyncInfo (Id, Version) VALUES (1, @P1)",
        &[&baseline],
    )
    .await?;

    info!(
        "{}: created SyncInfo with baseline version {}",
        dest.endpoint(),
        baseline
    );

    Ok(baseline)
}
