//! Replication orchestrator - main workflow coordinator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::apply::apply_changes;
use crate::config::{Config, ReplicationSetConfig};
use crate::error::{ReplicateError, Result};
use crate::extract::extract_changes;
use crate::gateway::SqlGateway;
use crate::metadata::{discover_tables, filter_allowlist};
use crate::version::current_version;

/// Drives every configured replication set through one pull/apply cycle.
pub struct Orchestrator {
    config: Config,
    dry_run: bool,
}

/// Outcome of a replication run.
///
/// Errors never abort the run; each is recorded here and flips `failed`,
/// which drives the process exit code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Whether this was a dry run.
    pub dry_run: bool,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Replication sets processed.
    pub sets_total: usize,

    /// Destinations brought up to the source version (or planned, in dry-run).
    pub destinations_synced: usize,

    /// Destinations excluded before apply (version probe or extraction failed).
    pub destinations_skipped: usize,

    /// Destinations whose apply transaction rolled back.
    pub destinations_failed: usize,

    /// Change records extracted across all groups.
    pub changes_extracted: u64,

    /// Change records applied (or planned) across all destinations.
    pub changes_applied: u64,

    /// True iff any error occurred anywhere in the run.
    pub failed: bool,

    /// Human-readable error descriptions, in occurrence order.
    pub errors: Vec<String>,
}

impl RunReport {
    fn new(dry_run: bool, sets_total: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            dry_run,
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
            sets_total,
            destinations_synced: 0,
            destinations_skipped: 0,
            destinations_failed: 0,
            changes_extracted: 0,
            changes_applied: 0,
            failed: false,
            errors: Vec::new(),
        }
    }

    fn record_error(&mut self, err: &ReplicateError) {
        error!("{}", err);
        self.failed = true;
        self.errors.push(err.to_string());
    }

    fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
    }

    /// Convert to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct DestinationState {
    name: String,
    gateway: SqlGateway,
    version: i64,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: Config, dry_run: bool) -> Self {
        Self { config, dry_run }
    }

    /// Run every replication set in declaration order.
    pub async fn run(self) -> RunReport {
        let mut report = RunReport::new(self.dry_run, self.config.replication_sets.len());
        if self.dry_run {
            info!("Dry run: no destination will be modified");
        }

        for set in &self.config.replication_sets {
            self.run_set(set, &mut report).await;
        }

        report.finish();
        report
    }

    async fn run_set(&self, set: &ReplicationSetConfig, report: &mut RunReport) {
        info!("Replication set '{}': starting", set.name);

        let mut source = match SqlGateway::connect(&set.source).await {
            Ok(gateway) => gateway,
            Err(e) => {
                report.record_error(&ReplicateError::metadata(&set.source.name, e.to_string()));
                return;
            }
        };

        let tables = match discover_tables(&mut source).await {
            Ok(tables) => tables,
            Err(e) => {
                report.record_error(&e);
                source.close().await.ok();
                return;
            }
        };

        let tables = filter_allowlist(tables, set.tables.as_deref());
        let (tables, keyless): (Vec<_>, Vec<_>) =
            tables.into_iter().partition(|t| t.has_keys());
        for table in &keyless {
            warn!(
                "Replication set '{}': {} has no indexed columns and cannot be replicated",
                set.name, table.name
            );
        }

        if tables.is_empty() {
            warn!("Replication set '{}': no replicable tables, skipping", set.name);
            source.close().await.ok();
            return;
        }

        // Version every destination; failures exclude it from this run only.
        let mut destinations: Vec<DestinationState> = Vec::new();
        for endpoint in &set.destinations {
            let mut gateway = match SqlGateway::connect(endpoint).await {
                Ok(gateway) => gateway,
                Err(e) => {
                    report.record_error(&ReplicateError::version(&endpoint.name, e.to_string()));
                    report.destinations_skipped += 1;
                    continue;
                }
            };
            match current_version(&mut gateway, self.dry_run).await {
                Ok(version) => {
                    info!("{}: at version {}", endpoint.name, version);
                    destinations.push(DestinationState {
                        name: endpoint.name.clone(),
                        gateway,
                        version,
                    });
                }
                Err(e) => {
                    report.record_error(&e);
                    report.destinations_skipped += 1;
                    gateway.close().await.ok();
                }
            }
        }

        // Destinations at the same baseline share one extraction.
        let groups = group_by_version(destinations.iter().map(|d| d.version));
        for (baseline, members) in &groups {
            let names: Vec<String> = members
                .iter()
                .map(|&i| destinations[i].name.clone())
                .collect();

            let batch =
                match extract_changes(&mut source, *baseline, &tables, &names).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        report.record_error(&e);
                        report.destinations_skipped += members.len();
                        continue;
                    }
                };
            report.changes_extracted += batch.len() as u64;

            for &i in members {
                let dest = &mut destinations[i];
                match apply_changes(
                    &mut dest.gateway,
                    &batch,
                    self.config.settings.apply_isolation,
                    self.dry_run,
                )
                .await
                {
                    Ok(applied) => {
                        report.destinations_synced += 1;
                        report.changes_applied += applied;
                    }
                    Err(e) => {
                        report.record_error(&e);
                        report.destinations_failed += 1;
                    }
                }
            }
        }

        for dest in destinations {
            dest.gateway.close().await.ok();
        }
        source.close().await.ok();

        info!("Replication set '{}': done", set.name);
    }
}

/// Group destination indices by exact version value, ascending.
fn group_by_version(versions: impl Iterator<Item = i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, version) in versions.enumerate() {
        groups.entry(version).or_default().push(i);
    }
    groups
}
