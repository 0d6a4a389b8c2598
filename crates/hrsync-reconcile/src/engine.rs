//! Reconciliation engine.
//!
//! Diffs one import batch against local state and turns every difference
//! into a queued task. The engine never writes to the identity store; that is
//! left to the task handlers, so a run can be inspected, paused or resumed
//! between reconciliation and processing.
//!
//! A run has three steps, always in this order:
//!
//! 1. role discovery: unknown role codes become `DB ROLE ADD` tasks
//! 2. identities ([`crate::identity`]): add, update, re-activate, deactivate
//! 3. relationships ([`crate::relationship`]): add and deactivate role edges
//!
//! Running the engine twice on the same import and the same local state
//! enqueues nothing the second time.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use hrsync_core::{IdentityStore, ReferenceDirectory};
use hrsync_events::{codes, EventLog};
use hrsync_import::ImportBatch;
use hrsync_tasks::{EnqueueOutcome, NewTask, TaskQueue};

use crate::config::ReconcileConfig;
use crate::error::ReconcileResult;
use crate::roles::RoleResolver;
use crate::snapshot::SnapshotComparer;

/// One import to reconcile.
#[derive(Debug, Clone)]
pub struct ReconcileInput {
    pub employees: ImportBatch,
    /// `None` when assignments could not be fetched; relationships are then
    /// left untouched.
    pub assignments: Option<ImportBatch>,
}

impl ReconcileInput {
    #[must_use]
    pub fn new(employees: ImportBatch, assignments: Option<ImportBatch>) -> Self {
        Self {
            employees,
            assignments,
        }
    }

    /// Institutions missing from either batch.
    #[must_use]
    pub fn failed_institutions(&self) -> Vec<String> {
        let mut failed: Vec<String> = self.employees.failed_institutions().to_vec();
        if let Some(assignments) = &self.assignments {
            for inst in assignments.failed_institutions() {
                if !failed.contains(inst) {
                    failed.push(inst.clone());
                }
            }
        }
        failed
    }
}

/// Counters for one reconciliation step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Tasks newly created.
    pub enqueued: usize,
    /// Requests answered by an already open task.
    pub deduplicated: usize,
    /// Records that produced no task because they could not be resolved.
    pub skipped: usize,
}

impl PhaseReport {
    pub fn record(&mut self, outcome: &EnqueueOutcome) {
        if outcome.is_created() {
            self.enqueued += 1;
        } else {
            self.deduplicated += 1;
        }
    }
}

/// Result of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub roles: PhaseReport,
    pub identities: PhaseReport,
    pub relationships: PhaseReport,
    /// Absence deactivation was not evaluated because the batch is partial.
    pub absence_skipped: bool,
    /// Relationships were not reconciled because assignments are missing.
    pub relationships_skipped: bool,
}

impl ReconciliationReport {
    #[must_use]
    pub fn total_enqueued(&self) -> usize {
        self.roles.enqueued + self.identities.enqueued + self.relationships.enqueued
    }

    /// Whether the run found no differences at all.
    #[must_use]
    pub fn is_fixed_point(&self) -> bool {
        self.total_enqueued() == 0 && self.identities.deduplicated == 0 && self.relationships.deduplicated == 0
    }
}

/// Diffs imports against local state and enqueues the corrective tasks.
pub struct ReconciliationEngine {
    pub(crate) identities: Arc<dyn IdentityStore>,
    pub(crate) directory: Arc<dyn ReferenceDirectory>,
    pub(crate) queue: TaskQueue,
    pub(crate) events: EventLog,
    pub(crate) roles: RoleResolver,
    pub(crate) comparer: SnapshotComparer,
    pub(crate) config: ReconcileConfig,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        directory: Arc<dyn ReferenceDirectory>,
        queue: TaskQueue,
        events: EventLog,
    ) -> Self {
        Self::with_config(identities, directory, queue, events, ReconcileConfig::default())
    }

    #[must_use]
    pub fn with_config(
        identities: Arc<dyn IdentityStore>,
        directory: Arc<dyn ReferenceDirectory>,
        queue: TaskQueue,
        events: EventLog,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            roles: RoleResolver::new(Arc::clone(&directory)),
            comparer: SnapshotComparer::new(config.excluded_snapshot_keys.clone()),
            identities,
            directory,
            queue,
            events,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    #[must_use]
    pub fn directory(&self) -> &Arc<dyn ReferenceDirectory> {
        &self.directory
    }

    /// Reconcile one import. `today` decides pension-based eligibility.
    #[instrument(skip(self, input), fields(employees = input.employees.len()))]
    pub async fn reconcile(
        &self,
        input: &ReconcileInput,
        today: NaiveDate,
    ) -> ReconcileResult<ReconciliationReport> {
        let mut report = ReconciliationReport::default();
        let failed = input.failed_institutions();

        if let Some(assignments) = &input.assignments {
            if self.config.discover_roles {
                report.roles = self.discover_roles(assignments).await?;
            }
        }

        let identities = self
            .reconcile_identities(&input.employees, input.assignments.as_ref(), today)
            .await?;
        report.identities = identities.report;
        report.absence_skipped = identities.absence_skipped;

        match &input.assignments {
            Some(assignments) => {
                report.relationships = self.reconcile_relationships(assignments, &failed).await?;
            }
            None => {
                report.relationships_skipped = true;
                self.events
                    .record_event(
                        codes::SYNC_INFO,
                        "No assignment data; relationship reconciliation skipped",
                    )
                    .await;
            }
        }

        info!(
            roles = report.roles.enqueued,
            identities = report.identities.enqueued,
            relationships = report.relationships.enqueued,
            "Reconciliation finished"
        );
        Ok(report)
    }

    pub(crate) async fn enqueue(
        &self,
        request: NewTask,
        report: &mut PhaseReport,
    ) -> ReconcileResult<EnqueueOutcome> {
        let outcome = self.queue.enqueue(request).await?;
        report.record(&outcome);
        Ok(outcome)
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrsync_import::ImportCategory;

    #[test]
    fn test_failed_institutions_are_merged() {
        let mut employees = ImportBatch::new(ImportCategory::Employees);
        employees.mark_failed("001");
        let mut assignments = ImportBatch::new(ImportCategory::EmployeeAssignments);
        assignments.mark_failed("001");
        assignments.mark_failed("002");

        let input = ReconcileInput::new(employees, Some(assignments));
        assert_eq!(input.failed_institutions(), vec!["001".to_string(), "002".to_string()]);
    }

    #[test]
    fn test_report_totals() {
        let mut report = ReconciliationReport::default();
        assert!(report.is_fixed_point());
        report.identities.enqueued = 2;
        report.relationships.enqueued = 1;
        assert_eq!(report.total_enqueued(), 3);
        assert!(!report.is_fixed_point());
    }
}
