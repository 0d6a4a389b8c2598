//! Identity reconciliation (employees).

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use hrsync_core::{Person, PersonType};
use hrsync_events::codes;
use hrsync_import::{EmployeeRecord, ImportBatch, Imported};
use hrsync_tasks::{NewTask, UpdateHint};

use crate::engine::{PhaseReport, ReconciliationEngine};
use crate::error::ReconcileResult;
use crate::payload::{AbsentPersonPayload, ASSIGNMENTS, EMPLOYEE_ADD, EMPLOYEE_DEACT, EMPLOYEE_UPD, INST_NR};
use crate::snapshot::SnapshotComparison;

/// Reason attached to absence deactivations.
pub const ABSENT_REASON: &str = "Not in import";

pub(crate) struct IdentityOutcome {
    pub report: PhaseReport,
    pub absence_skipped: bool,
}

/// Raw assignments per `(personId, institution)`, each tagged with `instNr`.
type AssignmentsByPerson = HashMap<(String, String), Vec<Value>>;

fn group_assignments(assignments: Option<&ImportBatch>) -> AssignmentsByPerson {
    let mut grouped = AssignmentsByPerson::new();
    for record in assignments.into_iter().flat_map(|batch| batch.iter()) {
        let inst = record.key.institution_or_empty().to_string();
        let mut raw = record.raw.clone();
        raw.insert(INST_NR.to_string(), Value::String(inst.clone()));
        grouped
            .entry((record.key.person_id.clone(), inst))
            .or_default()
            .push(Value::Object(raw));
    }
    grouped
}

/// Imported record plus the fields the engine attaches before diffing.
fn identity_payload(raw: &Map<String, Value>, inst: &str, assignments: Option<&Vec<Value>>) -> Map<String, Value> {
    let mut payload = raw.clone();
    payload.insert(INST_NR.to_string(), Value::String(inst.to_string()));
    if let Some(assignments) = assignments.filter(|a| !a.is_empty()) {
        payload.insert(ASSIGNMENTS.to_string(), Value::Array(assignments.clone()));
    }
    payload
}

/// Bookkeeping for a single pass over the import.
#[derive(Default)]
struct Pass {
    report: PhaseReport,
    /// External ids present anywhere in the batch.
    seen: HashSet<String>,
    /// External ids that already got an `ADD` in this pass.
    added: HashSet<String>,
}

impl ReconciliationEngine {
    #[instrument(skip_all, fields(records = employees.len()))]
    pub(crate) async fn reconcile_identities(
        &self,
        employees: &ImportBatch,
        assignments: Option<&ImportBatch>,
        today: NaiveDate,
    ) -> ReconcileResult<IdentityOutcome> {
        let grouped = group_assignments(assignments);
        let mut pass = Pass::default();

        // Presence counts even when the record itself does not decode.
        pass.seen.extend(employees.iter().map(|record| record.key.person_id.clone()));

        for imported in employees.decode::<EmployeeRecord>() {
            let person_id = imported.record.person_id.clone();
            let inst = imported.key.institution_or_empty().to_string();
            pass.seen.insert(person_id.clone());

            let payload = identity_payload(&imported.raw, &inst, grouped.get(&(person_id.clone(), inst.clone())));

            match self.identities.find_person_by_external_id(&person_id).await? {
                None => self.diff_unknown(&imported, &inst, payload, today, &mut pass).await?,
                Some(person) => {
                    self.diff_known(&person, &imported, &inst, payload, today, &mut pass)
                        .await?;
                }
            }
        }

        let absence_skipped = self.deactivate_absent(employees, &mut pass).await?;
        Ok(IdentityOutcome {
            report: pass.report,
            absence_skipped,
        })
    }

    async fn diff_unknown(
        &self,
        imported: &Imported<EmployeeRecord>,
        inst: &str,
        payload: Map<String, Value>,
        today: NaiveDate,
        pass: &mut Pass,
    ) -> ReconcileResult<()> {
        let person_id = &imported.record.person_id;

        if !imported.record.is_eligible(today) {
            debug!(person_id = %person_id, inst = %inst, "Skipping ineligible unknown person");
            pass.report.skipped += 1;
            return Ok(());
        }

        if pass.added.contains(person_id) {
            let hint = UpdateHint::AddDetails {
                inst_nr: inst.to_string(),
            };
            let request = NewTask::new(EMPLOYEE_UPD, Value::Object(payload))
                .with_hint(&hint)
                .with_identity(format!("{person_id}@{inst}"));
            self.enqueue(request, &mut pass.report).await?;
            return Ok(());
        }

        let request = NewTask::new(EMPLOYEE_ADD, Value::Object(payload)).with_identity(person_id.clone());
        self.enqueue(request, &mut pass.report).await?;
        pass.added.insert(person_id.clone());
        Ok(())
    }

    async fn diff_known(
        &self,
        person: &Person,
        imported: &Imported<EmployeeRecord>,
        inst: &str,
        payload: Map<String, Value>,
        today: NaiveDate,
        pass: &mut Pass,
    ) -> ReconcileResult<()> {
        let record = &imported.record;
        let person_id = &record.person_id;

        if record.should_deactivate(today) && person.is_active {
            let request = NewTask::new(EMPLOYEE_DEACT, Value::Object(payload)).with_identity(person_id.clone());
            self.enqueue(request, &mut pass.report).await?;
            return Ok(());
        }

        if !person.is_active && record.is_eligible(today) {
            let request = NewTask::new(EMPLOYEE_UPD, Value::Object(payload))
                .with_hint(&UpdateHint::Reactivate)
                .with_identity(person_id.clone());
            self.enqueue(request, &mut pass.report).await?;
            return Ok(());
        }

        let hint = match self.identities.find_details(person.id, inst).await? {
            None => UpdateHint::AddDetails {
                inst_nr: inst.to_string(),
            },
            Some(details) => match self.comparer.compare(&details.snapshot, &payload) {
                SnapshotComparison::Unchanged => return Ok(()),
                SnapshotComparison::Changed => UpdateHint::Update,
                SnapshotComparison::Unreadable => {
                    warn!(person_id = %person_id, inst = %inst, "Stored snapshot unreadable; treating as changed");
                    UpdateHint::Update
                }
            },
        };

        let request = NewTask::new(EMPLOYEE_UPD, Value::Object(payload))
            .with_hint(&hint)
            .with_identity(format!("{person_id}@{inst}"));
        self.enqueue(request, &mut pass.report).await?;
        Ok(())
    }

    /// Deactivate active, auto-synced employees missing from the batch.
    /// Returns `true` when the check was skipped.
    async fn deactivate_absent(&self, employees: &ImportBatch, pass: &mut Pass) -> ReconcileResult<bool> {
        if employees.is_partial() && self.config.protect_failed_institutions {
            self.events
                .record_event(
                    codes::SYNC_INFO,
                    format!(
                        "Employee import incomplete (failed: {}); absence deactivation skipped",
                        employees.failed_institutions().join(", ")
                    ),
                )
                .await;
            return Ok(true);
        }
        if employees.is_empty() {
            self.events
                .record_event(codes::SYNC_INFO, "Employee import is empty; absence deactivation skipped")
                .await;
            return Ok(true);
        }

        for person in self.identities.list_active_synced(PersonType::Employee).await? {
            if pass.seen.contains(&person.external_id) {
                continue;
            }
            let payload = AbsentPersonPayload {
                person_id: person.external_id.clone(),
                person_db_id: person.id,
                reason: ABSENT_REASON.to_string(),
            };
            let request = NewTask::new(EMPLOYEE_DEACT, serde_json::to_value(&payload)?)
                .with_identity(person.external_id.clone());
            self.enqueue(request, &mut pass.report).await?;
        }
        Ok(false)
    }
}
