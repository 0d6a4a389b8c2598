//! Relationship reconciliation: `(person, org, role, period)` edges.
//!
//! Only locally active, auto-synced employees are considered. People that
//! Phase 1 just queued for creation get their edges on the next run, once the
//! person exists. Manually managed edges count as existing but are never
//! deactivated.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, instrument};

use hrsync_core::{EdgeKey, Org, PersonType, RoleAssignment};
use hrsync_events::codes;
use hrsync_import::{AssignmentRecord, ImportBatch, Imported};
use hrsync_tasks::NewTask;

use crate::engine::{PhaseReport, ReconciliationEngine};
use crate::error::ReconcileResult;
use crate::payload::{RelationAddPayload, RelationDeactPayload, RELATION_ADD, RELATION_DEACT};

/// Reason attached to edge deactivations.
pub const REMOVED_REASON: &str = "Assignment removed from import";

impl ReconciliationEngine {
    #[instrument(skip_all, fields(records = assignments.len()))]
    pub(crate) async fn reconcile_relationships(
        &self,
        assignments: &ImportBatch,
        failed_institutions: &[String],
    ) -> ReconcileResult<PhaseReport> {
        let mut report = PhaseReport::default();

        let mut by_person: HashMap<String, Vec<Imported<AssignmentRecord>>> = HashMap::new();
        for imported in assignments.decode::<AssignmentRecord>() {
            by_person
                .entry(imported.key.person_id.clone())
                .or_default()
                .push(imported);
        }
        let undecodable = undecodable_persons(assignments, &by_person);

        let period = self.directory.current_period().await?.map(|p| p.id);
        let mut orgs: HashMap<String, Option<Org>> = HashMap::new();

        for person in self.identities.list_active_synced(PersonType::Employee).await? {
            let existing: Vec<RoleAssignment> = self.identities.list_active_assignments(person.id).await?;
            let existing_keys: HashSet<EdgeKey> = existing.iter().map(RoleAssignment::key).collect();
            let mut seen: HashSet<EdgeKey> = HashSet::new();

            let imported = by_person
                .get(&person.external_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for assignment in imported {
                let Some(code) = assignment.record.role_code() else {
                    continue;
                };
                let inst = assignment.key.institution_or_empty();
                let org = self.org_for(inst, &mut orgs).await?;

                let resolved = self.roles.resolve(code, org.as_ref()).await?;
                let Some((resolved, role)) = resolved.as_ref().and_then(|r| r.role().map(|role| (r, role))) else {
                    report.skipped += 1;
                    self.events
                        .record_event(
                            codes::SYNC_INFO,
                            format!(
                                "No role for code {code} (person {}, institution {inst}); assignment skipped",
                                person.external_id
                            ),
                        )
                        .await;
                    continue;
                };

                let key = EdgeKey {
                    person: person.id,
                    org: org.as_ref().map(|o| o.id),
                    role: role.id,
                    period,
                };
                if !seen.insert(key) || existing_keys.contains(&key) {
                    continue;
                }

                let payload = RelationAddPayload {
                    person_id: person.external_id.clone(),
                    person_db_id: person.id,
                    inst_nr: inst.to_string(),
                    org_id: key.org,
                    role_code: code.to_string(),
                    role_name: role.name.clone(),
                    role_id: role.id,
                    sap_role_id: resolved.canonical.as_ref().map(|r| r.id),
                    be_role_id: resolved.backend.as_ref().map(|r| r.id),
                    period_id: period,
                    assignment: assignment.raw.clone(),
                };
                let request = NewTask::new(RELATION_ADD, serde_json::to_value(&payload)?)
                    .with_identity(key.to_string());
                self.enqueue(request, &mut report).await?;
            }

            if undecodable.contains(&person.external_id) {
                debug!(person_id = %person.external_id, "Assignments did not all decode; keeping existing edges");
                report.skipped += 1;
                continue;
            }

            for edge in existing.iter().filter(|edge| edge.automatic_sync) {
                if seen.contains(&edge.key()) {
                    continue;
                }
                let protected = self.config.protect_failed_institutions
                    && edge
                        .institution
                        .as_ref()
                        .is_some_and(|inst| failed_institutions.contains(inst));
                if protected {
                    debug!(edge = %edge.id, "Edge belongs to an institution that failed to import");
                    report.skipped += 1;
                    continue;
                }

                let payload = RelationDeactPayload {
                    proprelation_id: edge.id,
                    person_id: person.external_id.clone(),
                    role_code: edge.source.get("ambtCode").and_then(Value::as_str).map(str::to_string),
                    reason: REMOVED_REASON.to_string(),
                };
                let request = NewTask::new(RELATION_DEACT, serde_json::to_value(&payload)?)
                    .with_identity(format!("proprelation:{}", edge.id));
                self.enqueue(request, &mut report).await?;
            }
        }

        Ok(report)
    }

    /// Organization for an institution: an org of the preferred type, else
    /// any active org with that institution number.
    async fn org_for(
        &self,
        inst: &str,
        cache: &mut HashMap<String, Option<Org>>,
    ) -> ReconcileResult<Option<Org>> {
        if let Some(org) = cache.get(inst) {
            return Ok(org.clone());
        }
        let orgs = self.directory.orgs_by_institution(inst).await?;
        let org = orgs
            .iter()
            .find(|o| o.org_type.as_deref() == Some(self.config.school_org_type.as_str()))
            .or_else(|| orgs.first())
            .cloned();
        cache.insert(inst.to_string(), org.clone());
        Ok(org)
    }
}

/// Persons with at least one assignment record that failed to decode.
fn undecodable_persons(
    assignments: &ImportBatch,
    decoded: &HashMap<String, Vec<Imported<AssignmentRecord>>>,
) -> HashSet<String> {
    let mut raw_counts: HashMap<&str, usize> = HashMap::new();
    for record in assignments {
        *raw_counts.entry(record.key.person_id.as_str()).or_default() += 1;
    }
    raw_counts
        .into_iter()
        .filter(|(person_id, count)| decoded.get(*person_id).map_or(0, Vec::len) < *count)
        .map(|(person_id, _)| person_id.to_string())
        .collect()
}
