//! Role discovery: HR role codes with no canonical role.

use std::collections::BTreeMap;

use tracing::{debug, instrument};

use hrsync_events::codes;
use hrsync_import::{AssignmentRecord, ImportBatch};
use hrsync_tasks::NewTask;

use crate::engine::{PhaseReport, ReconciliationEngine};
use crate::error::ReconcileResult;
use crate::payload::{RolePayload, ROLE_ADD};

impl ReconciliationEngine {
    /// Queue one `DB ROLE ADD` per distinct unknown role code.
    #[instrument(skip(self, assignments))]
    pub(crate) async fn discover_roles(
        &self,
        assignments: &ImportBatch,
    ) -> ReconcileResult<PhaseReport> {
        let mut report = PhaseReport::default();

        // code -> display name of its first occurrence
        let mut codes_seen: BTreeMap<String, String> = BTreeMap::new();
        for imported in assignments.decode::<AssignmentRecord>() {
            if let Some(code) = imported.record.role_code() {
                codes_seen
                    .entry(code.to_string())
                    .or_insert_with(|| imported.record.role_name().unwrap_or(code).to_string());
            }
        }

        for (code, name) in codes_seen {
            if self.directory.role_by_code(&code).await?.is_some() {
                continue;
            }
            debug!(code = %code, "Unknown role code");
            let payload = RolePayload {
                name: name.clone(),
                shortname: code.clone(),
                automatic_sync: true,
                is_active: true,
            };
            let request = NewTask::new(ROLE_ADD, serde_json::to_value(&payload)?)
                .with_identity(format!("role:{code}"));
            let outcome = self.enqueue(request, &mut report).await?;
            if outcome.is_created() {
                self.events
                    .record_event(
                        codes::SYNC_INFO,
                        format!("New role {code} ({name}) found in assignments"),
                    )
                    .await;
            }
        }

        Ok(report)
    }
}
