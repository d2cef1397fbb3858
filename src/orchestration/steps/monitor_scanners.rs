//! Provision monitor: wait for every scanner of a provision to settle, decide the
//! provision's status from theirs and tell the requester how it went.

use crate::constants::codes;
use crate::error::Result;
use crate::events::Severity;
use crate::models::{ProvisionAction, ProvisionRequest};
use crate::orchestration::aggregator::{Aggregation, ChildStatus, DeactivationDecision, Decision};
use crate::orchestration::orchestrator::{wait_limit, ProvisioningOrchestrator, StepContext};
use crate::orchestration::types::{StepDisposition, StepKind, StepOutcome, StepParameters, StepReport};
use crate::services::{ForwardingAddress, ForwardingRequest, TagStatus};
use crate::state_machine::guards::{PROVISION_MONITOR_GUARD, PROVISION_TEARDOWN_GUARD};
use crate::state_machine::EntityKind;
use tracing::{debug, info, warn};

impl ProvisioningOrchestrator {
    /// Aggregate a provision's scanners.
    ///
    /// `provision`, `reprovision` and `complete-provision` take the three-way
    /// decision out of `in_progress`; `deactivate` only tells a clean teardown
    /// from a failed one. Any other action converges without a transition.
    /// Forwarding the result upstream is best-effort.
    pub async fn monitor_scanners(&self, params: &StepParameters) -> StepReport {
        let mut ctx = StepContext::new(StepKind::MonitorScanners, EntityKind::Provision);

        match self.run_monitor_scanners(params, &mut ctx).await {
            Ok(report) => report,
            Err(error) => self.faulted(&ctx, error, Severity::Critical).await,
        }
    }

    async fn run_monitor_scanners(
        &self,
        params: &StepParameters,
        ctx: &mut StepContext,
    ) -> Result<StepReport> {
        let request = ProvisionRequest::from_parameters(params)?;
        ctx.entity_id = Some(request.instance_id);
        ctx.affected_item = request.name.clone();
        ctx.affected_service = request.name.clone();

        let status = self.observe_status(ctx).await?;
        let guard = if request.action.is_provisioning() {
            Some(&PROVISION_MONITOR_GUARD)
        } else if request.action.is_deactivation() {
            Some(&PROVISION_TEARDOWN_GUARD)
        } else {
            None
        };
        if let Some(report) = guard.and_then(|guard| self.check_guard(ctx, guard, status)) {
            return Ok(report);
        }

        info!(
            provision_id = %request.instance_id,
            action = %request.action,
            scanners = request.scanners.len(),
            "⏳ Waiting for scanners to settle"
        );

        let timeout = self.config.retry.aggregation_timeout();
        let convergence = self
            .converger
            .converge(|| self.child_statuses(&request.scanners), timeout)
            .await?;

        if !convergence.is_converged() {
            let unsettled = unsettled_names(&convergence.into_snapshot());
            ctx.affected_item = format!("{unsettled} scans");
            return Ok(self
                .timed_out(
                    ctx,
                    Severity::Major,
                    timeout,
                    "Scanners did not complete in time.",
                    format!("It took more than {} to complete all scanners.", wait_limit(timeout)),
                )
                .await);
        }

        let aggregation = self.aggregator.aggregate(&convergence.into_snapshot())?;
        let disposition = self.conclude(ctx, &request.action, &aggregation).await?;

        self.forward_status(&request).await;

        Ok(self.finish(ctx, StepOutcome::Finished, disposition))
    }

    /// Apply the parent transition the action calls for and log failed scanners
    async fn conclude(
        &self,
        ctx: &mut StepContext,
        action: &ProvisionAction,
        aggregation: &Aggregation,
    ) -> Result<StepDisposition> {
        let decision = &aggregation.decision;

        if action.is_provisioning() {
            self.apply(ctx, decision.parent_transition()).await?;
            match decision {
                Decision::AllFailed { failed } => {
                    self.log_failed_scanners(ctx, codes::ALL_SCANS_FAILED_PROVISIONING, failed);
                    return Ok(StepDisposition::TotalChildFailure {
                        failed: failed.clone(),
                    });
                }
                Decision::PartialFailure { failed } => {
                    self.log_failed_scanners(ctx, codes::PARTIAL_SCAN_PROVISION_ERROR, failed);
                }
                Decision::Success => {}
            }
        } else if action.is_deactivation() {
            let teardown = decision.collapse_deactivation();
            self.apply(ctx, teardown.parent_transition()).await?;
            if let DeactivationDecision::Failed { failed } = &teardown {
                self.log_failed_scanners(ctx, codes::SCAN_DEACTIVATION_FAILURE, failed);
            }
        } else {
            debug!(action = %action, "No transition for action");
        }

        Ok(StepDisposition::Completed)
    }

    fn log_failed_scanners(&self, ctx: &mut StepContext, code: &str, failed: &[String]) {
        let names = failed.join(", ");
        warn!(code = code, failed = %names, "⚠️ Scanners failed");

        ctx.affected_item = format!("{names} scans");
        let (description, verb) = if code == codes::SCAN_DEACTIVATION_FAILURE {
            ("Failed to deactivate one or more scans.", "deactivate")
        } else {
            ("Failed to provision one or more scans.", "provision")
        };
        self.log_incident(
            ctx,
            Severity::Major,
            Some(code),
            "Scan status check",
            Some(description),
            format!("{names} scan(s) failed to {verb} as expected."),
        );
    }

    /// Push the provision's status to the requester, when one asked for it
    async fn forward_status(&self, request: &ProvisionRequest) {
        let Some(target) = request.forwarding_target() else {
            debug!(provision_id = %request.instance_id, "No forwarding address, skipping");
            return;
        };

        let result = self.try_forward(request, target).await;

        match result {
            Ok(status) => {
                info!(provision_id = %request.instance_id, address = target, status = ?status, "📨 Status forwarded")
            }
            Err(error) => {
                warn!(provision_id = %request.instance_id, address = target, error = %error, "⚠️ Failed to forward status")
            }
        }
    }

    async fn try_forward(&self, request: &ProvisionRequest, target: &str) -> Result<TagStatus> {
        let address: ForwardingAddress = target.parse()?;
        let status = TagStatus::for_status(self.services.store.read_status(request.instance_id).await?);
        let payload = ForwardingRequest::new(request.source_id.clone().unwrap_or_default(), status);
        self.services.forwarder.notify(&address, &payload).await?;
        Ok(status)
    }
}

fn unsettled_names(children: &[ChildStatus]) -> String {
    children
        .iter()
        .filter(|child| !child.is_settled())
        .map(|child| child.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvisioningConfig;
    use crate::constants::parameters as p;
    use crate::models::EntityRecord;
    use crate::state_machine::{EntityStatus, Transition};
    use crate::test_helpers::{provision_parameters, StepHarness};
    use uuid::Uuid;

    fn record(harness: &StepHarness, kind: EntityKind, name: &str, status: EntityStatus) -> Uuid {
        let record = EntityRecord::new(kind, status).with_name(name);
        let id = record.id;
        harness.store.insert(record);
        id
    }

    fn provision(harness: &StepHarness, status: EntityStatus) -> Uuid {
        record(harness, EntityKind::Provision, "Evening Provision", status)
    }

    fn scanners(harness: &StepHarness, statuses: &[(&str, EntityStatus)]) -> Vec<Uuid> {
        statuses
            .iter()
            .map(|(name, status)| record(harness, EntityKind::Scanner, name, *status))
            .collect()
    }

    fn forwarded(params: StepParameters) -> StepParameters {
        params
            .with_text(p::PROVISION_SOURCE_ELEMENT, "12/345/1001")
            .with_text(p::PROVISION_SOURCE_ID, "Evening News")
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_scanners_activate_provision() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::InProgress);
        let children = scanners(
            &harness,
            &[("North", EntityStatus::Active), ("South", EntityStatus::Active)],
        );

        let params = forwarded(provision_parameters(id, "provision", &children));
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.outcome, StepOutcome::Finished);
        assert_eq!(report.transitions, vec![Transition::InProgressToActive]);
        assert!(harness.incidents.incidents().is_empty());

        let sent = harness.forwarder.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.to_string(), "12/345/1001");
        assert_eq!(sent[0].1.process_response.event_name, "Evening News");
        assert_eq!(sent[0].1.process_response.tag.status, TagStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_names_failed_scanner() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::InProgress);
        let children = scanners(
            &harness,
            &[("North", EntityStatus::Active), ("South", EntityStatus::Error)],
        );

        let params = provision_parameters(id, "reprovision", &children);
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.transitions, vec![Transition::InProgressToActiveWithErrors]);
        let incident = harness
            .incidents
            .find(codes::PARTIAL_SCAN_PROVISION_ERROR)
            .expect("logged");
        assert_eq!(incident.severity(), Severity::Major);
        assert_eq!(incident.affected_item, "South scans");
        assert!(incident.notes.contains("South"));
        assert!(harness.forwarder.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failed_errors_provision() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::InProgress);
        let children = scanners(
            &harness,
            &[("North", EntityStatus::Error), ("South", EntityStatus::Error)],
        );

        let params = provision_parameters(id, "complete-provision", &children);
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.transitions, vec![Transition::InProgressToError]);
        assert!(matches!(
            report.disposition,
            StepDisposition::TotalChildFailure { .. }
        ));
        assert!(harness
            .incidents
            .find(codes::ALL_SCANS_FAILED_PROVISIONING)
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_collapses_to_complete_and_forwards() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::Deactivating);
        let children = scanners(
            &harness,
            &[("North", EntityStatus::Complete), ("South", EntityStatus::Complete)],
        );

        let params = forwarded(provision_parameters(id, "deactivate", &children));
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.transitions, vec![Transition::DeactivatingToComplete]);
        let sent = harness.forwarder.sent();
        assert_eq!(sent[0].1.process_response.tag.status, TagStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_with_failure_errors_provision() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::Deactivating);
        let children = scanners(
            &harness,
            &[("North", EntityStatus::Complete), ("South", EntityStatus::ActiveWithErrors)],
        );

        let params = provision_parameters(id, "deactivate", &children);
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.transitions, vec![Transition::DeactivatingToError]);
        assert!(harness.incidents.find(codes::SCAN_DEACTIVATION_FAILURE).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_action_makes_no_transition() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::Active);
        let children = scanners(&harness, &[("North", EntityStatus::Active)]);

        let params = provision_parameters(id, "audit", &children);
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.outcome, StepOutcome::Finished);
        assert!(report.transitions.is_empty());
        assert_eq!(harness.store.status_of(id), Some(EntityStatus::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_status_is_ignored() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::Complete);

        let params = provision_parameters(id, "provision", &[]);
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.outcome, StepOutcome::Success);
        assert!(harness.store.transitions_of(id).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_scanners_time_out_after_ten_minutes() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::InProgress);
        let children = scanners(
            &harness,
            &[("North", EntityStatus::Active), ("South", EntityStatus::InProgress)],
        );

        let params = provision_parameters(id, "provision", &children);
        let started = tokio::time::Instant::now();
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert!(started.elapsed() >= std::time::Duration::from_secs(600));
        assert_eq!(report.escalation, vec![Transition::InProgressToError]);
        let incident = harness.incidents.find(codes::RETRY_TIMEOUT).expect("logged");
        assert_eq!(incident.severity(), Severity::Major);
        assert_eq!(incident.affected_item, "South scans");
        assert_eq!(
            incident.notes,
            "It took more than 10 minutes to complete all scanners."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_note_follows_configured_limit() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::InProgress);
        let children = scanners(&harness, &[("South", EntityStatus::InProgress)]);
        let mut config = ProvisioningConfig::default();
        config.retry.aggregation_timeout_seconds = 120;

        let params = provision_parameters(id, "provision", &children);
        let report = harness.orchestrator_with(config).monitor_scanners(&params).await;

        assert_eq!(
            report.disposition,
            StepDisposition::ConvergenceTimeout {
                timeout_seconds: 120
            }
        );
        let incident = harness.incidents.find(codes::RETRY_TIMEOUT).expect("logged");
        assert_eq!(
            incident.notes,
            "It took more than 2 minutes to complete all scanners."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwarding_failure_is_not_fatal() {
        let harness = StepHarness::new();
        harness.forwarder.fail_all();
        let id = provision(&harness, EntityStatus::InProgress);
        let children = scanners(&harness, &[("North", EntityStatus::Active)]);

        let params = forwarded(provision_parameters(id, "provision", &children));
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert_eq!(report.outcome, StepOutcome::Finished);
        assert_eq!(report.disposition, StepDisposition::Completed);
        assert_eq!(harness.store.status_of(id), Some(EntityStatus::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_transition_faults_with_critical_incident() {
        let harness = StepHarness::new();
        let id = provision(&harness, EntityStatus::InProgress);
        harness.store.fail_transition(id, Transition::InProgressToActive);
        let children = scanners(&harness, &[("North", EntityStatus::Active)]);

        let params = provision_parameters(id, "provision", &children);
        let report = harness.orchestrator().monitor_scanners(&params).await;

        assert!(matches!(
            report.disposition,
            StepDisposition::UnhandledFault { .. }
        ));
        assert_eq!(report.escalation, vec![Transition::InProgressToError]);
        let incident = harness.incidents.find(codes::UNHANDLED_FAULT).expect("logged");
        assert_eq!(incident.severity(), Severity::Critical);
    }
}
