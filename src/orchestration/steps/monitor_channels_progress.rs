//! Channel progress: wait for a scanner's channels to settle and roll their
//! statuses up into the scanner.

use crate::constants::codes;
use crate::error::Result;
use crate::events::Severity;
use crate::models::ScannerRequest;
use crate::orchestration::aggregator::Decision;
use crate::orchestration::orchestrator::{wait_limit, ProvisioningOrchestrator, StepContext};
use crate::orchestration::types::{StepDisposition, StepKind, StepOutcome, StepParameters, StepReport};
use crate::state_machine::guards::CHANNELS_PROGRESS_GUARD;
use crate::state_machine::EntityKind;
use tracing::{info, warn};

impl ProvisioningOrchestrator {
    pub async fn monitor_channels_progress(&self, params: &StepParameters) -> StepReport {
        let mut ctx = StepContext::new(StepKind::MonitorChannelsProgress, EntityKind::Scanner);

        match self.run_monitor_channels_progress(params, &mut ctx).await {
            Ok(report) => report,
            Err(error) => self.faulted(&ctx, error, Severity::Warning).await,
        }
    }

    async fn run_monitor_channels_progress(
        &self,
        params: &StepParameters,
        ctx: &mut StepContext,
    ) -> Result<StepReport> {
        let request = ScannerRequest::from_parameters(params)?;
        ctx.entity_id = Some(request.instance_id);
        ctx.affected_item = request.tag_element.clone();
        ctx.affected_service = request.scan_name.clone();

        let status = self.observe_status(ctx).await?;
        if let Some(report) = self.check_guard(ctx, &CHANNELS_PROGRESS_GUARD, status) {
            return Ok(report);
        }

        let timeout = self.config.retry.scan_timeout();
        let convergence = self
            .converger
            .converge(|| self.child_statuses(&request.channels), timeout)
            .await?;

        if !convergence.is_converged() {
            return Ok(self
                .timed_out(
                    ctx,
                    Severity::Warning,
                    timeout,
                    &format!(
                        "All channels didn't finish within scan wait limit ({}).",
                        wait_limit(timeout)
                    ),
                    "Failed to verify channel completion before timeout.",
                )
                .await);
        }

        let aggregation = self.aggregator.aggregate(&convergence.into_snapshot())?;
        let failure_code = match &aggregation.decision {
            Decision::AllFailed { .. } => Some(codes::ALL_CHANNELS_FAILED_PROVISIONING),
            Decision::PartialFailure { .. } => Some(codes::PARTIAL_CHANNEL_PROVISION_ERROR),
            Decision::Success => None,
        };

        self.apply(ctx, aggregation.decision.parent_transition()).await?;
        if let Some(code) = failure_code {
            warn!(
                scanner_id = %request.instance_id,
                failed = ?aggregation.decision.failed(),
                error_score = aggregation.error_score(),
                "⚠️ Some channels failed"
            );
            self.log_failed_channels(ctx, code, aggregation.decision.failed());
        }

        info!(
            scanner_id = %request.instance_id,
            channels = aggregation.child_count,
            status = ?ctx.status,
            "📊 Channel statuses rolled up"
        );

        let disposition = match aggregation.decision {
            Decision::AllFailed { failed } => StepDisposition::TotalChildFailure { failed },
            Decision::PartialFailure { .. } | Decision::Success => StepDisposition::Completed,
        };

        Ok(self.finish(ctx, StepOutcome::Finished, disposition))
    }

    fn log_failed_channels(&self, ctx: &mut StepContext, code: &str, failed: &[String]) {
        let names = failed.join(", ");
        ctx.affected_item = format!("{names} channels");
        self.log_incident(
            ctx,
            Severity::Major,
            Some(code),
            "Channel status check",
            Some("Failed to provision one or more channels."),
            format!("{names} channel(s) failed to provision as expected."),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvisioningConfig;
    use crate::models::EntityRecord;
    use crate::state_machine::{EntityStatus, Transition};
    use crate::test_helpers::{scanner_parameters, StepHarness};
    use uuid::Uuid;

    fn record(harness: &StepHarness, kind: EntityKind, name: &str, status: EntityStatus) -> Uuid {
        let record = EntityRecord::new(kind, status).with_name(name);
        let id = record.id;
        harness.store.insert(record);
        id
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_channels_activate_scanner() {
        let harness = StepHarness::new();
        let scanner = record(&harness, EntityKind::Scanner, "Sweep", EntityStatus::InProgress);
        let one = record(&harness, EntityKind::Channel, "One", EntityStatus::InProgress);
        let two = record(&harness, EntityKind::Channel, "Two", EntityStatus::Active);
        harness
            .store
            .script_statuses(one, [EntityStatus::InProgress, EntityStatus::Active]);

        let params = scanner_parameters(scanner, "Sweep", &[one, two]);
        let report = harness.orchestrator().monitor_channels_progress(&params).await;

        assert_eq!(report.outcome, StepOutcome::Finished);
        assert_eq!(report.disposition, StepDisposition::Completed);
        assert_eq!(report.transitions, vec![Transition::InProgressToActive]);
        assert_eq!(harness.store.status_of(scanner), Some(EntityStatus::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failed_channel_gives_active_with_errors() {
        let harness = StepHarness::new();
        let scanner = record(&harness, EntityKind::Scanner, "Sweep", EntityStatus::InProgress);
        let one = record(&harness, EntityKind::Channel, "One", EntityStatus::Error);
        let two = record(&harness, EntityKind::Channel, "Two", EntityStatus::Complete);

        let params = scanner_parameters(scanner, "Sweep", &[one, two]);
        let report = harness.orchestrator().monitor_channels_progress(&params).await;

        assert_eq!(report.transitions, vec![Transition::InProgressToActiveWithErrors]);
        assert_eq!(
            harness.store.status_of(scanner),
            Some(EntityStatus::ActiveWithErrors)
        );

        let incident = harness
            .incidents
            .find(codes::PARTIAL_CHANNEL_PROVISION_ERROR)
            .expect("logged");
        assert_eq!(incident.severity(), Severity::Major);
        assert_eq!(incident.affected_item, "One channels");
        assert_eq!(incident.notes, "One channel(s) failed to provision as expected.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failed_channels_error_the_scanner() {
        let harness = StepHarness::new();
        let scanner = record(&harness, EntityKind::Scanner, "Sweep", EntityStatus::InProgress);
        let one = record(&harness, EntityKind::Channel, "One", EntityStatus::Error);
        let two = record(&harness, EntityKind::Channel, "Two", EntityStatus::Error);

        let params = scanner_parameters(scanner, "Sweep", &[one, two]);
        let report = harness.orchestrator().monitor_channels_progress(&params).await;

        assert_eq!(report.outcome, StepOutcome::Finished);
        assert_eq!(
            report.disposition,
            StepDisposition::TotalChildFailure {
                failed: vec!["One".to_string(), "Two".to_string()]
            }
        );
        assert_eq!(harness.store.status_of(scanner), Some(EntityStatus::Error));
        assert_eq!(
            harness.incidents.codes(),
            vec![Some(codes::ALL_CHANNELS_FAILED_PROVISIONING.to_string())]
        );
        let incident = harness
            .incidents
            .find(codes::ALL_CHANNELS_FAILED_PROVISIONING)
            .expect("logged");
        assert_eq!(incident.notes, "One, Two channel(s) failed to provision as expected.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_channel_times_out() {
        let harness = StepHarness::new();
        let scanner = record(&harness, EntityKind::Scanner, "Sweep", EntityStatus::InProgress);
        let one = record(&harness, EntityKind::Channel, "One", EntityStatus::InProgress);

        let params = scanner_parameters(scanner, "Sweep", &[one]);
        let report = harness.orchestrator().monitor_channels_progress(&params).await;

        assert_eq!(
            report.disposition,
            StepDisposition::ConvergenceTimeout {
                timeout_seconds: 300
            }
        );
        assert_eq!(report.escalation, vec![Transition::InProgressToError]);
        let incident = harness.incidents.find(codes::RETRY_TIMEOUT).expect("logged");
        assert_eq!(
            incident.error_code.description.as_deref(),
            Some("All channels didn't finish within scan wait limit (5 minutes).")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_wording_follows_configured_limit() {
        let harness = StepHarness::new();
        let scanner = record(&harness, EntityKind::Scanner, "Sweep", EntityStatus::InProgress);
        let one = record(&harness, EntityKind::Channel, "One", EntityStatus::InProgress);
        let mut config = ProvisioningConfig::default();
        config.retry.scan_timeout_seconds = 90;

        let params = scanner_parameters(scanner, "Sweep", &[one]);
        let report = harness
            .orchestrator_with(config)
            .monitor_channels_progress(&params)
            .await;

        assert_eq!(
            report.disposition,
            StepDisposition::ConvergenceTimeout {
                timeout_seconds: 90
            }
        );
        let incident = harness.incidents.find(codes::RETRY_TIMEOUT).expect("logged");
        assert_eq!(
            incident.error_code.description.as_deref(),
            Some("All channels didn't finish within scan wait limit (90 seconds).")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_channel_faults() {
        let harness = StepHarness::new();
        let scanner = record(&harness, EntityKind::Scanner, "Sweep", EntityStatus::InProgress);

        let params = scanner_parameters(scanner, "Sweep", &[Uuid::new_v4()]);
        let report = harness.orchestrator().monitor_channels_progress(&params).await;

        assert!(matches!(
            report.disposition,
            StepDisposition::UnhandledFault { .. }
        ));
        assert_eq!(harness.store.status_of(scanner), Some(EntityStatus::Error));
        assert!(harness.incidents.find(codes::UNHANDLED_FAULT).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_scanner_is_left_alone() {
        let harness = StepHarness::new();
        let scanner = record(&harness, EntityKind::Scanner, "Sweep", EntityStatus::Complete);

        let params = scanner_parameters(scanner, "Sweep", &[]);
        let report = harness.orchestrator().monitor_channels_progress(&params).await;

        assert_eq!(report.outcome, StepOutcome::Success);
        assert!(harness.store.transitions_of(scanner).is_empty());
        assert!(harness.incidents.incidents().is_empty());
    }
}
