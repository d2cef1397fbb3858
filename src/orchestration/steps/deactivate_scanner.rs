//! Scanner deactivation: delete the scanner's scans on the device, retire its
//! channels and wait until the device no longer lists the scans.

use crate::constants::codes;
use crate::error::{ProvisioningError, Result};
use crate::events::Severity;
use crate::models::ScannerRequest;
use crate::orchestration::orchestrator::{ProvisioningOrchestrator, StepContext};
use crate::orchestration::scan_request::{deactivation_requests, device_payload, TagRequest};
use crate::orchestration::types::{StepDisposition, StepKind, StepOutcome, StepParameters, StepReport};
use crate::services::DeviceError;
use crate::state_machine::guards::DEACTIVATE_SCANNER_GUARD;
use crate::state_machine::{EntityKind, EntityStatus, StepIntent, Transition};
use tracing::{debug, info, warn};
use uuid::Uuid;

impl ProvisioningOrchestrator {
    /// Deactivate or reprovision a scanner.
    ///
    /// Handles `deactivate` (moved to `deactivating` first) and `reprovision`.
    /// Ends with `deactivating_to_complete` and finished, or
    /// `reprovision_to_inprogress` and success.
    pub async fn deactivate_scanner(&self, params: &StepParameters) -> StepReport {
        let mut ctx = StepContext::new(StepKind::DeactivateScanner, EntityKind::Scanner);

        match self.run_deactivate_scanner(params, &mut ctx).await {
            Ok(report) => report,
            Err(error) => self.faulted(&ctx, error, Severity::Warning).await,
        }
    }

    async fn run_deactivate_scanner(
        &self,
        params: &StepParameters,
        ctx: &mut StepContext,
    ) -> Result<StepReport> {
        let request = ScannerRequest::from_parameters(params)?;
        ctx.entity_id = Some(request.instance_id);
        ctx.affected_item = request.tag_element.clone();
        ctx.affected_service = request.scan_name.clone();

        info!(scanner_id = %request.instance_id, scan = %request.scan_name, "🛑 Deactivate scanner started");

        let Some(record) = self.services.store.read_entity(request.instance_id).await? else {
            self.log_incident(
                ctx,
                Severity::Warning,
                Some(codes::SCAN_INSTANCE_NOT_FOUND),
                "Scan Instance check",
                Some("Unable to find the associated scan record."),
                format!("No TAG Scan Instance found with instanceId: {}", request.instance_id),
            );
            return Ok(self.finish(ctx, StepOutcome::Finished, StepDisposition::EntityMissing));
        };
        ctx.status = Some(record.status);

        if let Some(report) = self.check_guard(ctx, &DEACTIVATE_SCANNER_GUARD, record.status) {
            return Ok(report);
        }

        if record.status == EntityStatus::Deactivate {
            self.apply(ctx, Transition::DeactivateToDeactivating).await?;
            self.observe_status(ctx).await?;
        }

        let scans = deactivation_requests(&request, &record.manifests);
        let titles: Vec<String> = scans.iter().filter_map(|s| s.name.clone()).collect();
        let payload = device_payload(&request.tag_device, TagRequest::scans(scans))?;

        self.services
            .dispatch
            .set_parameter(
                &request.tag_element,
                self.config.device.scan_request_parameter,
                &payload,
            )
            .await?;
        debug!(scans = titles.len(), "📤 Scan delete requests dispatched");

        if ctx.status == Some(EntityStatus::Deactivating) {
            self.retire_channels(ctx, &request).await;
        }

        let timeout = self.config.retry.scan_timeout();
        let removed = self
            .converger
            .retry(|| self.scans_removed(&request.tag_element, &titles), timeout)
            .await?;

        if !removed {
            return Ok(self
                .timed_out(
                    ctx,
                    Severity::Warning,
                    timeout,
                    "Failed to deactivate the scanner within the timeout time.",
                    "Deactivate scanner was unable to verify scan deactivation before timeout.",
                )
                .await);
        }

        self.finalize_deactivation(ctx).await
    }

    async fn finalize_deactivation(&self, ctx: &mut StepContext) -> Result<StepReport> {
        match ctx.status {
            Some(EntityStatus::Deactivating) => {
                self.apply(ctx, Transition::DeactivatingToComplete).await?;
                Ok(self.finish(ctx, StepOutcome::Finished, StepDisposition::Completed))
            }
            Some(EntityStatus::Reprovision) => {
                self.apply(ctx, Transition::ReprovisionToInProgress).await?;
                Ok(self.finish(ctx, StepOutcome::Success, StepDisposition::Completed))
            }
            other => {
                let status = other.unwrap_or_default();
                let report = self
                    .finish_with_escalation(ctx, StepDisposition::UnexpectedStatus { status })
                    .await;
                self.log_incident(
                    ctx,
                    Severity::Warning,
                    Some(codes::INVALID_STATUS_FOR_TRANSITION),
                    "Status Transition condition",
                    Some("Failed to execute status transition due to unexpected status."),
                    format!(
                        "Expected the status to be deactivating or reprovision, but status is {status} so unable to perform a transition."
                    ),
                );
                Ok(report)
            }
        }
    }

    /// Move every channel of a deactivating scanner to `complete`; failures are per channel
    async fn retire_channels(&self, ctx: &StepContext, request: &ScannerRequest) {
        for channel_id in &request.channels {
            let result = self.retire_channel(*channel_id).await;

            match result {
                Ok(Some(status)) => {
                    debug!(channel_id = %channel_id, status = %status, "Channel retired")
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(channel_id = %channel_id, error = %error, "⚠️ Failed to retire channel");
                    self.log_incident(
                        ctx,
                        Severity::Warning,
                        Some(codes::CHILD_TRANSITION_FAILED),
                        "Channel retirement",
                        Some("Failed to move a channel to complete during deactivation."),
                        format!("Channel {channel_id}: {error}"),
                    );
                }
            }
        }
    }

    /// `None` when the channel is already retired or never started
    async fn retire_channel(&self, channel_id: Uuid) -> Result<Option<EntityStatus>> {
        let record = self
            .services
            .store
            .read_entity(channel_id)
            .await?
            .ok_or(ProvisioningError::EntityNotFound(channel_id))?;

        if matches!(record.status, EntityStatus::Complete | EntityStatus::Draft) {
            return Ok(None);
        }

        let status = self
            .state_machine(channel_id, EntityKind::Channel)
            .transition(StepIntent::RetireChild)
            .await?;
        Ok(Some(status))
    }

    /// True once no scan-channel row carries any of `titles`; an absent table counts as removed
    async fn scans_removed(&self, element: &str, titles: &[String]) -> Result<bool> {
        let device = &self.config.device;
        let rows = match self
            .services
            .tables
            .query_table(element, device.scan_channel_table, &[])
            .await
        {
            Ok(rows) => rows,
            Err(DeviceError::TableUnavailable { .. }) => return Ok(true),
            Err(error) => return Err(error.into()),
        };

        Ok(!rows.iter().any(|row| {
            let title = row.cell_or_empty(device.scan_title_column);
            titles.iter().any(|t| t == title)
        }))
    }
}
