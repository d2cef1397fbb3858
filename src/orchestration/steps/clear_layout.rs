//! Layout clear: free every layout slot a channel holds, then move the channel
//! on towards deactivation or reprovisioning.

use crate::constants::{codes, FREE_SLOT_MARKER};
use crate::error::Result;
use crate::events::Severity;
use crate::models::ChannelRequest;
use crate::orchestration::orchestrator::{ProvisioningOrchestrator, StepContext};
use crate::orchestration::types::{StepDisposition, StepKind, StepOutcome, StepParameters, StepReport};
use crate::services::ColumnFilter;
use crate::state_machine::guards::{CLEAR_LAYOUT_FOLLOW_UP_GUARD, CLEAR_LAYOUT_GUARD};
use crate::state_machine::{next_transition, EntityKind, EntityStatus, GuardDecision, StepIntent};
use tracing::{debug, info};

impl ProvisioningOrchestrator {
    /// Clear a channel's layout slots. Always reports success unless it faults.
    pub async fn clear_layout(&self, params: &StepParameters) -> StepReport {
        let mut ctx = StepContext::new(StepKind::ClearLayout, EntityKind::Channel);

        match self.run_clear_layout(params, &mut ctx).await {
            Ok(report) => report,
            Err(error) => self.faulted(&ctx, error, Severity::Critical).await,
        }
    }

    async fn run_clear_layout(
        &self,
        params: &StepParameters,
        ctx: &mut StepContext,
    ) -> Result<StepReport> {
        let request = ChannelRequest::from_parameters(params)?;
        ctx.entity_id = Some(request.instance_id);
        ctx.affected_item = request.channel_match.clone();
        ctx.affected_service = request.name.clone();

        let status = self.observe_status(ctx).await?;
        if let Some(report) = self.check_guard(ctx, &CLEAR_LAYOUT_GUARD, status) {
            return Ok(report);
        }

        let cleared = self.release_slots(&request).await?;
        info!(channel_id = %request.instance_id, cleared = cleared, "🧹 Layout slots released");

        match CLEAR_LAYOUT_FOLLOW_UP_GUARD.check(status) {
            GuardDecision::Proceed => {
                let intent = if status == EntityStatus::Deactivate {
                    StepIntent::BeginDeactivation
                } else {
                    StepIntent::BeginReprovision
                };
                if let Some(transition) = next_transition(status, intent) {
                    self.apply(ctx, transition).await?;
                }
            }
            GuardDecision::IgnoreWithWarning => {
                self.log_incident(
                    ctx,
                    Severity::Warning,
                    Some(codes::INVALID_STATUS_FOR_TRANSITION),
                    "Status Transition condition",
                    Some("Failed to execute status transition due to unexpected status."),
                    format!(
                        "Expected deactivate or reprovision statuses to transition, but current status is: {status}."
                    ),
                );
            }
            GuardDecision::Ignore => debug!(status = %status, "No follow-up transition"),
        }

        Ok(self.finish(ctx, StepOutcome::Success, StepDisposition::Completed))
    }

    /// Reset every slot occupied by the channel, pacing the device writes
    async fn release_slots(&self, request: &ChannelRequest) -> Result<usize> {
        let device = &self.config.device;
        let rows = self
            .services
            .tables
            .query_table(
                &request.tag_element,
                device.layout_table,
                &[ColumnFilter::equal(
                    device.layout_reservation_column,
                    request.channel_match.as_str(),
                )],
            )
            .await?;

        for (index, row) in rows.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.layout.clear_pacing()).await;
            }
            self.services
                .dispatch
                .set_cell(
                    &request.tag_element,
                    device.layout_clear_parameter,
                    &row.key,
                    FREE_SLOT_MARKER,
                )
                .await?;
            debug!(slot = %row.key, "Layout slot cleared");
        }

        Ok(rows.len())
    }
}
