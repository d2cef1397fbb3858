//! Scan progress: wait for every manifest's scan to finish on the device, then
//! place the scanner's channels into their layouts and start their processes.

use crate::constants::codes;
use crate::error::{ProvisioningError, Result};
use crate::events::Severity;
use crate::models::{EntityRecord, Manifest, ScannerRequest};
use crate::orchestration::layout_allocator::{
    group_by_layout, InsufficientSpace, LayoutPlacement, LayoutSlotAllocator,
};
use crate::orchestration::orchestrator::{ProvisioningOrchestrator, StepContext};
use crate::orchestration::types::{StepDisposition, StepKind, StepOutcome, StepParameters, StepReport};
use crate::resilience::ProbeOutcome;
use crate::services::{DeviceError, ScanMode, TableRow};
use crate::state_machine::guards::SCANNER_PROGRESS_GUARD;
use crate::state_machine::EntityKind;
use tracing::{debug, info, warn};

/// What one look at the scan-channel table found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ScanProgress {
    finished: usize,
    expected: usize,
}

impl ProvisioningOrchestrator {
    /// Wait for the scanner's scans, then lay out and launch its channels.
    ///
    /// Only an `in_progress` scanner is handled. Layout placement problems are
    /// logged and never fail the step.
    pub async fn monitor_scanner_progress(&self, params: &StepParameters) -> StepReport {
        let mut ctx = StepContext::new(StepKind::MonitorScannerProgress, EntityKind::Scanner);

        match self.run_monitor_scanner_progress(params, &mut ctx).await {
            Ok(report) => report,
            Err(error) => self.faulted(&ctx, error, Severity::Warning).await,
        }
    }

    async fn run_monitor_scanner_progress(
        &self,
        params: &StepParameters,
        ctx: &mut StepContext,
    ) -> Result<StepReport> {
        let request = ScannerRequest::from_parameters(params)?;
        ctx.entity_id = Some(request.instance_id);
        ctx.affected_item = request.tag_element.clone();
        ctx.affected_service = request.scan_name.clone();

        let status = self.observe_status(ctx).await?;
        if let Some(report) = self.check_guard(ctx, &SCANNER_PROGRESS_GUARD, status) {
            return Ok(report);
        }

        let record = self
            .services
            .store
            .read_entity(request.instance_id)
            .await?
            .ok_or(ProvisioningError::EntityNotFound(request.instance_id))?;

        info!(
            scanner_id = %request.instance_id,
            manifests = record.manifests.len(),
            "🔍 Waiting for scans to finish"
        );

        let timeout = self.config.retry.scan_timeout();
        let convergence = self
            .converger
            .converge(|| self.scan_progress(&request, &record.manifests), timeout)
            .await?;

        if !convergence.is_converged() {
            let progress = convergence.into_snapshot();
            debug!(
                finished = progress.finished,
                expected = progress.expected,
                "Scan progress at timeout"
            );
            return Ok(self
                .timed_out(
                    ctx,
                    Severity::Warning,
                    timeout,
                    "Scan did not finish due to verify timeout.",
                    "Failed to verify scan completion before timeout time",
                )
                .await);
        }

        self.place_channel_layouts(ctx, &request).await;

        self.services
            .launcher
            .start_channel_processes(&request)
            .await?;
        info!(scanner_id = %request.instance_id, channels = request.channels.len(), "🚀 Channel processes started");

        Ok(self.finish(ctx, StepOutcome::Success, StepDisposition::Completed))
    }

    async fn scan_progress(
        &self,
        request: &ScannerRequest,
        manifests: &[Manifest],
    ) -> Result<ProbeOutcome<ScanProgress>> {
        let expected = manifests.len();
        let rows = match self
            .services
            .tables
            .query_table(&request.tag_element, self.config.device.scan_channel_table, &[])
            .await
        {
            Ok(rows) => rows,
            Err(DeviceError::TableUnavailable { .. }) => {
                return Ok(ProbeOutcome::Pending(ScanProgress {
                    finished: 0,
                    expected,
                }))
            }
            Err(error) => return Err(error.into()),
        };

        let prefix = request.title_prefix();
        let finished = manifests
            .iter()
            .filter(|manifest| rows.iter().any(|row| self.scan_finished(row, prefix, &manifest.url)))
            .count();

        let progress = ScanProgress { finished, expected };
        if finished == expected {
            Ok(ProbeOutcome::Converged(progress))
        } else {
            Ok(ProbeOutcome::Pending(progress))
        }
    }

    fn scan_finished(&self, row: &TableRow, prefix: &str, url: &str) -> bool {
        let device = &self.config.device;

        let title =
            html_escape::decode_html_entities(row.cell_or_empty(device.scan_title_column));
        let carries_url = row
            .cell_or_empty(device.scan_urls_column)
            .split('|')
            .any(|candidate| candidate.trim() == url);
        let finished = ScanMode::from_cell(row.cell_or_empty(device.scan_mode_column))
            .is_some_and(|mode| mode.is_finished());

        title.contains(prefix) && carries_url && finished
    }

    /// Best-effort: every problem is logged, none is returned
    async fn place_channel_layouts(&self, ctx: &StepContext, request: &ScannerRequest) {
        let channels = self.read_channels(ctx, request).await;
        if channels.is_empty() {
            return;
        }

        let allocator = LayoutSlotAllocator::new(
            self.services.tables.clone(),
            self.services.dispatch.clone(),
            self.services.store.clone(),
            self.config.device.clone(),
        );

        for (layout, requests) in group_by_layout(&channels) {
            match allocator.place(&request.tag_element, &layout, &requests).await {
                Ok(LayoutPlacement::Placed { failures, .. }) => {
                    for failure in failures {
                        self.log_incident(
                            ctx,
                            Severity::Minor,
                            None,
                            "Layout assignment",
                            Some("Failed to assign a layout position to a channel."),
                            format!(
                                "Channel {} could not take {}: {}",
                                failure.channel_id, failure.slot, failure.reason
                            ),
                        );
                    }
                }
                Ok(LayoutPlacement::Insufficient(shortfall)) => {
                    self.log_shortfall(ctx, &shortfall);
                }
                Err(error) => {
                    warn!(layout = %layout, error = %error, "⚠️ Layout could not be read");
                    self.log_incident(
                        ctx,
                        Severity::Minor,
                        None,
                        "Layout placement",
                        Some("Failed to read the layout table."),
                        format!("Layout {layout}: {error}"),
                    );
                }
            }
        }
    }

    async fn read_channels(&self, ctx: &StepContext, request: &ScannerRequest) -> Vec<EntityRecord> {
        let mut channels = Vec::with_capacity(request.channels.len());

        for id in &request.channels {
            match self.services.store.read_entity(*id).await {
                Ok(Some(record)) => channels.push(record),
                Ok(None) => {
                    warn!(channel_id = %id, "⚠️ Channel record not found");
                    self.log_incident(
                        ctx,
                        Severity::Minor,
                        Some(codes::NO_CHANNEL_INSTANCES),
                        "Channel Instance check",
                        Some("Unable to find the associated channel record."),
                        format!("No TAG Channel Instance found with instanceId: {id}"),
                    );
                }
                Err(error) => {
                    self.log_incident(
                        ctx,
                        Severity::Minor,
                        None,
                        "Channel Instance check",
                        Some("Failed to read a channel record."),
                        format!("Channel {id}: {error}"),
                    );
                }
            }
        }

        channels
    }

    fn log_shortfall(&self, ctx: &StepContext, shortfall: &InsufficientSpace) {
        let (severity, code) = match shortfall {
            InsufficientSpace::NotEnoughFree { .. } => {
                (Severity::Minor, codes::NOT_ENOUGH_SPACE_IN_LAYOUT)
            }
            InsufficientSpace::NotSequential { .. } => {
                (Severity::Major, codes::NOT_ENOUGH_SEQUENTIAL_SPACE_IN_LAYOUT)
            }
        };

        self.log_incident(
            ctx,
            severity,
            Some(code),
            "Layout space check",
            Some("Not enough space in layout."),
            shortfall.to_string(),
        );
    }
}
