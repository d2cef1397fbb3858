//! # Provisioning Orchestrator
//!
//! Entry point for every workflow step. Holds the injected host services and
//! the shared plumbing steps end with: guard checks, forward transitions,
//! escalation to error, incident logs and the one-time completion report.
//!
//! Each step runs its body as a fallible function and converts whatever comes
//! out of it into a [`StepReport`] at the boundary. A failed body always
//! escalates the record from the last status the step observed, logs the full
//! failure and finishes the step.

use super::aggregator::{ChildStatus, StatusAggregator};
use super::types::{StepDisposition, StepKind, StepOutcome, StepParameters, StepReport};
use crate::config::ProvisioningConfig;
use crate::constants::codes;
use crate::error::{ProvisioningError, Result};
use crate::events::{ErrorCode, IncidentLog, NotificationSink, Severity};
use crate::logging::{log_error, log_step_operation};
use crate::resilience::{ProbeOutcome, RetryConverger};
use crate::services::{
    CommandDispatch, CorrelationForwarder, DeviceTableSource, EntityStore, ProcessLauncher,
};
use crate::state_machine::{
    EntityKind, EntityStateMachine, EntityStatus, GuardDecision, StepGuard, Transition,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborators provided by the workflow host
#[derive(Clone)]
pub struct HostServices {
    pub store: Arc<dyn EntityStore>,
    pub tables: Arc<dyn DeviceTableSource>,
    pub dispatch: Arc<dyn CommandDispatch>,
    pub forwarder: Arc<dyn CorrelationForwarder>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub notifications: Arc<dyn NotificationSink>,
}

/// What a step knows about the record it is working on
#[derive(Debug, Clone)]
pub(crate) struct StepContext {
    pub step: StepKind,
    pub kind: EntityKind,
    pub entity_id: Option<Uuid>,
    /// Last status this step observed, used as the escalation start
    pub status: Option<EntityStatus>,
    pub affected_item: String,
    pub affected_service: String,
    pub transitions: Vec<Transition>,
}

impl StepContext {
    pub fn new(step: StepKind, kind: EntityKind) -> Self {
        Self {
            step,
            kind,
            entity_id: None,
            status: None,
            affected_item: step.script_name().to_string(),
            affected_service: String::new(),
            transitions: Vec::new(),
        }
    }

    pub fn report(&self, outcome: StepOutcome, disposition: StepDisposition) -> StepReport {
        StepReport {
            step: self.step,
            entity_id: self.entity_id,
            outcome,
            disposition,
            transitions: self.transitions.clone(),
            escalation: Vec::new(),
        }
    }

    /// Record id, once the step resolved it
    pub fn entity(&self) -> Result<Uuid> {
        self.entity_id.ok_or(ProvisioningError::EntityNotFound(Uuid::nil()))
    }
}

/// Runs workflow steps against the host services
pub struct ProvisioningOrchestrator {
    pub(crate) services: HostServices,
    pub(crate) config: ProvisioningConfig,
    pub(crate) converger: RetryConverger,
    pub(crate) aggregator: StatusAggregator,
}

impl ProvisioningOrchestrator {
    pub fn new(services: HostServices, config: ProvisioningConfig) -> Self {
        let converger = RetryConverger::from_config(&config.retry);
        Self {
            services,
            config,
            converger,
            aggregator: StatusAggregator::new(),
        }
    }

    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Run one step; the returned report is the step's only completion signal
    pub async fn run_step(&self, step: StepKind, params: &StepParameters) -> StepReport {
        match step {
            StepKind::DeactivateScanner => self.deactivate_scanner(params).await,
            StepKind::MonitorScannerProgress => self.monitor_scanner_progress(params).await,
            StepKind::MonitorChannelsProgress => self.monitor_channels_progress(params).await,
            StepKind::MonitorScanners => self.monitor_scanners(params).await,
            StepKind::ClearLayout => self.clear_layout(params).await,
        }
    }

    pub(crate) fn state_machine(&self, entity_id: Uuid, kind: EntityKind) -> EntityStateMachine {
        EntityStateMachine::new(entity_id, kind, self.services.store.clone())
    }

    /// Read the record's status and remember it as the escalation start
    pub(crate) async fn observe_status(&self, ctx: &mut StepContext) -> Result<EntityStatus> {
        let status = self.services.store.read_status(ctx.entity()?).await?;
        ctx.status = Some(status);
        Ok(status)
    }

    /// `Some(report)` when the guard tells the step to stand down
    pub(crate) fn check_guard(
        &self,
        ctx: &StepContext,
        guard: &StepGuard,
        status: EntityStatus,
    ) -> Option<StepReport> {
        let warned = match guard.check(status) {
            GuardDecision::Proceed => return None,
            GuardDecision::Ignore => false,
            GuardDecision::IgnoreWithWarning => true,
        };

        if warned {
            warn!(
                step = %ctx.step,
                entity_id = ?ctx.entity_id,
                status = %status,
                guard = guard.description(),
                "⚠️ Unexpected status, nothing to do"
            );
        } else {
            debug!(
                step = %ctx.step,
                entity_id = ?ctx.entity_id,
                status = %status,
                "Status not handled by this step, nothing to do"
            );
        }

        Some(self.finish(
            ctx,
            StepOutcome::Success,
            StepDisposition::GuardMismatch { status, warned },
        ))
    }

    /// Apply a forward transition and remember the new status
    pub(crate) async fn apply(&self, ctx: &mut StepContext, transition: Transition) -> Result<EntityStatus> {
        let machine = self.state_machine(ctx.entity()?, ctx.kind);
        let status = machine.apply(transition).await?;
        ctx.transitions.push(transition);
        ctx.status = Some(status);
        Ok(status)
    }

    /// Walk the escalation path from the last observed status
    pub(crate) async fn escalate(&self, ctx: &StepContext) -> Vec<Transition> {
        let Some(entity_id) = ctx.entity_id else {
            return Vec::new();
        };

        let report = self
            .state_machine(entity_id, ctx.kind)
            .escalate(ctx.status)
            .await;

        if let Some((transition, reason)) = &report.failed {
            log_error(
                ctx.step.script_name(),
                "escalate",
                reason,
                Some(format!("transition {transition} refused").as_str()),
            );
        }

        report.applied
    }

    pub(crate) fn log_incident(
        &self,
        ctx: &StepContext,
        severity: Severity,
        code: Option<&str>,
        source: &str,
        description: Option<&str>,
        notes: impl Into<String>,
    ) {
        let mut error_code = ErrorCode::automation(ctx.step.configuration_item(), severity, source);
        if let Some(code) = code {
            error_code = error_code.with_code(code);
        }
        if let Some(description) = description {
            error_code = error_code.with_description(description);
        }

        self.services.notifications.log(IncidentLog::new(
            ctx.affected_item.clone(),
            ctx.affected_service.clone(),
            error_code,
            notes,
        ));
    }

    pub(crate) fn finish(
        &self,
        ctx: &StepContext,
        outcome: StepOutcome,
        disposition: StepDisposition,
    ) -> StepReport {
        let report = ctx.report(outcome, disposition);
        log_step_operation(
            ctx.step.script_name(),
            ctx.entity_id,
            match outcome {
                StepOutcome::Success => "success",
                StepOutcome::Finished => "finished",
            },
            ctx.status.map(|s| s.as_str()),
        );
        report
    }

    /// Escalate, log and finish the step
    pub(crate) async fn finish_with_escalation(
        &self,
        ctx: &StepContext,
        disposition: StepDisposition,
    ) -> StepReport {
        let escalation = self.escalate(ctx).await;
        let mut report = self.finish(ctx, StepOutcome::Finished, disposition);
        report.escalation = escalation;
        report
    }

    /// Convergence timed out: escalate, log `RetryTimeout`, finish
    pub(crate) async fn timed_out(
        &self,
        ctx: &StepContext,
        severity: Severity,
        timeout: Duration,
        description: &str,
        notes: impl Into<String>,
    ) -> StepReport {
        warn!(
            step = %ctx.step,
            entity_id = ?ctx.entity_id,
            timeout_seconds = timeout.as_secs(),
            "⏰ Step timed out waiting for convergence"
        );

        let report = self
            .finish_with_escalation(
                ctx,
                StepDisposition::ConvergenceTimeout {
                    timeout_seconds: timeout.as_secs(),
                },
            )
            .await;

        self.log_incident(
            ctx,
            severity,
            Some(codes::RETRY_TIMEOUT),
            "Retry condition",
            Some(description),
            notes,
        );

        report
    }

    /// Unexpected failure at the step boundary: escalate, log with full detail, finish
    pub(crate) async fn faulted(
        &self,
        ctx: &StepContext,
        error: ProvisioningError,
        severity: Severity,
    ) -> StepReport {
        let message = error.to_string();
        log_error(
            ctx.step.script_name(),
            "run",
            &message,
            ctx.entity_id.map(|id| id.to_string()).as_deref(),
        );

        let report = self
            .finish_with_escalation(
                ctx,
                StepDisposition::UnhandledFault {
                    message: message.clone(),
                },
            )
            .await;

        self.log_incident(
            ctx,
            severity,
            Some(codes::UNHANDLED_FAULT),
            "Run()",
            Some(format!("Exception while processing {}.", ctx.step).as_str()),
            format!("{error:?}: {message}"),
        );

        report
    }

    /// One probe over a set of child records
    pub(crate) async fn child_statuses(
        &self,
        children: &[Uuid],
    ) -> Result<ProbeOutcome<Vec<ChildStatus>>> {
        let mut statuses = Vec::with_capacity(children.len());

        for id in children {
            let record = self
                .services
                .store
                .read_entity(*id)
                .await?
                .ok_or(ProvisioningError::EntityNotFound(*id))?;
            statuses.push(ChildStatus::new(*id, record.display_name(), record.status));
        }

        if StatusAggregator::all_settled(&statuses) {
            info!(children = statuses.len(), "✅ All children settled");
            Ok(ProbeOutcome::Converged(statuses))
        } else {
            Ok(ProbeOutcome::Pending(statuses))
        }
    }
}

/// Human wording of a wait limit for incident notes, e.g. `5 minutes`
pub(crate) fn wait_limit(timeout: Duration) -> String {
    let seconds = timeout.as_secs();
    match (seconds / 60, seconds % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 0 => format!("{minutes} minutes"),
        _ if seconds == 1 => "1 second".to_string(),
        _ => format!("{seconds} seconds"),
    }
}
