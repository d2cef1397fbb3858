//! Workflow steps, one module per step kind.
//!
//! Every step is an `async fn(&self, &StepParameters) -> StepReport` on
//! [`ProvisioningOrchestrator`](super::ProvisioningOrchestrator) and never
//! returns an error to the host.

mod clear_layout;
mod deactivate_scanner;
mod monitor_channels_progress;
mod monitor_scanner_progress;
mod monitor_scanners;
