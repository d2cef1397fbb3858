#![allow(clippy::doc_markdown)] // Allow technical terms like TAG, GUID in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # TAG Provisioning
//!
//! Workflow steps that provision broadcast channels on a multiviewer: scan a
//! source, wait for the scans to finish, place the resulting channels into a
//! shared layout grid and roll child statuses up into their scanner and
//! provision records.
//!
//! ## Overview
//!
//! Each step is triggered by an external workflow host and works out from
//! persisted status what remains to be done. It waits, bounded, for the device
//! or for child processes to converge, requests the next status transition
//! and reports completion exactly once. When anything goes wrong the record is
//! escalated to an error status before the step returns.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Status vocabularies, transitions, escalation paths and step guards
//! - [`resilience`] - Bounded polling of external state
//! - [`orchestration`] - The workflow steps, aggregation and layout allocation
//! - [`services`] - Traits for the workflow host, the device and the correlation endpoint
//! - [`events`] - Incident logs and where they go
//! - [`models`] - Records and step requests
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//! - [`test_helpers`] - In-memory collaborators for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tag_provisioning::config::ConfigLoader;
//! use tag_provisioning::orchestration::{HostServices, ProvisioningOrchestrator, StepKind, StepParameters};
//!
//! # async fn example(services: HostServices, params: StepParameters) -> Result<(), Box<dyn std::error::Error>> {
//! tag_provisioning::logging::init_structured_logging();
//!
//! let config = ConfigLoader::new().load()?;
//! let orchestrator = ProvisioningOrchestrator::new(services, config);
//!
//! let report = orchestrator.run_step(StepKind::MonitorScanners, &params).await;
//! println!("{} ended {:?}", report.step, report.outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Time-dependent tests run on tokio's paused clock, so five- and ten-minute
//! waits finish instantly:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod services;
pub mod state_machine;
pub mod test_helpers;

pub use config::{ConfigLoader, ConfigurationError, ProvisioningConfig};
pub use error::{ProvisioningError, Result};
pub use events::{IncidentLog, NotificationSink, Severity};
pub use orchestration::{
    HostServices, ProvisioningOrchestrator, StepKind, StepOutcome, StepParameters, StepReport,
};
pub use state_machine::{EntityKind, EntityStatus, Transition};
