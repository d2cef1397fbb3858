//! # Orchestration
//!
//! Workflow steps and the logic they share.
//!
//! ## Core Components
//!
//! - **ProvisioningOrchestrator**: entry point for every step; guards, transitions,
//!   escalation and incident logging
//! - **StatusAggregator**: rolls settled child statuses up into a parent decision
//! - **LayoutSlotAllocator**: places channel batches into contiguous layout slots
//! - **Scan requests**: JSON payloads pushed to the device scan parameter
//!
//! Each step is invoked independently by the workflow host. A step reads the
//! status it needs, stands down when a guard says the work is not for it,
//! waits for the device or for its children through the
//! [`RetryConverger`](crate::resilience::RetryConverger), and ends with one
//! [`StepReport`].

pub mod aggregator;
pub mod layout_allocator;
pub mod orchestrator;
pub mod scan_request;
pub mod steps;
pub mod types;

pub use aggregator::{
    Aggregation, AggregationError, ChildOutcome, ChildStatus, DeactivationDecision, Decision,
    StatusAggregator,
};
pub use layout_allocator::{
    allocate, group_by_layout, InsufficientSpace, LayoutPlacement, LayoutSlotAllocator,
    PlacementFailure, PlacementRequest, SlotKey,
};
pub use orchestrator::{HostServices, ProvisioningOrchestrator};
pub use scan_request::{ScanAction, ScanRequest, TagRequest};
pub use types::{
    ParameterError, ParameterValue, StepDisposition, StepKind, StepOutcome, StepParameters,
    StepReport,
};
