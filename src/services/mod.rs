//! # Host Services
//!
//! Collaborators the orchestrator calls into. The workflow host, the managed
//! device and the correlation endpoint all live outside this crate; each is a
//! trait here so steps can be driven against in-memory fakes.
//!
//! - [`EntityStore`]: status records and their fields
//! - [`DeviceTableSource`]: read side of the managed device (tables)
//! - [`CommandDispatch`]: write side of the managed device (parameters and cells)
//! - [`CorrelationForwarder`]: best-effort status push to an upstream event manager
//! - [`ProcessLauncher`]: starts child workflow processes

pub mod correlation;
pub mod device;
pub mod entity_store;

pub use correlation::{
    CorrelationForwarder, ForwardingAddress, ForwardingRequest, ProcessResponse, TagStatus,
};
pub use device::{
    ColumnFilter, CommandDispatch, Comparison, DeviceError, DeviceResult, DeviceTableSource,
    ScanMode, TableRow,
};
pub use entity_store::{EntityStore, ProcessLauncher, StoreError, StoreResult};
