use crate::config::ConfigurationError;
use crate::orchestration::aggregator::AggregationError;
use crate::orchestration::types::ParameterError;
use crate::services::{DeviceError, StoreError};
use crate::state_machine::StateMachineError;

/// Crate-level error for everything that can go wrong inside a workflow step.
///
/// Step entry points never surface this to the host; it is caught at the step
/// boundary and turned into an escalation plus an incident log.
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("Entity store error: {0}")]
    Store(#[from] StoreError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, ProvisioningError>;
