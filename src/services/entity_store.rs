use crate::models::{EntityRecord, FieldRef, ScannerRequest};
use crate::state_machine::{EntityStatus, Transition};
use async_trait::async_trait;
use uuid::Uuid;

/// Errors reported by the workflow host's record store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Entity {0} not found")]
    NotFound(Uuid),

    #[error("Entity {id} has unknown status token '{token}'")]
    UnknownStatus { id: Uuid, token: String },

    #[error("Transition {transition} rejected for entity {id}: {reason}")]
    Rejected {
        id: Uuid,
        transition: String,
        reason: String,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent status records owned by the workflow host.
///
/// Transitions are atomic from the caller's point of view; a record is never
/// observed half-way through an edge.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Read the current status of a record
    async fn read_status(&self, id: Uuid) -> StoreResult<EntityStatus>;

    /// Read a record with its fields, or `None` if it does not exist
    async fn read_entity(&self, id: Uuid) -> StoreResult<Option<EntityRecord>>;

    /// Ask the host to execute one edge of the status graph
    async fn transition(&self, id: Uuid, transition: Transition) -> StoreResult<()>;

    /// Write one field of a record
    async fn write_field(&self, id: Uuid, field: &FieldRef, value: &str) -> StoreResult<()>;
}

/// Starts child workflow processes on the host
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Start the per-channel processes of a scanner whose scan converged
    async fn start_channel_processes(&self, scanner: &ScannerRequest) -> StoreResult<()>;
}
