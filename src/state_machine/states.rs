use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of provisioning record a status belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A single monitored channel produced by a scan
    Channel,
    /// A scan of one source on the multiviewer device; parent of channels
    Scanner,
    /// The top-level provisioning request; parent of scanners
    Provision,
}

impl EntityKind {
    /// Whether records of this kind aggregate children
    pub fn has_children(&self) -> bool {
        matches!(self, Self::Scanner | Self::Provision)
    }

    /// Statuses a record of this kind may legally hold
    pub fn legal_statuses(&self) -> &'static [EntityStatus] {
        use EntityStatus::*;
        match self {
            // Channels have no children, so there is nothing to be partially in error about.
            Self::Channel => &[
                Draft,
                Ready,
                InProgress,
                Active,
                Complete,
                Deactivate,
                Deactivating,
                Error,
                Reprovision,
            ],
            Self::Scanner | Self::Provision => &EntityStatus::ALL,
        }
    }

    /// Check whether `status` belongs to this kind's vocabulary
    pub fn allows(&self, status: EntityStatus) -> bool {
        self.legal_statuses().contains(&status)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => write!(f, "channel"),
            Self::Scanner => write!(f, "scanner"),
            Self::Provision => write!(f, "provision"),
        }
    }
}

/// Status of a provisioning record, matching the host's status tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Created but not yet submitted
    Draft,
    /// Submitted and waiting to be picked up
    Ready,
    /// Provisioning work underway
    InProgress,
    /// Provisioned without errors
    Active,
    /// Provisioned, but some children failed
    ActiveWithErrors,
    /// Torn down cleanly
    Complete,
    /// Teardown requested
    Deactivate,
    /// Teardown underway
    Deactivating,
    /// Provisioning or teardown failed
    Error,
    /// Re-provisioning requested
    Reprovision,
}

impl EntityStatus {
    pub const ALL: [EntityStatus; 10] = [
        Self::Draft,
        Self::Ready,
        Self::InProgress,
        Self::Active,
        Self::ActiveWithErrors,
        Self::Complete,
        Self::Deactivate,
        Self::Deactivating,
        Self::Error,
        Self::Reprovision,
    ];

    /// Host token for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Active => "active",
            Self::ActiveWithErrors => "active_with_errors",
            Self::Complete => "complete",
            Self::Deactivate => "deactivate",
            Self::Deactivating => "deactivating",
            Self::Error => "error",
            Self::Reprovision => "reprovision",
        }
    }

    /// A child in one of these statuses has stopped moving for aggregation purposes
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Active | Self::Complete | Self::ActiveWithErrors | Self::Error
        )
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid entity status: {s}"))
    }
}

/// Default status for newly created records
impl Default for EntityStatus {
    fn default() -> Self {
        Self::Draft
    }
}
