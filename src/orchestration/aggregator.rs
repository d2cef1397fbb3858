//! # Status Aggregator
//!
//! Rolls the settled statuses of a parent's children up into one parent
//! decision. `active` and `complete` children count as success,
//! `active_with_errors` adds half an error and `error` a full one. The error
//! score is kept in halves so comparisons stay exact.

use crate::state_machine::{EntityStatus, Transition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How one settled child contributes to the parent decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildOutcome {
    Success,
    PartialError,
    Error,
}

impl ChildOutcome {
    /// Classify a child status; `None` means the child has not settled yet
    pub fn classify(status: EntityStatus) -> Option<Self> {
        match status {
            EntityStatus::Active | EntityStatus::Complete => Some(Self::Success),
            EntityStatus::ActiveWithErrors => Some(Self::PartialError),
            EntityStatus::Error => Some(Self::Error),
            _ => None,
        }
    }

    /// Contribution to the error score, in halves
    fn error_halves(&self) -> u32 {
        match self {
            Self::Success => 0,
            Self::PartialError => 1,
            Self::Error => 2,
        }
    }
}

/// A child as observed by one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildStatus {
    pub id: Uuid,
    pub name: String,
    pub status: EntityStatus,
}

impl ChildStatus {
    pub fn new(id: Uuid, name: impl Into<String>, status: EntityStatus) -> Self {
        Self {
            id,
            name: name.into(),
            status,
        }
    }

    pub fn is_settled(&self) -> bool {
        ChildOutcome::classify(self.status).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    #[error("Child '{name}' ({id}) has not settled, status is {status}")]
    NotConverged {
        id: Uuid,
        name: String,
        status: EntityStatus,
    },
}

/// Parent decision for provisioning-style aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    AllFailed { failed: Vec<String> },
    PartialFailure { failed: Vec<String> },
    Success,
}

impl Decision {
    /// Edge the parent takes out of `in_progress`
    pub fn parent_transition(&self) -> Transition {
        match self {
            Self::AllFailed { .. } => Transition::InProgressToError,
            Self::PartialFailure { .. } => Transition::InProgressToActiveWithErrors,
            Self::Success => Transition::InProgressToActive,
        }
    }

    pub fn failed(&self) -> &[String] {
        match self {
            Self::AllFailed { failed } | Self::PartialFailure { failed } => failed,
            Self::Success => &[],
        }
    }

    /// Deactivation only distinguishes clean from not clean
    pub fn collapse_deactivation(&self) -> DeactivationDecision {
        match self {
            Self::Success => DeactivationDecision::Complete,
            Self::AllFailed { failed } | Self::PartialFailure { failed } => {
                DeactivationDecision::Failed {
                    failed: failed.clone(),
                }
            }
        }
    }
}

/// Parent decision for deactivation-style aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DeactivationDecision {
    Complete,
    Failed { failed: Vec<String> },
}

impl DeactivationDecision {
    /// Edge the parent takes out of `deactivating`
    pub fn parent_transition(&self) -> Transition {
        match self {
            Self::Complete => Transition::DeactivatingToComplete,
            Self::Failed { .. } => Transition::DeactivatingToError,
        }
    }
}

/// Result of aggregating a settled set of children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub child_count: usize,
    error_halves: u32,
    pub decision: Decision,
}

impl Aggregation {
    /// Error score: 1.0 per errored child, 0.5 per child active with errors
    pub fn error_score(&self) -> f64 {
        f64::from(self.error_halves) / 2.0
    }
}

/// Computes parent decisions from child outcomes
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusAggregator;

impl StatusAggregator {
    pub fn new() -> Self {
        Self
    }

    /// True once every child reached a classified status
    pub fn all_settled(children: &[ChildStatus]) -> bool {
        children.iter().all(ChildStatus::is_settled)
    }

    /// Aggregate settled children into a parent decision.
    ///
    /// Failed children are named in encounter order. An empty child set scores
    /// 0 against a count of 0 and is therefore reported as all failed.
    pub fn aggregate(&self, children: &[ChildStatus]) -> Result<Aggregation, AggregationError> {
        let mut error_halves = 0u32;
        let mut failed = Vec::new();

        for child in children {
            let outcome =
                ChildOutcome::classify(child.status).ok_or_else(|| AggregationError::NotConverged {
                    id: child.id,
                    name: child.name.clone(),
                    status: child.status,
                })?;

            if outcome != ChildOutcome::Success {
                failed.push(child.name.clone());
            }
            error_halves += outcome.error_halves();
        }

        let full_score = 2 * children.len() as u32;
        let decision = if error_halves == full_score {
            Decision::AllFailed { failed }
        } else if error_halves > 0 {
            Decision::PartialFailure { failed }
        } else {
            Decision::Success
        };

        Ok(Aggregation {
            child_count: children.len(),
            error_halves,
            decision,
        })
    }
}
