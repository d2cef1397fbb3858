use super::states::EntityStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named edge of the status graph, as understood by the workflow host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    DraftToReady,
    ReadyToInProgress,
    InProgressToActive,
    InProgressToActiveWithErrors,
    InProgressToError,
    ActiveToReprovision,
    ActiveToComplete,
    ActiveWithErrorsToDeactivate,
    ReprovisionToInProgress,
    DeactivateToDeactivating,
    DeactivatingToComplete,
    DeactivatingToError,
    CompleteToReady,
    ErrorToComplete,
}

impl Transition {
    pub const ALL: [Transition; 14] = [
        Self::DraftToReady,
        Self::ReadyToInProgress,
        Self::InProgressToActive,
        Self::InProgressToActiveWithErrors,
        Self::InProgressToError,
        Self::ActiveToReprovision,
        Self::ActiveToComplete,
        Self::ActiveWithErrorsToDeactivate,
        Self::ReprovisionToInProgress,
        Self::DeactivateToDeactivating,
        Self::DeactivatingToComplete,
        Self::DeactivatingToError,
        Self::CompleteToReady,
        Self::ErrorToComplete,
    ];

    /// Transition id sent to the host
    pub fn id(&self) -> &'static str {
        match self {
            Self::DraftToReady => "draft_to_ready",
            Self::ReadyToInProgress => "ready_to_inprogress",
            Self::InProgressToActive => "inprogress_to_active",
            Self::InProgressToActiveWithErrors => "inprogress_to_activewitherrors",
            Self::InProgressToError => "inprogress_to_error",
            Self::ActiveToReprovision => "active_to_reprovision",
            Self::ActiveToComplete => "active_to_complete",
            Self::ActiveWithErrorsToDeactivate => "activewitherrors_to_deactivate",
            Self::ReprovisionToInProgress => "reprovision_to_inprogress",
            Self::DeactivateToDeactivating => "deactivate_to_deactivating",
            Self::DeactivatingToComplete => "deactivating_to_complete",
            Self::DeactivatingToError => "deactivating_to_error",
            Self::CompleteToReady => "complete_to_ready",
            Self::ErrorToComplete => "error_to_complete",
        }
    }

    /// Status the record must hold for this transition to apply
    pub fn from_status(&self) -> EntityStatus {
        use EntityStatus::*;
        match self {
            Self::DraftToReady => Draft,
            Self::ReadyToInProgress => Ready,
            Self::InProgressToActive | Self::InProgressToActiveWithErrors | Self::InProgressToError => {
                InProgress
            }
            Self::ActiveToReprovision | Self::ActiveToComplete => Active,
            Self::ActiveWithErrorsToDeactivate => ActiveWithErrors,
            Self::ReprovisionToInProgress => Reprovision,
            Self::DeactivateToDeactivating => Deactivate,
            Self::DeactivatingToComplete | Self::DeactivatingToError => Deactivating,
            Self::CompleteToReady => Complete,
            Self::ErrorToComplete => Error,
        }
    }

    /// Status the record holds once the transition is applied
    pub fn to_status(&self) -> EntityStatus {
        use EntityStatus::*;
        match self {
            Self::DraftToReady | Self::CompleteToReady => Ready,
            Self::ReadyToInProgress | Self::ReprovisionToInProgress => InProgress,
            Self::InProgressToActive => Active,
            Self::InProgressToActiveWithErrors => ActiveWithErrors,
            Self::InProgressToError | Self::DeactivatingToError => Error,
            Self::ActiveToReprovision => Reprovision,
            Self::ActiveToComplete | Self::DeactivatingToComplete | Self::ErrorToComplete => {
                Complete
            }
            Self::ActiveWithErrorsToDeactivate => Deactivate,
            Self::DeactivateToDeactivating => Deactivating,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Transition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transition::ALL
            .iter()
            .copied()
            .find(|transition| transition.id() == s)
            .ok_or_else(|| format!("Invalid transition id: {s}"))
    }
}

/// What a workflow step wants to happen to a record, independent of its current status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepIntent {
    /// Start tearing the record down
    BeginDeactivation,
    /// Start provisioning the record again
    BeginReprovision,
    /// Teardown finished cleanly
    CompleteDeactivation,
    /// Provisioning converged without errors
    ConvergeActive,
    /// Provisioning converged with some failed children
    ConvergeActiveWithErrors,
    /// Work failed; move to the error status directly reachable from here
    Fail,
    /// Retire a child record while its parent is being torn down
    RetireChild,
}

impl StepIntent {
    /// Get a string representation of the intent for logging
    pub fn intent_type(&self) -> &'static str {
        match self {
            Self::BeginDeactivation => "begin_deactivation",
            Self::BeginReprovision => "begin_reprovision",
            Self::CompleteDeactivation => "complete_deactivation",
            Self::ConvergeActive => "converge_active",
            Self::ConvergeActiveWithErrors => "converge_active_with_errors",
            Self::Fail => "fail",
            Self::RetireChild => "retire_child",
        }
    }
}
