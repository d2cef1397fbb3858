use super::events::{StepIntent, Transition};
use super::states::{EntityKind, EntityStatus};
use crate::services::StoreError;

/// Errors raised while resolving or applying status transitions
#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("No transition for intent {intent:?} from status {from}")]
    NoTransitionForIntent { from: EntityStatus, intent: StepIntent },

    #[error("Transition {transition} does not apply to a {kind} in status {from}")]
    InvalidTransition {
        kind: EntityKind,
        from: EntityStatus,
        transition: Transition,
    },

    #[error("Status {status} is not legal for a {kind}")]
    IllegalStatus { kind: EntityKind, status: EntityStatus },

    #[error("Transition {transition} was rejected by the store: {source}")]
    TransitionRejected {
        transition: Transition,
        #[source]
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StateMachineError::NoTransitionForIntent {
            from: EntityStatus::Complete,
            intent: StepIntent::ConvergeActive,
        };
        assert_eq!(
            err.to_string(),
            "No transition for intent ConvergeActive from status complete"
        );

        let err = StateMachineError::InvalidTransition {
            kind: EntityKind::Channel,
            from: EntityStatus::InProgress,
            transition: Transition::InProgressToActiveWithErrors,
        };
        assert_eq!(
            err.to_string(),
            "Transition inprogress_to_activewitherrors does not apply to a channel in status in_progress"
        );
    }
}
