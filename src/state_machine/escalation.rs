//! Canonical paths from any status to an error-bearing status.
//!
//! When a step fails it must leave its record in an error status, but the host
//! only executes single edges. The path for each status is fixed; statuses with no
//! entry (currently only `error`) are left untouched.

use super::events::Transition;
use super::states::EntityStatus;

/// Ordered transitions that move a record in `current` to an error status
pub fn escalate_to_error(current: EntityStatus) -> &'static [Transition] {
    use Transition::*;
    match current {
        EntityStatus::Draft => &[DraftToReady, ReadyToInProgress, InProgressToError],
        EntityStatus::Ready => &[ReadyToInProgress, InProgressToError],
        EntityStatus::InProgress => &[InProgressToError],
        EntityStatus::Active => &[ActiveToReprovision, ReprovisionToInProgress, InProgressToError],
        EntityStatus::Deactivate => &[DeactivateToDeactivating, DeactivatingToError],
        EntityStatus::Deactivating => &[DeactivatingToError],
        EntityStatus::Reprovision => &[ReprovisionToInProgress, InProgressToError],
        EntityStatus::Complete => &[CompleteToReady, ReadyToInProgress, InProgressToError],
        EntityStatus::ActiveWithErrors => &[
            ActiveWithErrorsToDeactivate,
            DeactivateToDeactivating,
            DeactivatingToError,
        ],
        // TODO: decide with product whether `error` should re-enter via error_to_complete
        EntityStatus::Error => &[],
    }
}

/// Escalation path for a status that may not be known (e.g. the record could not be read)
pub fn escalate_from(current: Option<EntityStatus>) -> &'static [Transition] {
    current.map(escalate_to_error).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use EntityStatus::*;

    #[test]
    fn test_escalation_table() {
        let table: [(EntityStatus, &[&str]); 9] = [
            (Draft, &["draft_to_ready", "ready_to_inprogress", "inprogress_to_error"]),
            (Ready, &["ready_to_inprogress", "inprogress_to_error"]),
            (InProgress, &["inprogress_to_error"]),
            (
                Active,
                &["active_to_reprovision", "reprovision_to_inprogress", "inprogress_to_error"],
            ),
            (Deactivate, &["deactivate_to_deactivating", "deactivating_to_error"]),
            (Deactivating, &["deactivating_to_error"]),
            (Reprovision, &["reprovision_to_inprogress", "inprogress_to_error"]),
            (Complete, &["complete_to_ready", "ready_to_inprogress", "inprogress_to_error"]),
            (
                ActiveWithErrors,
                &[
                    "activewitherrors_to_deactivate",
                    "deactivate_to_deactivating",
                    "deactivating_to_error",
                ],
            ),
        ];

        for (status, expected) in table {
            let ids: Vec<&str> = escalate_to_error(status).iter().map(|t| t.id()).collect();
            assert_eq!(ids, expected, "escalation path for {status}");
        }
    }

    #[test]
    fn test_unlisted_status_does_not_escalate() {
        assert!(escalate_to_error(Error).is_empty());
        assert!(escalate_from(None).is_empty());
    }

    #[test]
    fn test_paths_are_chained_and_end_in_error() {
        for status in EntityStatus::ALL {
            let path = escalate_to_error(status);
            let mut current = status;
            for transition in path {
                assert_eq!(transition.from_status(), current);
                current = transition.to_status();
            }
            if !path.is_empty() {
                assert_eq!(current, Error);
            }
        }
    }
}
