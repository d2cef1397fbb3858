use super::{
    errors::{StateMachineError, StateMachineResult},
    escalation::escalate_to_error,
    events::{StepIntent, Transition},
    states::{EntityKind, EntityStatus},
};
use crate::services::EntityStore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Resolve the edge a step intent maps to from the current status.
///
/// Returns `None` when the intent has no meaning in that status; callers treat that
/// as a guard mismatch, not a fault.
pub fn next_transition(current: EntityStatus, intent: StepIntent) -> Option<Transition> {
    use EntityStatus as S;
    use StepIntent as I;

    let transition = match (current, intent) {
        (S::Deactivate, I::BeginDeactivation) => Transition::DeactivateToDeactivating,
        (S::ActiveWithErrors, I::BeginDeactivation) => Transition::ActiveWithErrorsToDeactivate,
        (S::Reprovision, I::BeginReprovision) => Transition::ReprovisionToInProgress,
        (S::Active, I::BeginReprovision) => Transition::ActiveToReprovision,
        (S::Deactivating, I::CompleteDeactivation) => Transition::DeactivatingToComplete,
        (S::InProgress, I::ConvergeActive) => Transition::InProgressToActive,
        (S::InProgress, I::ConvergeActiveWithErrors) => Transition::InProgressToActiveWithErrors,
        (S::InProgress, I::Fail) => Transition::InProgressToError,
        (S::Deactivating, I::Fail) => Transition::DeactivatingToError,
        (S::Active, I::RetireChild) => Transition::ActiveToComplete,
        (S::Error, I::RetireChild) => Transition::ErrorToComplete,
        _ => return None,
    };

    Some(transition)
}

/// Edges of the status graph available to one kind of record
pub fn transitions_for(kind: EntityKind) -> Vec<Transition> {
    Transition::ALL
        .into_iter()
        .filter(|t| kind.allows(t.from_status()) && kind.allows(t.to_status()))
        .collect()
}

/// Check that `transition` is an edge of `kind`'s graph leaving `current`
pub fn validate_transition(
    kind: EntityKind,
    current: EntityStatus,
    transition: Transition,
) -> StateMachineResult<()> {
    if !kind.allows(current) {
        return Err(StateMachineError::IllegalStatus {
            kind,
            status: current,
        });
    }

    if transition.from_status() != current || !kind.allows(transition.to_status()) {
        return Err(StateMachineError::InvalidTransition {
            kind,
            from: current,
            transition,
        });
    }

    Ok(())
}

/// Result of walking an escalation path against the store
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EscalationReport {
    /// Edges the store accepted, in order
    pub applied: Vec<Transition>,
    /// First edge the store refused, with the reason; the walk stops there
    pub failed: Option<(Transition, String)>,
}

impl EscalationReport {
    /// True when there was nothing to do or every edge was applied
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

/// Status state machine bound to one persisted record.
///
/// The store owns the record; this type decides which edge to request and
/// keeps the host from ever seeing an edge that isn't in the graph.
pub struct EntityStateMachine {
    entity_id: Uuid,
    kind: EntityKind,
    store: Arc<dyn EntityStore>,
}

impl EntityStateMachine {
    /// Create a new state machine for the given record
    pub fn new(entity_id: Uuid, kind: EntityKind, store: Arc<dyn EntityStore>) -> Self {
        Self {
            entity_id,
            kind,
            store,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Read the record's current status from the store
    pub async fn current_status(&self) -> StateMachineResult<EntityStatus> {
        Ok(self.store.read_status(self.entity_id).await?)
    }

    /// Resolve `intent` against the current status and apply the resulting edge
    pub async fn transition(&self, intent: StepIntent) -> StateMachineResult<EntityStatus> {
        let current = self.current_status().await?;
        let transition = next_transition(current, intent).ok_or(
            StateMachineError::NoTransitionForIntent {
                from: current,
                intent,
            },
        )?;

        debug!(
            entity_id = %self.entity_id,
            intent = intent.intent_type(),
            transition = %transition,
            "Intent resolved"
        );
        self.apply_from(current, transition).await
    }

    /// Apply an explicit edge, validating it against the current status first
    pub async fn apply(&self, transition: Transition) -> StateMachineResult<EntityStatus> {
        let current = self.current_status().await?;
        self.apply_from(current, transition).await
    }

    async fn apply_from(
        &self,
        current: EntityStatus,
        transition: Transition,
    ) -> StateMachineResult<EntityStatus> {
        validate_transition(self.kind, current, transition)?;

        self.store
            .transition(self.entity_id, transition)
            .await
            .map_err(|source| StateMachineError::TransitionRejected { transition, source })?;

        info!(
            entity_id = %self.entity_id,
            kind = %self.kind,
            from = %current,
            to = %transition.to_status(),
            transition = %transition,
            "🔀 Status transition applied"
        );

        Ok(transition.to_status())
    }

    /// Walk the escalation path for `from` against the store.
    ///
    /// `from` is the status the calling step last observed; the path is not
    /// recomputed mid-walk. A refused edge stops the walk and is reported.
    pub async fn escalate(&self, from: Option<EntityStatus>) -> EscalationReport {
        let mut report = EscalationReport::default();

        let Some(from) = from else {
            debug!(entity_id = %self.entity_id, "No known status, nothing to escalate");
            return report;
        };

        for transition in escalate_to_error(from) {
            match self.store.transition(self.entity_id, *transition).await {
                Ok(()) => report.applied.push(*transition),
                Err(e) => {
                    warn!(
                        entity_id = %self.entity_id,
                        transition = %transition,
                        error = %e,
                        "⚠️ Escalation halted, store refused transition"
                    );
                    report.failed = Some((*transition, e.to_string()));
                    break;
                }
            }
        }

        if !report.applied.is_empty() {
            info!(
                entity_id = %self.entity_id,
                from = %from,
                steps = report.applied.len(),
                "🚨 Escalated to error"
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityRecord;
    use crate::test_helpers::InMemoryEntityStore;

    #[test]
    fn test_forward_intents() {
        use EntityStatus as S;
        use StepIntent as I;

        let cases = [
            (S::Deactivate, I::BeginDeactivation, "deactivate_to_deactivating"),
            (S::Reprovision, I::BeginReprovision, "reprovision_to_inprogress"),
            (S::Deactivating, I::CompleteDeactivation, "deactivating_to_complete"),
            (S::InProgress, I::ConvergeActiveWithErrors, "inprogress_to_activewitherrors"),
            (S::InProgress, I::ConvergeActive, "inprogress_to_active"),
            (S::Active, I::RetireChild, "active_to_complete"),
            (S::Error, I::RetireChild, "error_to_complete"),
            (S::InProgress, I::Fail, "inprogress_to_error"),
            (S::Deactivating, I::Fail, "deactivating_to_error"),
        ];

        for (status, intent, expected) in cases {
            assert_eq!(next_transition(status, intent).map(|t| t.id()), Some(expected));
        }
    }

    #[test]
    fn test_intent_without_edge() {
        assert_eq!(next_transition(EntityStatus::Complete, StepIntent::ConvergeActive), None);
        assert_eq!(next_transition(EntityStatus::Draft, StepIntent::Fail), None);
    }

    #[test]
    fn test_channel_graph_excludes_partial_error_edges() {
        let channel = transitions_for(EntityKind::Channel);
        assert!(!channel.contains(&Transition::InProgressToActiveWithErrors));
        assert!(!channel.contains(&Transition::ActiveWithErrorsToDeactivate));
        assert!(channel.contains(&Transition::ErrorToComplete));
        assert_eq!(transitions_for(EntityKind::Provision).len(), Transition::ALL.len());

        assert!(validate_transition(
            EntityKind::Channel,
            EntityStatus::InProgress,
            Transition::InProgressToActiveWithErrors
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_transition_updates_store() {
        let store = Arc::new(InMemoryEntityStore::new());
        let record = EntityRecord::new(EntityKind::Scanner, EntityStatus::Deactivate);
        let id = record.id;
        store.insert(record);

        let machine = EntityStateMachine::new(id, EntityKind::Scanner, store.clone());
        let status = machine.transition(StepIntent::BeginDeactivation).await.unwrap();

        assert_eq!(status, EntityStatus::Deactivating);
        assert_eq!(store.status_of(id), Some(EntityStatus::Deactivating));
        assert_eq!(store.transitions_of(id), vec![Transition::DeactivateToDeactivating]);
    }

    #[tokio::test]
    async fn test_apply_rejects_edge_from_wrong_status() {
        let store = Arc::new(InMemoryEntityStore::new());
        let record = EntityRecord::new(EntityKind::Provision, EntityStatus::Active);
        let id = record.id;
        store.insert(record);

        let machine = EntityStateMachine::new(id, EntityKind::Provision, store.clone());
        let err = machine.apply(Transition::InProgressToActive).await.unwrap_err();

        assert!(matches!(err, StateMachineError::InvalidTransition { .. }));
        assert!(store.transitions_of(id).is_empty());
    }

    #[tokio::test]
    async fn test_escalate_walks_full_path() {
        let store = Arc::new(InMemoryEntityStore::new());
        let record = EntityRecord::new(EntityKind::Scanner, EntityStatus::Complete);
        let id = record.id;
        store.insert(record);

        let machine = EntityStateMachine::new(id, EntityKind::Scanner, store.clone());
        let report = machine.escalate(Some(EntityStatus::Complete)).await;

        assert!(report.is_complete());
        assert_eq!(report.applied.len(), 3);
        assert_eq!(store.status_of(id), Some(EntityStatus::Error));
    }

    #[tokio::test]
    async fn test_escalate_stops_at_refused_edge() {
        let store = Arc::new(InMemoryEntityStore::new());
        // The step believes the record is `active` but it already moved on.
        let record = EntityRecord::new(EntityKind::Scanner, EntityStatus::Reprovision);
        let id = record.id;
        store.insert(record);

        let machine = EntityStateMachine::new(id, EntityKind::Scanner, store.clone());
        let report = machine.escalate(Some(EntityStatus::Active)).await;

        assert!(report.applied.is_empty());
        assert_eq!(
            report.failed.as_ref().map(|(t, _)| *t),
            Some(Transition::ActiveToReprovision)
        );
        assert_eq!(store.status_of(id), Some(EntityStatus::Reprovision));
    }
}
