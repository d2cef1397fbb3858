// State machine module for provisioning records
//
// Closed status and transition vocabularies per record kind, the canonical
// escalation paths, and the step guards that order the workflow.

pub mod entity_state_machine;
pub mod errors;
pub mod escalation;
pub mod events;
pub mod guards;
pub mod states;

// Re-export main types for convenient access
pub use entity_state_machine::{
    next_transition, transitions_for, validate_transition, EntityStateMachine, EscalationReport,
};
pub use errors::{StateMachineError, StateMachineResult};
pub use escalation::{escalate_from, escalate_to_error};
pub use events::{StepIntent, Transition};
pub use guards::{GuardDecision, GuardRule, MismatchPolicy, StepGuard};
pub use states::{EntityKind, EntityStatus};
