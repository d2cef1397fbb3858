use super::states::EntityStatus;
use serde::Serialize;

/// How a step reacts to a record whose status it wasn't designed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MismatchPolicy {
    /// Report success and say nothing
    Quiet,
    /// Report success after a warning incident
    Warn,
}

/// Which statuses let a step do its work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRule {
    /// Proceed only in one of these statuses
    Only(&'static [EntityStatus]),
    /// Proceed in any status except these
    Except(&'static [EntityStatus]),
}

/// Outcome of checking a record's status against a step guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GuardDecision {
    Proceed,
    Ignore,
    IgnoreWithWarning,
}

/// Status guard for one workflow step.
///
/// Cross-step ordering relies entirely on these: a step only works once the
/// previous step has committed the status it expects.
#[derive(Debug, Clone, Copy)]
pub struct StepGuard {
    description: &'static str,
    rule: GuardRule,
    on_mismatch: MismatchPolicy,
}

impl StepGuard {
    pub const fn new(
        description: &'static str,
        rule: GuardRule,
        on_mismatch: MismatchPolicy,
    ) -> Self {
        Self {
            description,
            rule,
            on_mismatch,
        }
    }

    /// Check a record's status against this guard
    pub fn check(&self, status: EntityStatus) -> GuardDecision {
        let handled = match self.rule {
            GuardRule::Only(statuses) => statuses.contains(&status),
            GuardRule::Except(statuses) => !statuses.contains(&status),
        };

        match (handled, self.on_mismatch) {
            (true, _) => GuardDecision::Proceed,
            (false, MismatchPolicy::Quiet) => GuardDecision::Ignore,
            (false, MismatchPolicy::Warn) => GuardDecision::IgnoreWithWarning,
        }
    }

    /// Get a description of this guard for logging
    pub fn description(&self) -> &'static str {
        self.description
    }
}

pub const DEACTIVATE_SCANNER_GUARD: StepGuard = StepGuard::new(
    "Scanner must be requested for deactivation or reprovisioning",
    GuardRule::Only(&[EntityStatus::Deactivate, EntityStatus::Reprovision]),
    MismatchPolicy::Quiet,
);

pub const SCANNER_PROGRESS_GUARD: StepGuard = StepGuard::new(
    "Scanner must be in progress",
    GuardRule::Only(&[EntityStatus::InProgress]),
    MismatchPolicy::Quiet,
);

pub const CHANNELS_PROGRESS_GUARD: StepGuard = StepGuard::new(
    "Scanner must be in progress while its channels converge",
    GuardRule::Only(&[EntityStatus::InProgress]),
    MismatchPolicy::Quiet,
);

pub const PROVISION_MONITOR_GUARD: StepGuard = StepGuard::new(
    "Provision must be in progress while its scanners converge",
    GuardRule::Only(&[EntityStatus::InProgress]),
    MismatchPolicy::Quiet,
);

pub const PROVISION_TEARDOWN_GUARD: StepGuard = StepGuard::new(
    "Provision must be deactivating while its scanners are torn down",
    GuardRule::Only(&[EntityStatus::Deactivating]),
    MismatchPolicy::Quiet,
);

pub const CLEAR_LAYOUT_GUARD: StepGuard = StepGuard::new(
    "Channel layout is only cleared once the channel has left ready",
    GuardRule::Except(&[EntityStatus::Ready]),
    MismatchPolicy::Quiet,
);

/// Statuses from which a cleared layout leads to a follow-up transition
pub const CLEAR_LAYOUT_FOLLOW_UP_GUARD: StepGuard = StepGuard::new(
    "Channel must be deactivating or reprovisioning after its layout is cleared",
    GuardRule::Only(&[EntityStatus::Deactivate, EntityStatus::Reprovision]),
    MismatchPolicy::Warn,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_descriptions() {
        assert_eq!(SCANNER_PROGRESS_GUARD.description(), "Scanner must be in progress");
        assert_eq!(
            DEACTIVATE_SCANNER_GUARD.description(),
            "Scanner must be requested for deactivation or reprovisioning"
        );
    }

    #[test]
    fn test_only_rule() {
        assert_eq!(
            DEACTIVATE_SCANNER_GUARD.check(EntityStatus::Deactivate),
            GuardDecision::Proceed
        );
        assert_eq!(
            DEACTIVATE_SCANNER_GUARD.check(EntityStatus::Active),
            GuardDecision::Ignore
        );
    }

    #[test]
    fn test_except_rule() {
        assert_eq!(CLEAR_LAYOUT_GUARD.check(EntityStatus::Ready), GuardDecision::Ignore);
        assert_eq!(CLEAR_LAYOUT_GUARD.check(EntityStatus::Active), GuardDecision::Proceed);
    }

    #[test]
    fn test_warn_policy() {
        assert_eq!(
            CLEAR_LAYOUT_FOLLOW_UP_GUARD.check(EntityStatus::Active),
            GuardDecision::IgnoreWithWarning
        );
        assert_eq!(
            CLEAR_LAYOUT_FOLLOW_UP_GUARD.check(EntityStatus::Reprovision),
            GuardDecision::Proceed
        );
    }
}
