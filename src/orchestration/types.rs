//! # Orchestration Types
//!
//! Inputs and outputs of a workflow step: the parameter bag the host resolves
//! for each invocation, and the outcome the step reports back exactly once.

use crate::state_machine::{EntityStatus, Transition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Workflow steps this crate implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    DeactivateScanner,
    MonitorScannerProgress,
    MonitorChannelsProgress,
    MonitorScanners,
    ClearLayout,
}

impl StepKind {
    /// Name used in incident logs
    pub fn script_name(&self) -> &'static str {
        use crate::constants::steps;
        match self {
            Self::DeactivateScanner => steps::DEACTIVATE_SCANNER,
            Self::MonitorScannerProgress => steps::MONITOR_SCANNER_PROGRESS,
            Self::MonitorChannelsProgress => steps::MONITOR_CHANNELS_PROGRESS,
            Self::MonitorScanners => steps::MONITOR_SCANNERS,
            Self::ClearLayout => steps::CLEAR_LAYOUT,
        }
    }

    /// Configuration item named in incident logs
    pub fn configuration_item(&self) -> String {
        format!("{} Script", self.script_name())
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_name())
    }
}

/// Typed value of one host parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Integer(i64),
    Guid(Uuid),
    GuidList(Vec<Uuid>),
    Text(String),
}

impl ParameterValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Guid(_) => "guid",
            Self::GuidList(_) => "guid list",
            Self::Text(_) => "text",
        }
    }
}

/// Errors resolving step parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("Missing parameter '{0}'")]
    Missing(String),

    #[error("Parameter '{name}' is {actual}, expected {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Parameter '{name}' has invalid value '{value}'")]
    InvalidValue { name: String, value: String },
}

/// Bag of named parameters resolved by the host for one step invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParameters {
    values: HashMap<String, ParameterValue>,
}

impl StepParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, ParameterValue::Text(value.into()))
    }

    pub fn with_guid(self, name: impl Into<String>, value: Uuid) -> Self {
        self.with(name, ParameterValue::Guid(value))
    }

    pub fn with_guids(self, name: impl Into<String>, values: Vec<Uuid>) -> Self {
        self.with(name, ParameterValue::GuidList(values))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<&ParameterValue, ParameterError> {
        self.values
            .get(name)
            .ok_or_else(|| ParameterError::Missing(name.to_string()))
    }

    /// Required text parameter; integers and GUIDs are rendered as text
    pub fn text(&self, name: &str) -> Result<String, ParameterError> {
        match self.get(name)? {
            ParameterValue::Text(value) => Ok(value.clone()),
            ParameterValue::Integer(value) => Ok(value.to_string()),
            ParameterValue::Guid(value) => Ok(value.to_string()),
            other => Err(ParameterError::WrongType {
                name: name.to_string(),
                expected: "text",
                actual: other.type_name(),
            }),
        }
    }

    /// Optional text parameter; absent parameters yield `None`
    pub fn try_text(&self, name: &str) -> Result<Option<String>, ParameterError> {
        if self.contains(name) {
            self.text(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Required GUID parameter; text values are parsed
    pub fn guid(&self, name: &str) -> Result<Uuid, ParameterError> {
        match self.get(name)? {
            ParameterValue::Guid(value) => Ok(*value),
            ParameterValue::Text(value) => {
                Uuid::parse_str(value.trim()).map_err(|_| ParameterError::InvalidValue {
                    name: name.to_string(),
                    value: value.clone(),
                })
            }
            other => Err(ParameterError::WrongType {
                name: name.to_string(),
                expected: "guid",
                actual: other.type_name(),
            }),
        }
    }

    /// Required GUID list parameter
    pub fn guids(&self, name: &str) -> Result<Vec<Uuid>, ParameterError> {
        match self.get(name)? {
            ParameterValue::GuidList(values) => Ok(values.clone()),
            ParameterValue::Guid(value) => Ok(vec![*value]),
            other => Err(ParameterError::WrongType {
                name: name.to_string(),
                expected: "guid list",
                actual: other.type_name(),
            }),
        }
    }

    /// Optional GUID list parameter; absent parameters yield an empty list
    pub fn guids_or_empty(&self, name: &str) -> Result<Vec<Uuid>, ParameterError> {
        if self.contains(name) {
            self.guids(name)
        } else {
            Ok(Vec::new())
        }
    }
}

/// Completion signal a step hands back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Continue the workflow with the next step
    Success,
    /// Stop chaining; the process is done with this record
    Finished,
}

/// Why a step ended the way it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDisposition {
    /// The step did its work and moved the record forward
    Completed,
    /// The record's status was not one this step handles
    GuardMismatch { status: EntityStatus, warned: bool },
    /// External state did not converge before the timeout
    ConvergenceTimeout { timeout_seconds: u64 },
    /// The record could not be found
    EntityMissing,
    /// The record is in a status the step cannot finalize from
    UnexpectedStatus { status: EntityStatus },
    /// Every child failed
    TotalChildFailure { failed: Vec<String> },
    /// A store, device or parameter call failed
    UnhandledFault { message: String },
}

/// Everything a step did during one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: StepKind,
    pub entity_id: Option<Uuid>,
    pub outcome: StepOutcome,
    pub disposition: StepDisposition,
    /// Forward transitions requested, in order
    pub transitions: Vec<Transition>,
    /// Escalation transitions applied, in order
    pub escalation: Vec<Transition>,
}

impl StepReport {
    pub fn new(step: StepKind, entity_id: Option<Uuid>) -> Self {
        Self {
            step,
            entity_id,
            outcome: StepOutcome::Finished,
            disposition: StepDisposition::Completed,
            transitions: Vec::new(),
            escalation: Vec::new(),
        }
    }

    pub fn escalated(&self) -> bool {
        !self.escalation.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}
