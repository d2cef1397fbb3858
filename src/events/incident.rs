//! # Incident Logs
//!
//! Structured entries handed to the notification sink whenever a step hits
//! something an operator should see: timeouts, missing records, layouts
//! without room, children that failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Information,
    Minor,
    Warning,
    Major,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Information => "Information",
            Self::Minor => "Minor",
            Self::Warning => "Warning",
            Self::Major => "Major",
            Self::Critical => "Critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigurationType {
    Automation,
}

/// Classification of an incident
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode {
    pub configuration_item: String,
    pub configuration_type: ConfigurationType,
    pub severity: Severity,
    /// Machine-readable code, e.g. `RetryTimeout`; absent for unclassified faults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Where in the step the incident was raised
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ErrorCode {
    pub fn automation(
        configuration_item: impl Into<String>,
        severity: Severity,
        source: impl Into<String>,
    ) -> Self {
        Self {
            configuration_item: configuration_item.into(),
            configuration_type: ConfigurationType::Automation,
            severity,
            code: None,
            source: source.into(),
            description: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One incident log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentLog {
    pub affected_item: String,
    pub affected_service: String,
    pub timestamp: DateTime<Utc>,
    pub error_code: ErrorCode,
    pub notes: String,
}

impl IncidentLog {
    pub fn new(
        affected_item: impl Into<String>,
        affected_service: impl Into<String>,
        error_code: ErrorCode,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            affected_item: affected_item.into(),
            affected_service: affected_service.into(),
            timestamp: Utc::now(),
            error_code,
            notes: notes.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.error_code.severity
    }

    pub fn code(&self) -> Option<&str> {
        self.error_code.code.as_deref()
    }
}
