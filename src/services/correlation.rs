use super::device::{DeviceError, DeviceResult};
use crate::state_machine::EntityStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address of the upstream parameter that receives status updates, `agent/element/parameter`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardingAddress {
    pub agent_id: u32,
    pub element_id: u32,
    pub parameter_id: u32,
}

impl FromStr for ForwardingAddress {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DeviceError::InvalidAddress(s.to_string());
        let mut parts = s.trim().split('/');
        let mut next = || -> DeviceResult<u32> {
            parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(invalid)
        };

        let address = Self {
            agent_id: next()?,
            element_id: next()?,
            parameter_id: next()?,
        };

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(address)
    }
}

impl fmt::Display for ForwardingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.agent_id, self.element_id, self.parameter_id)
    }
}

/// Status token reported upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagStatus {
    Complete,
    Active,
}

impl TagStatus {
    /// `Complete` iff the record ended up `complete`, `Active` otherwise
    pub fn for_status(status: EntityStatus) -> Self {
        if status == EntityStatus::Complete {
            Self::Complete
        } else {
            Self::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    #[serde(rename = "Status")]
    pub status: TagStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    #[serde(rename = "EventName")]
    pub event_name: String,
    #[serde(rename = "Tag")]
    pub tag: TagResponse,
}

/// Payload pushed to the correlation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingRequest {
    #[serde(rename = "Type")]
    pub request_type: String,
    #[serde(rename = "ProcessResponse")]
    pub process_response: ProcessResponse,
}

impl ForwardingRequest {
    pub fn new(event_name: impl Into<String>, status: TagStatus) -> Self {
        Self {
            request_type: "Process Automation".to_string(),
            process_response: ProcessResponse {
                event_name: event_name.into(),
                tag: TagResponse { status },
            },
        }
    }
}

/// Best-effort status push to whoever requested the provisioning
#[async_trait]
pub trait CorrelationForwarder: Send + Sync {
    async fn notify(&self, address: &ForwardingAddress, request: &ForwardingRequest)
        -> DeviceResult<()>;
}
