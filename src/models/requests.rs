//! # Step Requests
//!
//! Typed views over the parameter bag the host resolves for each step.
//! Required parameters fail the build; optional ones fall back to empty.

use crate::constants::parameters as p;
use crate::orchestration::types::{ParameterError, StepParameters};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Parameters shared by every scanner-scoped step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerRequest {
    pub instance_id: Uuid,
    pub scan_name: String,
    pub asset_id: String,
    pub source_element: String,
    pub source_id: String,
    pub tag_device: String,
    pub tag_element: String,
    pub tag_interface: String,
    pub scan_type: String,
    pub action: String,
    pub channels: Vec<Uuid>,
}

impl ScannerRequest {
    pub fn from_parameters(params: &StepParameters) -> Result<Self, ParameterError> {
        Ok(Self {
            instance_id: params.guid(p::SCAN_INSTANCE_ID)?,
            scan_name: params.text(p::SCAN_NAME)?,
            asset_id: params.text(p::SCAN_ASSET_ID)?,
            source_element: params.try_text(p::SCAN_SOURCE_ELEMENT)?.unwrap_or_default(),
            source_id: params.try_text(p::SCAN_SOURCE_ID)?.unwrap_or_default(),
            tag_device: params.text(p::SCAN_TAG_DEVICE)?,
            tag_element: params.text(p::SCAN_TAG_ELEMENT)?,
            tag_interface: params.text(p::SCAN_TAG_INTERFACE)?,
            scan_type: params.text(p::SCAN_TYPE)?,
            action: params.text(p::SCAN_ACTION)?,
            channels: params.guids_or_empty(p::SCAN_CHANNELS)?,
        })
    }

    /// First word of the scan name; device titles are matched against it
    pub fn title_prefix(&self) -> &str {
        self.scan_name.split(' ').next().unwrap_or_default()
    }
}

/// What a provision process was asked to do
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionAction {
    Provision,
    Reprovision,
    CompleteProvision,
    Deactivate,
    Other(String),
}

impl ProvisionAction {
    pub fn parse(action: &str) -> Self {
        match action.trim() {
            "provision" => Self::Provision,
            "reprovision" => Self::Reprovision,
            "complete-provision" => Self::CompleteProvision,
            "deactivate" => Self::Deactivate,
            other => Self::Other(other.to_string()),
        }
    }

    /// Actions whose scanners are expected to come up active
    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Self::Provision | Self::Reprovision | Self::CompleteProvision
        )
    }

    pub fn is_deactivation(&self) -> bool {
        matches!(self, Self::Deactivate)
    }
}

impl fmt::Display for ProvisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provision => f.write_str("provision"),
            Self::Reprovision => f.write_str("reprovision"),
            Self::CompleteProvision => f.write_str("complete-provision"),
            Self::Deactivate => f.write_str("deactivate"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Parameters of the provision-scoped monitor step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub instance_id: Uuid,
    pub name: String,
    pub action: ProvisionAction,
    pub scanners: Vec<Uuid>,
    /// Forwarding address, `agent/element/parameter`, when a caller wants updates
    pub source_element: Option<String>,
    pub source_id: Option<String>,
}

impl ProvisionRequest {
    pub fn from_parameters(params: &StepParameters) -> Result<Self, ParameterError> {
        Ok(Self {
            instance_id: params.guid(p::PROVISION_INSTANCE_ID)?,
            name: params.text(p::PROVISION_NAME)?,
            action: ProvisionAction::parse(&params.text(p::PROVISION_ACTION)?),
            scanners: params.guids(p::PROVISION_SCANNERS)?,
            source_element: params.try_text(p::PROVISION_SOURCE_ELEMENT)?,
            source_id: params.try_text(p::PROVISION_SOURCE_ID)?,
        })
    }

    /// Forwarding address text, when present and non-blank
    pub fn forwarding_target(&self) -> Option<&str> {
        self.source_element
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Parameters of the channel-scoped layout clear step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub instance_id: Uuid,
    pub name: String,
    /// Occupant value written into layout slots held by this channel
    pub channel_match: String,
    pub tag_element: String,
}

impl ChannelRequest {
    pub fn from_parameters(params: &StepParameters) -> Result<Self, ParameterError> {
        Ok(Self {
            instance_id: params.guid(p::CHANNEL_INSTANCE_ID)?,
            name: params.text(p::CHANNEL_NAME)?,
            channel_match: params.text(p::CHANNEL_MATCH)?,
            tag_element: params.text(p::CHANNEL_TAG_ELEMENT)?,
        })
    }
}
