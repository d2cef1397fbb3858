//! Scan request payloads pushed to the managed device.

use crate::constants::SCAN_NAME_PLACEHOLDER;
use crate::models::{Manifest, ScannerRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Action code understood by the device; scans are only ever removed from here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanAction {
    Delete = 2,
}

impl ScanAction {
    pub fn code(&self) -> i64 {
        *self as i64
    }
}

/// One entry of a device `scanRequest` list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(rename = "assetId", skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ScanRequest {
    /// Request for one manifest of a scanner
    pub fn for_manifest(action: ScanAction, scanner: &ScannerRequest, manifest: &Manifest) -> Self {
        Self {
            asset_id: Some(scanner.asset_id.clone()),
            action: Some(action.code()),
            interface: Some(scanner.tag_interface.clone()),
            name: Some(scan_name(&scanner.scan_name, &manifest.name)),
            scan_type: Some(scanner.scan_type.clone()),
            url: Some(manifest.url.clone()),
        }
    }
}

/// Device-side name of a scan; the resolution placeholder is left as is
pub fn scan_name(scan_name: &str, manifest_name: &str) -> String {
    format!("{scan_name} {manifest_name} {SCAN_NAME_PLACEHOLDER}")
}

/// Body of a request addressed to one TAG device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagRequest {
    #[serde(rename = "scanRequest", skip_serializing_if = "Option::is_none")]
    pub scan_requests: Option<Vec<ScanRequest>>,
}

impl TagRequest {
    pub fn scans(scan_requests: Vec<ScanRequest>) -> Self {
        Self {
            scan_requests: Some(scan_requests),
        }
    }
}

/// Serialize `{ "<tag device>": <request> }`, the shape the device parameter expects
pub fn device_payload(tag_device: &str, request: TagRequest) -> Result<String, serde_json::Error> {
    let mut payload = BTreeMap::new();
    payload.insert(tag_device.to_string(), request);
    serde_json::to_string(&payload)
}

/// One `Delete` request per manifest of the scanner
pub fn deactivation_requests(scanner: &ScannerRequest, manifests: &[Manifest]) -> Vec<ScanRequest> {
    manifests
        .iter()
        .map(|manifest| ScanRequest::for_manifest(ScanAction::Delete, scanner, manifest))
        .collect()
}
