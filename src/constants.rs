//! # System Constants
//!
//! Parameter names the workflow host resolves for each step, the step names
//! used in incident logs, and the incident codes this crate emits.

/// Names of the parameters the host resolves per step invocation
pub mod parameters {
    // Scanner-scoped steps
    pub const SCAN_INSTANCE_ID: &str = "InstanceId (TAG Scan)";
    pub const SCAN_NAME: &str = "Scan Name (TAG Scan)";
    pub const SCAN_ASSET_ID: &str = "Asset ID (TAG Scan)";
    pub const SCAN_SOURCE_ELEMENT: &str = "Source Element (TAG Scan)";
    pub const SCAN_SOURCE_ID: &str = "Source ID (TAG Scan)";
    pub const SCAN_TAG_DEVICE: &str = "TAG Device (TAG Scan)";
    pub const SCAN_TAG_ELEMENT: &str = "TAG Element (TAG Scan)";
    pub const SCAN_TAG_INTERFACE: &str = "TAG Interface (TAG Scan)";
    pub const SCAN_TYPE: &str = "Scan Type (TAG Scan)";
    pub const SCAN_ACTION: &str = "Action (TAG Scan)";
    pub const SCAN_CHANNELS: &str = "Channels (TAG Scan)";

    // Provision-scoped steps
    pub const PROVISION_INSTANCE_ID: &str = "InstanceId (TAG Provision)";
    pub const PROVISION_NAME: &str = "Provision Name (TAG Provision)";
    pub const PROVISION_ACTION: &str = "Action (TAG Provision)";
    pub const PROVISION_SCANNERS: &str = "TAG Scanners (TAG Provision)";
    pub const PROVISION_SOURCE_ELEMENT: &str = "Source Element (TAG Provision)";
    pub const PROVISION_SOURCE_ID: &str = "Source ID (TAG Provision)";

    // Channel-scoped steps
    pub const CHANNEL_INSTANCE_ID: &str = "InstanceId (TAG Channel)";
    pub const CHANNEL_NAME: &str = "Channel Name (TAG Channel)";
    pub const CHANNEL_MATCH: &str = "Channel Match (TAG Channel)";
    pub const CHANNEL_TAG_ELEMENT: &str = "TAG Element (TAG Channel)";
}

/// Step names as they appear in incident logs
pub mod steps {
    pub const DEACTIVATE_SCANNER: &str = "PA_TAG_Deactivate Scanner";
    pub const MONITOR_SCANNER_PROGRESS: &str = "PA_TAG_Monitor Scanner Progress";
    pub const MONITOR_CHANNELS_PROGRESS: &str = "PA_TAG_Monitor Channels Progress";
    pub const MONITOR_SCANNERS: &str = "PA_TAG_Monitor Scanners";
    pub const CLEAR_LAYOUT: &str = "PA_TAG_Clear Layout";
}

/// Structured incident codes
pub mod codes {
    pub const RETRY_TIMEOUT: &str = "RetryTimeout";
    pub const SCAN_INSTANCE_NOT_FOUND: &str = "ScanInstanceNotFound";
    pub const INVALID_STATUS_FOR_TRANSITION: &str = "InvalidStatusForTransition";
    pub const NO_CHANNEL_INSTANCES: &str = "NoChannelInstances";
    pub const NOT_ENOUGH_SPACE_IN_LAYOUT: &str = "NotEnoughSpaceInLayout";
    pub const NOT_ENOUGH_SEQUENTIAL_SPACE_IN_LAYOUT: &str = "NotEnoughSequentialSpaceInLayout";
    pub const ALL_SCANS_FAILED_PROVISIONING: &str = "AllScansFailedProvisioning";
    pub const PARTIAL_SCAN_PROVISION_ERROR: &str = "PartialScanProvisionError";
    pub const SCAN_DEACTIVATION_FAILURE: &str = "ScanDeactivationFailure";
    pub const ALL_CHANNELS_FAILED_PROVISIONING: &str = "AllChannelsFailedProvisioning";
    pub const PARTIAL_CHANNEL_PROVISION_ERROR: &str = "PartialChannelProvisionError";
    pub const CHILD_TRANSITION_FAILED: &str = "ChildTransitionFailed";
    pub const UNHANDLED_FAULT: &str = "UnhandledFault";
}

/// Reservation marker written into a layout slot once it is assigned
pub const RESERVED_MARKER: &str = "Reserved";

/// Occupancy value of a free layout slot
pub const FREE_SLOT_MARKER: &str = "0";

/// Placeholder passed through verbatim in generated scan names
pub const SCAN_NAME_PLACEHOLDER: &str = "#RES|BAND#";
