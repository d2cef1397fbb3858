// Test Helpers Module - In-memory collaborators
//
// Fakes of every host service, so steps can be driven end to end without a
// workflow host or a device. Each fake records what was asked of it and can
// be told to fail.

use crate::config::ProvisioningConfig;
use crate::constants::parameters as p;
use crate::events::{IncidentLog, NotificationSink};
use crate::models::{EntityRecord, FieldRef, ScannerRequest};
use crate::orchestration::{HostServices, ProvisioningOrchestrator, StepParameters};
use crate::services::{
    ColumnFilter, CommandDispatch, CorrelationForwarder, DeviceError, DeviceResult,
    DeviceTableSource, EntityStore, ForwardingAddress, ForwardingRequest, ProcessLauncher,
    StoreError, StoreResult, TableRow,
};
use crate::state_machine::{EntityStatus, Transition};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
struct StoreState {
    records: HashMap<Uuid, EntityRecord>,
    transitions: HashMap<Uuid, Vec<Transition>>,
    field_writes: Vec<(Uuid, FieldRef, String)>,
    /// Statuses a record moves through on successive reads, simulating other processes
    scripted: HashMap<Uuid, VecDeque<EntityStatus>>,
    failing_reads: HashSet<Uuid>,
    failing_transitions: HashSet<(Uuid, Transition)>,
}

impl StoreState {
    fn advance_script(&mut self, id: Uuid) {
        let next = self.scripted.get_mut(&id).and_then(VecDeque::pop_front);
        if let (Some(status), Some(record)) = (next, self.records.get_mut(&id)) {
            record.status = status;
        }
    }

    fn check_read(&self, id: Uuid) -> StoreResult<()> {
        if self.failing_reads.contains(&id) {
            return Err(StoreError::Backend(format!("read of {id} failed")));
        }
        Ok(())
    }
}

/// Entity store backed by a map; transitions must leave the record's current status
#[derive(Default)]
pub struct InMemoryEntityStore {
    state: Mutex<StoreState>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: EntityRecord) {
        self.state.lock().records.insert(record.id, record);
    }

    pub fn record(&self, id: Uuid) -> Option<EntityRecord> {
        self.state.lock().records.get(&id).cloned()
    }

    pub fn status_of(&self, id: Uuid) -> Option<EntityStatus> {
        self.state.lock().records.get(&id).map(|r| r.status)
    }

    pub fn transitions_of(&self, id: Uuid) -> Vec<Transition> {
        self.state
            .lock()
            .transitions
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn field_writes(&self) -> Vec<(Uuid, FieldRef, String)> {
        self.state.lock().field_writes.clone()
    }

    /// Each read of `id` first moves it to the next scripted status
    pub fn script_statuses(&self, id: Uuid, statuses: impl IntoIterator<Item = EntityStatus>) {
        self.state
            .lock()
            .scripted
            .insert(id, statuses.into_iter().collect());
    }

    pub fn fail_reads_of(&self, id: Uuid) {
        self.state.lock().failing_reads.insert(id);
    }

    pub fn fail_transition(&self, id: Uuid, transition: Transition) {
        self.state.lock().failing_transitions.insert((id, transition));
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn read_status(&self, id: Uuid) -> StoreResult<EntityStatus> {
        let mut state = self.state.lock();
        state.check_read(id)?;
        state.advance_script(id);
        state
            .records
            .get(&id)
            .map(|r| r.status)
            .ok_or(StoreError::NotFound(id))
    }

    async fn read_entity(&self, id: Uuid) -> StoreResult<Option<EntityRecord>> {
        let mut state = self.state.lock();
        state.check_read(id)?;
        state.advance_script(id);
        Ok(state.records.get(&id).cloned())
    }

    async fn transition(&self, id: Uuid, transition: Transition) -> StoreResult<()> {
        let mut state = self.state.lock();
        let rejected = |reason: String| StoreError::Rejected {
            id,
            transition: transition.to_string(),
            reason,
        };

        if state.failing_transitions.contains(&(id, transition)) {
            return Err(rejected("injected failure".to_string()));
        }

        let record = state.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status != transition.from_status() {
            return Err(rejected(format!("record is {}", record.status)));
        }
        record.status = transition.to_status();

        state.transitions.entry(id).or_default().push(transition);
        Ok(())
    }

    async fn write_field(&self, id: Uuid, field: &FieldRef, value: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        let record = state.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        match field {
            FieldRef::LayoutPosition { section } => {
                let section = record
                    .layouts
                    .get_mut(*section)
                    .ok_or_else(|| StoreError::Backend(format!("{id} has no field {field}")))?;
                section.position = Some(value.to_string());
            }
        }

        state.field_writes.push((id, *field, value.to_string()));
        Ok(())
    }
}

/// One write issued to the fake device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceWrite {
    Parameter {
        element: String,
        parameter_id: u32,
        payload: String,
    },
    Cell {
        element: String,
        column: u32,
        row_key: String,
        value: String,
    },
}

#[derive(Default)]
struct DeviceState {
    /// Successive snapshots per table; the last one sticks
    tables: HashMap<(String, u32), VecDeque<Vec<TableRow>>>,
    writes: Vec<DeviceWrite>,
    failing_queries: HashSet<u32>,
    failing_cells: HashSet<String>,
    failing_parameters: HashSet<u32>,
}

/// Device fake serving tables and recording writes
#[derive(Default)]
pub struct FakeDevice {
    state: Mutex<DeviceState>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table(&self, element: &str, table_id: u32, rows: Vec<TableRow>) {
        self.script_table(element, table_id, vec![rows]);
    }

    /// Successive queries see successive snapshots, then keep seeing the last one
    pub fn script_table(&self, element: &str, table_id: u32, snapshots: Vec<Vec<TableRow>>) {
        self.state
            .lock()
            .tables
            .insert((element.to_string(), table_id), snapshots.into());
    }

    pub fn writes(&self) -> Vec<DeviceWrite> {
        self.state.lock().writes.clone()
    }

    /// Cell writes as `(column, row_key, value)`
    pub fn cell_writes(&self) -> Vec<(u32, String, String)> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                DeviceWrite::Cell {
                    column,
                    row_key,
                    value,
                    ..
                } => Some((column, row_key, value)),
                DeviceWrite::Parameter { .. } => None,
            })
            .collect()
    }

    /// Parameter writes as `(parameter_id, payload)`
    pub fn parameter_writes(&self) -> Vec<(u32, String)> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                DeviceWrite::Parameter {
                    parameter_id,
                    payload,
                    ..
                } => Some((parameter_id, payload)),
                DeviceWrite::Cell { .. } => None,
            })
            .collect()
    }

    pub fn fail_queries_of(&self, table_id: u32) {
        self.state.lock().failing_queries.insert(table_id);
    }

    pub fn fail_cell_writes_for(&self, row_key: &str) {
        self.state.lock().failing_cells.insert(row_key.to_string());
    }

    pub fn fail_parameter(&self, parameter_id: u32) {
        self.state.lock().failing_parameters.insert(parameter_id);
    }
}

#[async_trait]
impl DeviceTableSource for FakeDevice {
    async fn query_table(
        &self,
        element: &str,
        table_id: u32,
        filters: &[ColumnFilter],
    ) -> DeviceResult<Vec<TableRow>> {
        let mut state = self.state.lock();
        if state.failing_queries.contains(&table_id) {
            return Err(DeviceError::Other(format!("query of table {table_id} failed")));
        }

        let snapshots = state
            .tables
            .get_mut(&(element.to_string(), table_id))
            .ok_or_else(|| DeviceError::TableUnavailable {
                element: element.to_string(),
                table_id,
            })?;

        let rows = if snapshots.len() > 1 {
            snapshots.pop_front().unwrap_or_default()
        } else {
            snapshots.front().cloned().unwrap_or_default()
        };

        Ok(rows
            .into_iter()
            .filter(|row| filters.iter().all(|f| f.matches(row)))
            .collect())
    }
}

#[async_trait]
impl CommandDispatch for FakeDevice {
    async fn set_parameter(&self, element: &str, parameter_id: u32, payload: &str) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if state.failing_parameters.contains(&parameter_id) {
            return Err(DeviceError::WriteFailed {
                element: element.to_string(),
                parameter_id,
                reason: "injected failure".to_string(),
            });
        }

        state.writes.push(DeviceWrite::Parameter {
            element: element.to_string(),
            parameter_id,
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn set_cell(&self, element: &str, column: u32, row_key: &str, value: &str) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if state.failing_cells.contains(row_key) {
            return Err(DeviceError::WriteFailed {
                element: element.to_string(),
                parameter_id: column,
                reason: format!("row {row_key} is locked"),
            });
        }

        for ((table_element, _), snapshots) in state.tables.iter_mut() {
            if table_element != element {
                continue;
            }
            for row in snapshots.iter_mut().flatten().filter(|r| r.key == row_key) {
                row.cells.insert(column, value.to_string());
            }
        }

        state.writes.push(DeviceWrite::Cell {
            element: element.to_string(),
            column,
            row_key: row_key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

/// Forwarder that records every notification
#[derive(Default)]
pub struct RecordingForwarder {
    sent: Mutex<Vec<(ForwardingAddress, ForwardingRequest)>>,
    fail: Mutex<bool>,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(ForwardingAddress, ForwardingRequest)> {
        self.sent.lock().clone()
    }

    pub fn fail_all(&self) {
        *self.fail.lock() = true;
    }
}

#[async_trait]
impl CorrelationForwarder for RecordingForwarder {
    async fn notify(&self, address: &ForwardingAddress, request: &ForwardingRequest) -> DeviceResult<()> {
        if *self.fail.lock() {
            return Err(DeviceError::ElementNotFound(address.to_string()));
        }
        self.sent.lock().push((*address, request.clone()));
        Ok(())
    }
}

/// Launcher that records which scanners had their channel processes started
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<Uuid>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launched(&self) -> Vec<Uuid> {
        self.launched.lock().clone()
    }
}

#[async_trait]
impl ProcessLauncher for RecordingLauncher {
    async fn start_channel_processes(&self, scanner: &ScannerRequest) -> StoreResult<()> {
        self.launched.lock().push(scanner.instance_id);
        Ok(())
    }
}

/// Sink that keeps every incident for later assertions
#[derive(Default)]
pub struct RecordingNotificationSink {
    incidents: Mutex<Vec<IncidentLog>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incidents(&self) -> Vec<IncidentLog> {
        self.incidents.lock().clone()
    }

    /// Incident codes in logging order; unclassified incidents show as `None`
    pub fn codes(&self) -> Vec<Option<String>> {
        self.incidents
            .lock()
            .iter()
            .map(|i| i.error_code.code.clone())
            .collect()
    }

    pub fn find(&self, code: &str) -> Option<IncidentLog> {
        self.incidents
            .lock()
            .iter()
            .find(|i| i.code() == Some(code))
            .cloned()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn log(&self, entry: IncidentLog) {
        self.incidents.lock().push(entry);
    }
}

/// Every fake wired into one orchestrator
#[derive(Clone, Default)]
pub struct StepHarness {
    pub store: Arc<InMemoryEntityStore>,
    pub device: Arc<FakeDevice>,
    pub forwarder: Arc<RecordingForwarder>,
    pub launcher: Arc<RecordingLauncher>,
    pub incidents: Arc<RecordingNotificationSink>,
}

impl StepHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> HostServices {
        HostServices {
            store: self.store.clone(),
            tables: self.device.clone(),
            dispatch: self.device.clone(),
            forwarder: self.forwarder.clone(),
            launcher: self.launcher.clone(),
            notifications: self.incidents.clone(),
        }
    }

    /// Orchestrator with the default configuration
    pub fn orchestrator(&self) -> ProvisioningOrchestrator {
        self.orchestrator_with(ProvisioningConfig::default())
    }

    pub fn orchestrator_with(&self, config: ProvisioningConfig) -> ProvisioningOrchestrator {
        ProvisioningOrchestrator::new(self.services(), config)
    }
}

/// Element every test scanner and channel lives on
pub const TEST_TAG_ELEMENT: &str = "TAG Element 1";

/// Parameter bag of a scanner-scoped step
pub fn scanner_parameters(id: Uuid, scan_name: &str, channels: &[Uuid]) -> StepParameters {
    StepParameters::new()
        .with_text(p::SCAN_INSTANCE_ID, id.to_string())
        .with_text(p::SCAN_NAME, scan_name)
        .with_text(p::SCAN_ASSET_ID, "asset-7")
        .with_text(p::SCAN_TAG_DEVICE, "TAG MCS")
        .with_text(p::SCAN_TAG_ELEMENT, TEST_TAG_ELEMENT)
        .with_text(p::SCAN_TAG_INTERFACE, "eth0")
        .with_text(p::SCAN_TYPE, "HLS")
        .with_text(p::SCAN_ACTION, "provision")
        .with_guids(p::SCAN_CHANNELS, channels.to_vec())
}

/// Parameter bag of the provision-scoped monitor step
pub fn provision_parameters(id: Uuid, action: &str, scanners: &[Uuid]) -> StepParameters {
    StepParameters::new()
        .with_guid(p::PROVISION_INSTANCE_ID, id)
        .with_text(p::PROVISION_NAME, "Evening Provision")
        .with_text(p::PROVISION_ACTION, action)
        .with_guids(p::PROVISION_SCANNERS, scanners.to_vec())
}

/// Parameter bag of the channel-scoped layout clear step
pub fn channel_parameters(id: Uuid, channel_match: &str) -> StepParameters {
    StepParameters::new()
        .with_guid(p::CHANNEL_INSTANCE_ID, id)
        .with_text(p::CHANNEL_NAME, "BBC One")
        .with_text(p::CHANNEL_MATCH, channel_match)
        .with_text(p::CHANNEL_TAG_ELEMENT, TEST_TAG_ELEMENT)
}
