//! Shared fixtures for integration tests

#![allow(dead_code)]

pub mod strategies;

use tag_provisioning::config::ProvisioningConfig;
use tag_provisioning::models::{EntityRecord, LayoutSection, Manifest};
use tag_provisioning::services::TableRow;
use tag_provisioning::state_machine::{EntityKind, EntityStatus};
use tag_provisioning::test_helpers::{StepHarness, TEST_TAG_ELEMENT};
use uuid::Uuid;

pub const SCAN_NAME: &str = "Morning Sweep";

/// A harness plus builders for the records a provisioning tree is made of
pub struct Fixture {
    pub harness: StepHarness,
    pub config: ProvisioningConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            harness: StepHarness::new(),
            config: ProvisioningConfig::default(),
        }
    }

    pub fn insert(&self, record: EntityRecord) -> Uuid {
        let id = record.id;
        self.harness.store.insert(record);
        id
    }

    pub fn provision(&self, status: EntityStatus) -> Uuid {
        self.insert(EntityRecord::new(EntityKind::Provision, status).with_name("Evening Provision"))
    }

    pub fn scanner(&self, name: &str, status: EntityStatus, manifests: &[(&str, &str)]) -> Uuid {
        let record = manifests.iter().fold(
            EntityRecord::new(EntityKind::Scanner, status).with_name(name),
            |record, (manifest, url)| record.with_manifest(Manifest::new(*manifest, *url)),
        );
        self.insert(record)
    }

    pub fn channel(&self, name: &str, status: EntityStatus, layout: Option<&str>) -> Uuid {
        let mut record = EntityRecord::new(EntityKind::Channel, status).with_name(name);
        if let Some(layout) = layout {
            record = record.with_layout(LayoutSection::for_layout(layout));
        }
        self.insert(record)
    }

    /// Scan-channel table row for a finished scan of `url`
    pub fn finished_scan(title: &str, url: &str) -> TableRow {
        TableRow::new(title)
            .with_cell(13, title)
            .with_cell(14, url)
            .with_cell(2, "5")
    }

    pub fn set_scan_table(&self, snapshots: Vec<Vec<TableRow>>) {
        self.harness.device.script_table(
            TEST_TAG_ELEMENT,
            self.config.device.scan_channel_table,
            snapshots,
        );
    }

    /// Free layout slots, optionally already holding an occupant
    pub fn set_layout(&self, slots: &[(&str, u32, &str)]) {
        let rows = slots
            .iter()
            .map(|(layout, sequence, occupant)| {
                TableRow::new(format!("{layout}/{sequence}"))
                    .with_cell(self.config.device.layout_name_column, *layout)
                    .with_cell(self.config.device.layout_occupancy_column, "0")
                    .with_cell(self.config.device.layout_reservation_column, *occupant)
            })
            .collect();
        self.harness
            .device
            .set_table(TEST_TAG_ELEMENT, self.config.device.layout_table, rows);
    }

    pub fn status(&self, id: Uuid) -> Option<EntityStatus> {
        self.harness.store.status_of(id)
    }
}
