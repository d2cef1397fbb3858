//! # Layout Slot Allocator
//!
//! Places a batch of channels into consecutive free slots of a named layout.
//!
//! Slots are addressed as `layout/sequence`; two slots are adjacent iff their
//! sequence numbers differ by exactly one. The earliest contiguous run long
//! enough for the batch wins. A single-channel batch takes the first free slot.
//!
//! The device pass reads the layout's free slots, allocates, then reserves each
//! slot and writes the channel's layout position. A channel is only given a
//! slot it managed to reserve. Writes are best-effort per channel; a failed
//! write is reported and the rest of the batch continues.
//! Nothing guards against another writer changing the layout between the read
//! and the writes.

use crate::config::DeviceConfig;
use crate::constants::{FREE_SLOT_MARKER, RESERVED_MARKER};
use crate::models::{EntityRecord, FieldRef};
use crate::services::{ColumnFilter, CommandDispatch, DeviceError, DeviceTableSource, EntityStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Composite key of one layout slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub layout: String,
    pub sequence: u32,
}

impl SlotKey {
    pub fn new(layout: impl Into<String>, sequence: u32) -> Self {
        Self {
            layout: layout.into(),
            sequence,
        }
    }

    /// True when `next` directly follows this slot in the same layout
    pub fn precedes(&self, next: &SlotKey) -> bool {
        self.layout == next.layout && self.sequence.checked_add(1) == Some(next.sequence)
    }
}

impl FromStr for SlotKey {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| DeviceError::MalformedRow {
            key: s.to_string(),
            reason: reason.to_string(),
        };

        // Layout names may contain '/', the sequence never does
        let (layout, sequence) = s
            .rsplit_once('/')
            .ok_or_else(|| malformed("expected layout/sequence"))?;
        let sequence = sequence
            .trim()
            .parse()
            .map_err(|_| malformed("sequence is not a number"))?;

        Ok(Self::new(layout, sequence))
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layout, self.sequence)
    }
}

/// Why a batch could not be placed into a layout
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum InsufficientSpace {
    #[error("Not enough free positions to set {requested} channels into {layout} ({free} free)")]
    NotEnoughFree {
        layout: String,
        requested: usize,
        free: usize,
    },

    #[error(
        "Not enough free positions in a row to set {requested} channels into {layout} (longest run {longest_run})"
    )]
    NotSequential {
        layout: String,
        requested: usize,
        longest_run: usize,
    },
}

impl InsufficientSpace {
    pub fn layout(&self) -> &str {
        match self {
            Self::NotEnoughFree { layout, .. } | Self::NotSequential { layout, .. } => layout,
        }
    }
}

/// Pick `requested` consecutive slots out of `free_slots`.
///
/// `free_slots` must already be restricted to one layout and to free,
/// non-reserved slots; they are ordered by sequence here. The free count must
/// exceed the request, otherwise nothing is allocated.
pub fn allocate(
    layout: &str,
    requested: usize,
    free_slots: &[SlotKey],
) -> Result<Vec<SlotKey>, InsufficientSpace> {
    if requested == 0 {
        return Ok(Vec::new());
    }

    if free_slots.len() <= requested {
        return Err(InsufficientSpace::NotEnoughFree {
            layout: layout.to_string(),
            requested,
            free: free_slots.len(),
        });
    }

    let mut slots = free_slots.to_vec();
    slots.sort_by_key(|slot| slot.sequence);

    if requested == 1 {
        return Ok(vec![slots[0].clone()]);
    }

    let mut run = vec![slots[0].clone()];
    let mut longest_run = 1;

    for pair in slots.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if !current.precedes(next) {
            run.clear();
        }
        run.push(next.clone());
        longest_run = longest_run.max(run.len());

        if run.len() >= requested {
            return Ok(run);
        }
    }

    Err(InsufficientSpace::NotSequential {
        layout: layout.to_string(),
        requested,
        longest_run,
    })
}

/// One channel layout section waiting for a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub channel_id: Uuid,
    /// Index of the channel's Layouts section to write the position into
    pub section: usize,
}

/// Placement requests grouped per layout name, in encounter order
pub fn group_by_layout(channels: &[EntityRecord]) -> Vec<(String, Vec<PlacementRequest>)> {
    let mut groups: Vec<(String, Vec<PlacementRequest>)> = Vec::new();

    for channel in channels {
        for (section, layout) in channel.requested_layouts() {
            let request = PlacementRequest {
                channel_id: channel.id,
                section,
            };
            match groups.iter_mut().find(|(name, _)| name == layout) {
                Some((_, requests)) => requests.push(request),
                None => groups.push((layout.to_string(), vec![request])),
            }
        }
    }

    groups
}

/// A write that failed while applying an allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementFailure {
    pub channel_id: Uuid,
    pub slot: SlotKey,
    pub reason: String,
}

/// Outcome of placing one layout's batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutPlacement {
    Placed {
        assigned: Vec<(Uuid, SlotKey)>,
        failures: Vec<PlacementFailure>,
    },
    Insufficient(InsufficientSpace),
}

/// Runs allocations against the device layout table
pub struct LayoutSlotAllocator {
    tables: Arc<dyn DeviceTableSource>,
    dispatch: Arc<dyn CommandDispatch>,
    store: Arc<dyn EntityStore>,
    device: DeviceConfig,
}

impl LayoutSlotAllocator {
    pub fn new(
        tables: Arc<dyn DeviceTableSource>,
        dispatch: Arc<dyn CommandDispatch>,
        store: Arc<dyn EntityStore>,
        device: DeviceConfig,
    ) -> Self {
        Self {
            tables,
            dispatch,
            store,
            device,
        }
    }

    /// Free, non-reserved slots of `layout` on `element`
    pub async fn free_slots(&self, element: &str, layout: &str) -> Result<Vec<SlotKey>, DeviceError> {
        let filters = [
            ColumnFilter::equal(self.device.layout_name_column, layout),
            ColumnFilter::equal(self.device.layout_occupancy_column, FREE_SLOT_MARKER),
            ColumnFilter::not_equal(self.device.layout_reservation_column, RESERVED_MARKER),
        ];

        let rows = self
            .tables
            .query_table(element, self.device.layout_table, &filters)
            .await?;

        rows.iter().map(|row| row.key.parse()).collect()
    }

    /// Allocate and apply one layout's batch.
    ///
    /// `Err` is returned only when the layout could not be read; individual
    /// write failures end up in [`LayoutPlacement::Placed::failures`].
    pub async fn place(
        &self,
        element: &str,
        layout: &str,
        requests: &[PlacementRequest],
    ) -> Result<LayoutPlacement, DeviceError> {
        let free = self.free_slots(element, layout).await?;
        debug!(
            layout = %layout,
            requested = requests.len(),
            free = free.len(),
            "🧮 Allocating layout slots"
        );

        let slots = match allocate(layout, requests.len(), &free) {
            Ok(slots) => slots,
            Err(shortfall) => {
                warn!(layout = %layout, error = %shortfall, "⚠️ Layout has no room for batch");
                return Ok(LayoutPlacement::Insufficient(shortfall));
            }
        };

        let mut assigned = Vec::with_capacity(slots.len());
        let mut failures = Vec::new();

        for (request, slot) in requests.iter().zip(slots) {
            match self.assign(element, request, &slot).await {
                Ok(()) => assigned.push((request.channel_id, slot)),
                Err(reason) => {
                    warn!(
                        channel_id = %request.channel_id,
                        slot = %slot,
                        error = %reason,
                        "⚠️ Failed to assign layout slot"
                    );
                    failures.push(PlacementFailure {
                        channel_id: request.channel_id,
                        slot,
                        reason,
                    });
                }
            }
        }

        info!(
            layout = %layout,
            assigned = assigned.len(),
            failed = failures.len(),
            "📐 Layout batch placed"
        );

        Ok(LayoutPlacement::Placed { assigned, failures })
    }

    /// Reserve the slot, then record it on the channel; a slot that could not
    /// be reserved is never written to the channel
    async fn assign(
        &self,
        element: &str,
        request: &PlacementRequest,
        slot: &SlotKey,
    ) -> Result<(), String> {
        let position = slot.to_string();

        self.dispatch
            .set_cell(
                element,
                self.device.layout_reservation_column,
                &position,
                RESERVED_MARKER,
            )
            .await
            .map_err(|e| e.to_string())?;

        self.store
            .write_field(
                request.channel_id,
                &FieldRef::LayoutPosition {
                    section: request.section,
                },
                &position,
            )
            .await
            .map_err(|e| e.to_string())
    }
}
