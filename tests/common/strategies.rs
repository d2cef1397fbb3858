use proptest::prelude::*;
use tag_provisioning::orchestration::SlotKey;
use tag_provisioning::state_machine::EntityStatus;

/// Strategy for layout names as operators type them
pub fn layout_name_strategy() -> impl Strategy<Value = String> {
    "[A-Z][a-zA-Z0-9 ]{0,15}"
}

/// Strategy for a layout's free slots: distinct sequence numbers with gaps
pub fn free_slots_strategy() -> impl Strategy<Value = (String, Vec<SlotKey>)> {
    (
        layout_name_strategy(),
        prop::collection::btree_set(1u32..64, 0..24),
    )
        .prop_map(|(layout, sequences)| {
            let slots = sequences
                .into_iter()
                .map(|sequence| SlotKey::new(layout.clone(), sequence))
                .collect();
            (layout, slots)
        })
}

/// Strategy for batch sizes
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    1usize..8
}

/// Strategy for any status
pub fn status_strategy() -> impl Strategy<Value = EntityStatus> {
    prop::sample::select(EntityStatus::ALL.to_vec())
}

/// Strategy for child statuses that have settled
pub fn settled_status_strategy() -> impl Strategy<Value = EntityStatus> {
    prop::sample::select(vec![
        EntityStatus::Active,
        EntityStatus::Complete,
        EntityStatus::ActiveWithErrors,
        EntityStatus::Error,
    ])
}
