//! The fixed quarter-hour grid a day is divided into.
//!
//! Slot `i` covers local minutes `[i * 15, i * 15 + 15)`. Everything here is a
//! pure index ↔ time-of-day conversion.

/// Index of a quarter-hour within a day, `0..=95` once stored.
pub type SlotIndex = u16;

/// Minutes covered by one slot.
pub const SLOT_MINUTES: i64 = 15;

/// Number of slots in a calendar day.
pub const SLOTS_PER_DAY: u16 = 96;

/// The last slot of a day (23:45–24:00).
pub const LAST_SLOT: SlotIndex = SLOTS_PER_DAY - 1;

/// Minutes in a calendar day on the slot grid.
pub const MINUTES_PER_DAY: i64 = SLOT_MINUTES * SLOTS_PER_DAY as i64;

/// Start of slot `i` in minutes after local midnight.
pub fn index_to_minutes(i: SlotIndex) -> i64 {
    i64::from(i) * SLOT_MINUTES
}

/// The slot containing minute `m`, clamped to `[0, 95]`.
pub fn minutes_to_index(m: i64) -> SlotIndex {
    let idx = m.div_euclid(SLOT_MINUTES).clamp(0, i64::from(LAST_SLOT));
    idx as SlotIndex
}

/// Clamp an arbitrary index onto the grid.
pub fn clamp_index(i: SlotIndex) -> SlotIndex {
    i.min(LAST_SLOT)
}

/// `"HH:MM"` (24-hour) for the start of slot `i`.
pub fn label(i: SlotIndex) -> String {
    format_minutes(index_to_minutes(clamp_index(i)))
}

/// `"HH:MM"` for the end of slot `i`; the last slot ends at `"24:00"`.
pub fn end_label(i: SlotIndex) -> String {
    format_minutes(index_to_minutes(clamp_index(i)) + SLOT_MINUTES)
}

fn format_minutes(m: i64) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}
