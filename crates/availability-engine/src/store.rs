//! The day-selection store: free time per local calendar day.
//!
//! A [`DaySelections`] maps a [`DayKey`] to a sorted list of [`Interval`]s
//! that never overlap or touch (`next.start > prev.end + 1`). Days without
//! intervals are never kept, so an absent key and an empty list are the same
//! thing. Every operation takes `&self` and returns a new store.
//!
//! Intervals never cross midnight. A candidate running past slot 95 is split:
//! the head stays on its day and the remainder continues from slot 0 of the
//! next day. Removing either half of such a pair removes both.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::slot::{self, SlotIndex, LAST_SLOT};

// ── DayKey ──────────────────────────────────────────────────────────────────

/// A `YYYY-MM-DD` calendar day in some zone's local calendar.
///
/// Ordering matches the lexicographic ordering of the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Parse a strict `YYYY-MM-DD` key.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDayKey`] for anything else, including
    /// unpadded fields and impossible dates such as `2026-02-30`.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 10
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() });
        if !well_formed {
            return Err(EngineError::InvalidDayKey(format!("'{}'", s)));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DayKey)
            .map_err(|e| EngineError::InvalidDayKey(format!("'{}': {}", s, e)))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        DayKey(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The following day, if it still has a four-digit year.
    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().and_then(Self::keyable)
    }

    /// The preceding day, if it still has a four-digit year.
    pub fn pred(&self) -> Option<Self> {
        self.0.pred_opt().and_then(Self::keyable)
    }

    /// The day `days` away from this one, if it still has a four-digit year.
    pub fn offset_days(&self, days: i64) -> Option<Self> {
        self.0
            .checked_add_signed(chrono::Duration::days(days))
            .and_then(Self::keyable)
    }

    // Only years 0000-9999 print as a key that `parse` accepts again.
    fn keyable(date: NaiveDate) -> Option<Self> {
        (0..=9999).contains(&date.year()).then_some(DayKey(date))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DayKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ── Interval ────────────────────────────────────────────────────────────────

/// An inclusive run of slots `start..=end` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: SlotIndex,
    pub end: SlotIndex,
}

impl Interval {
    /// Build an interval, swapping the bounds if they arrive reversed
    /// (a drag selection made right to left).
    pub fn new(start: SlotIndex, end: SlotIndex) -> Self {
        if start <= end {
            Interval { start, end }
        } else {
            Interval {
                start: end,
                end: start,
            }
        }
    }

    pub fn contains(&self, index: SlotIndex) -> bool {
        self.start <= index && index <= self.end
    }

    /// Number of quarter-hours covered, whichever way round the bounds are.
    pub fn slot_count(&self) -> u16 {
        self.end.abs_diff(self.start) + 1
    }

    /// Whether the interval reaches the last slot of its day.
    pub fn touches_midnight_end(&self) -> bool {
        self.end >= LAST_SLOT
    }

    /// Whether the interval starts at the first slot of its day.
    pub fn touches_midnight_start(&self) -> bool {
        self.start == 0
    }

    /// `"HH:MM-HH:MM"` with an exclusive end, e.g. `"23:00-24:00"`.
    pub fn label(&self) -> String {
        format!("{}-{}", slot::label(self.start), slot::end_label(self.end))
    }

    fn clamped(self) -> Self {
        let iv = Interval::new(self.start, self.end);
        Interval {
            start: slot::clamp_index(iv.start),
            end: slot::clamp_index(iv.end),
        }
    }
}

/// Sort by start and fold overlapping or adjacent intervals together.
///
/// The result is the minimal equivalent list; applying it twice changes
/// nothing.
pub fn merge_intervals(list: &[Interval]) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = list.iter().map(|iv| Interval::new(iv.start, iv.end)).collect();
    sorted.sort_by_key(|iv| (iv.start, iv.end));

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for iv in sorted {
        if let Some(last) = merged.last_mut() {
            if u32::from(iv.start) <= u32::from(last.end) + 1 {
                last.end = last.end.max(iv.end);
                continue;
            }
        }
        merged.push(iv);
    }
    merged
}

// ── DaySelections ───────────────────────────────────────────────────────────

/// Free time keyed by local calendar day.
///
/// Serializes as `{ "YYYY-MM-DD": [{ "start": s, "end": e }, ...] }`.
/// Deserializing clamps indices, merges and drops empty days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<DayKey, Vec<Interval>>",
    into = "BTreeMap<DayKey, Vec<Interval>>"
)]
pub struct DaySelections {
    days: BTreeMap<DayKey, Vec<Interval>>,
}

impl DaySelections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of days with at least one interval.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Days in ascending order with their intervals.
    pub fn iter(&self) -> impl Iterator<Item = (DayKey, &[Interval])> + '_ {
        self.days.iter().map(|(day, ivs)| (*day, ivs.as_slice()))
    }

    /// Intervals stored for `day`; empty when the day has none.
    pub fn blocks(&self, day: DayKey) -> &[Interval] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// String-keyed form of [`DaySelections::blocks`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDayKey`] for a malformed key.
    pub fn day_blocks(&self, day: &str) -> Result<Vec<Interval>> {
        Ok(self.blocks(DayKey::parse(day)?).to_vec())
    }

    /// Add `candidate` to `day` and re-merge.
    ///
    /// A start past slot 95 is clamped onto it. An end past slot 95 overflows into
    /// the next day starting at slot 0, repeatedly if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDayKey`] for a malformed key; the store
    /// is left as it was.
    ///
    /// # Examples
    ///
    /// ```
    /// use availability_engine::store::{DaySelections, Interval};
    ///
    /// let store = DaySelections::new()
    ///     .add_interval("2026-03-01", Interval::new(92, 97))
    ///     .unwrap();
    /// assert_eq!(store.day_blocks("2026-03-01").unwrap(), vec![Interval::new(92, 95)]);
    /// assert_eq!(store.day_blocks("2026-03-02").unwrap(), vec![Interval::new(0, 1)]);
    /// ```
    pub fn add_interval(&self, day: &str, candidate: Interval) -> Result<Self> {
        Ok(self.with_interval(DayKey::parse(day)?, candidate))
    }

    /// Typed form of [`DaySelections::add_interval`].
    pub fn with_interval(&self, day: DayKey, candidate: Interval) -> Self {
        let mut next = self.clone();
        next.insert(day, candidate);
        next
    }

    /// Remove the whole block containing `index` on `day`.
    ///
    /// A block reaching slot 95 also takes the next day's block starting at
    /// slot 0 with it, and a block starting at slot 0 takes the previous day's
    /// block ending at slot 95. Whole-day blocks pass the removal on, so an
    /// add that overflowed across several days is undone completely. An
    /// index outside every block is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDayKey`] for a malformed key.
    pub fn remove_interval(&self, day: &str, index: SlotIndex) -> Result<Self> {
        Ok(self.without_block_at(DayKey::parse(day)?, index))
    }

    /// Typed form of [`DaySelections::remove_interval`].
    pub fn without_block_at(&self, day: DayKey, index: SlotIndex) -> Self {
        let mut next = self.clone();
        next.remove_at(day, slot::clamp_index(index));
        next
    }

    /// Build a store from arbitrary per-day lists, normalizing each day.
    pub fn from_days<I>(days: I) -> Self
    where
        I: IntoIterator<Item = (DayKey, Vec<Interval>)>,
    {
        let mut grouped: BTreeMap<DayKey, Vec<Interval>> = BTreeMap::new();
        for (day, ivs) in days {
            grouped
                .entry(day)
                .or_default()
                .extend(ivs.into_iter().map(Interval::clamped));
        }
        let days = grouped
            .into_iter()
            .filter_map(|(day, ivs)| {
                let merged = merge_intervals(&ivs);
                (!merged.is_empty()).then_some((day, merged))
            })
            .collect();
        DaySelections { days }
    }

    fn insert(&mut self, day: DayKey, candidate: Interval) {
        let candidate = Interval::new(candidate.start, candidate.end);
        // A start past the grid is pulled back onto slot 95, keeping the length.
        let start = slot::clamp_index(candidate.start);
        let end = candidate.end - (candidate.start - start);

        if end > LAST_SLOT {
            let overflow = end - LAST_SLOT;
            self.push_merged(day, Interval::new(start, LAST_SLOT));
            match day.succ() {
                Some(next_day) => {
                    debug!(day = %day, next_day = %next_day, overflow, "interval overflows midnight");
                    self.insert(next_day, Interval::new(0, overflow - 1));
                }
                None => warn!(day = %day, overflow, "no following day for overflow; dropping remainder"),
            }
        } else {
            self.push_merged(day, Interval::new(start, end));
        }
    }

    fn push_merged(&mut self, day: DayKey, iv: Interval) {
        let list = self.days.entry(day).or_default();
        list.push(iv);
        *list = merge_intervals(list);
    }

    fn remove_at(&mut self, day: DayKey, index: SlotIndex) {
        let Some(removed) = self.take_block(day, |iv| iv.contains(index)) else {
            return;
        };

        if removed.touches_midnight_end() {
            self.unwind_forward(day);
        }
        if removed.touches_midnight_start() {
            self.unwind_backward(day);
        }
    }

    /// Drop the overflow continuation after `day`, following it through
    /// whole days until a block stops short of midnight.
    fn unwind_forward(&mut self, mut day: DayKey) {
        while let Some(next_day) = day.succ() {
            let Some(tail) = self.take_block(next_day, Interval::touches_midnight_start) else {
                break;
            };
            debug!(day = %day, next_day = %next_day, tail = %tail.label(), "removed overflow continuation");
            if !tail.touches_midnight_end() {
                break;
            }
            day = next_day;
        }
    }

    /// Drop the blocks that overflowed into `day`, following them back
    /// through whole days until a block starts after midnight.
    fn unwind_backward(&mut self, mut day: DayKey) {
        while let Some(prev_day) = day.pred() {
            let Some(head) = self.take_block(prev_day, Interval::touches_midnight_end) else {
                break;
            };
            debug!(day = %day, prev_day = %prev_day, head = %head.label(), "removed overflow head");
            if !head.touches_midnight_start() {
                break;
            }
            day = prev_day;
        }
    }

    /// Remove and return the first block on `day` matching `pred`, dropping
    /// the day when it empties.
    fn take_block<F>(&mut self, day: DayKey, pred: F) -> Option<Interval>
    where
        F: Fn(&Interval) -> bool,
    {
        let list = self.days.get_mut(&day)?;
        let pos = list.iter().position(pred)?;
        let removed = list.remove(pos);
        if list.is_empty() {
            self.days.remove(&day);
        }
        Some(removed)
    }
}

impl From<BTreeMap<DayKey, Vec<Interval>>> for DaySelections {
    fn from(days: BTreeMap<DayKey, Vec<Interval>>) -> Self {
        Self::from_days(days)
    }
}

impl From<DaySelections> for BTreeMap<DayKey, Vec<Interval>> {
    fn from(store: DaySelections) -> Self {
        store.days
    }
}
