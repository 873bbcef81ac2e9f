//! Re-express a whole [`DaySelections`] in another timezone.
//!
//! Each day is shifted by `offset(to) - offset(from)` evaluated at that day's
//! anchor instant. A shifted interval that leaves `[00:00, 24:00)` is split at
//! the day boundary and each piece is filed under the neighboring day key.
//! Everything is re-merged at the end, since pieces from different source
//! days can land next to each other.
//!
//! With a single anchor instant for every day ([`OffsetAnchor::At`]), or with
//! zones whose offset does not change across the store's days, converting
//! A → B → A gives back the original store.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::offset::TimeZoneId;
use crate::slot::{index_to_minutes, minutes_to_index, MINUTES_PER_DAY, SLOT_MINUTES};
use crate::store::{DayKey, DaySelections, Interval};

/// Which instant a day's offsets are evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetAnchor {
    /// Noon UTC on the day key's date. Noon stays clear of the DST
    /// transitions that happen around local midnight.
    #[default]
    DayNoon,
    /// One fixed instant for every day.
    At(DateTime<Utc>),
}

impl OffsetAnchor {
    /// The instant offsets for `day` are evaluated at.
    pub fn instant_for(&self, day: DayKey) -> DateTime<Utc> {
        match self {
            OffsetAnchor::DayNoon => {
                day.date().and_time(NaiveTime::MIN).and_utc() + Duration::hours(12)
            }
            OffsetAnchor::At(at) => *at,
        }
    }
}

/// Convert `store` from zone `from` to zone `to`.
///
/// Both identifiers are resolved before anything is shifted, so an unknown
/// zone leaves nothing half-converted.
///
/// # Errors
///
/// Returns [`crate::EngineError::InvalidTimeZone`] if either zone is unknown.
///
/// # Examples
///
/// ```
/// use availability_engine::convert::{convert, OffsetAnchor};
/// use availability_engine::store::{DaySelections, Interval};
///
/// // 23:00-24:00 in UTC+8 is 16:00-17:00 in UTC+1.
/// let store = DaySelections::new()
///     .add_interval("2026-03-01", Interval::new(92, 95))
///     .unwrap();
/// let moved = convert(&store, "UTC+8", "UTC+1", OffsetAnchor::DayNoon).unwrap();
/// assert_eq!(moved.day_blocks("2026-03-01").unwrap(), vec![Interval::new(64, 67)]);
/// ```
pub fn convert(
    store: &DaySelections,
    from: &str,
    to: &str,
    anchor: OffsetAnchor,
) -> Result<DaySelections> {
    let from_tz = TimeZoneId::parse(from)?;
    let to_tz = TimeZoneId::parse(to)?;
    Ok(convert_between(store, &from_tz, &to_tz, anchor))
}

/// [`convert`] over already-resolved zones; cannot fail.
pub fn convert_between(
    store: &DaySelections,
    from: &TimeZoneId,
    to: &TimeZoneId,
    anchor: OffsetAnchor,
) -> DaySelections {
    if from == to {
        return store.clone();
    }

    let mut pieces: Vec<(DayKey, Vec<Interval>)> = Vec::new();
    let mut split_count = 0usize;

    for (day, intervals) in store.iter() {
        let at = anchor.instant_for(day);
        let delta = i64::from(to.offset_minutes(at) - from.offset_minutes(at));

        for iv in intervals {
            let shifted = shift_interval(day, iv, delta);
            if shifted.len() > 1 {
                split_count += 1;
            }
            pieces.extend(shifted.into_iter().map(|(d, piece)| (d, vec![piece])));
        }
    }

    let converted = DaySelections::from_days(pieces);
    debug!(
        from = %from,
        to = %to,
        days_in = store.day_count(),
        days_out = converted.day_count(),
        split_count,
        "converted day selections"
    );
    converted
}

/// Shift one interval by `delta` minutes, splitting it at every day boundary
/// it crosses.
fn shift_interval(day: DayKey, iv: &Interval, delta: i64) -> Vec<(DayKey, Interval)> {
    let start = index_to_minutes(iv.start) + delta;
    let end = index_to_minutes(iv.end) + SLOT_MINUTES + delta;

    let first = start.div_euclid(MINUTES_PER_DAY);
    let last = (end - 1).div_euclid(MINUTES_PER_DAY);

    let mut out = Vec::with_capacity((last - first + 1) as usize);
    for k in first..=last {
        let base = k * MINUTES_PER_DAY;
        let lo = start.max(base) - base;
        let hi = end.min(base + MINUTES_PER_DAY) - base;
        match day.offset_days(k) {
            Some(target) => out.push((
                target,
                Interval::new(minutes_to_index(lo), minutes_to_index(hi - 1)),
            )),
            None => warn!(day = %day, shift_days = k, "converted piece falls outside the calendar"),
        }
    }
    out
}
