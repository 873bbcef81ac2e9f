//! Read-only questions asked of other users' availability when filtering and
//! sorting listings: when is the earliest free moment, which start-date
//! bucket does it fall in, and is the user's zone in a given region.
//!
//! The engine owns no clock; `now` is always passed in.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{BucketEdges, EngineConfig, RegionTable};
use crate::error::Result;
use crate::offset::TimeZoneId;
use crate::record::AvailabilityRecord;
use crate::slot::{index_to_minutes, SLOT_MINUTES};
use crate::store::{DayKey, DaySelections, Interval};

const MS_PER_DAY: f64 = 86_400_000.0;

// ── earliest_future_instant ─────────────────────────────────────────────────

/// Earliest instant at or after `now` that falls in a free interval.
///
/// An interval already under way at `now` yields `now` itself. Returns
/// `None` when every interval has ended.
///
/// # Errors
///
/// Returns [`crate::EngineError::InvalidTimeZone`] if `time_zone` cannot be
/// resolved.
pub fn earliest_future_instant(
    store: &DaySelections,
    time_zone: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let tz = TimeZoneId::parse(time_zone)?;
    Ok(earliest_future_instant_in(store, &tz, now))
}

/// [`earliest_future_instant`] over an already-resolved zone.
pub fn earliest_future_instant_in(
    store: &DaySelections,
    tz: &TimeZoneId,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    store
        .iter()
        .flat_map(|(day, intervals)| intervals.iter().map(move |iv| absolute_span(tz, day, iv)))
        .filter(|(_, end)| *end > now)
        .map(|(start, _)| if start <= now { now } else { start })
        .min()
}

/// Absolute `[start, end)` of an interval on `day`, read in `tz`.
///
/// Each bound is resolved with the offset in effect on that wall-clock time,
/// so a day containing a DST change is handled correctly.
pub fn absolute_span(
    tz: &TimeZoneId,
    day: DayKey,
    iv: &Interval,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = day.date().and_time(NaiveTime::MIN);
    let start = midnight + Duration::minutes(index_to_minutes(iv.start));
    let end = midnight + Duration::minutes(index_to_minutes(iv.end) + SLOT_MINUTES);
    (tz.local_to_utc(start), tz.local_to_utc(end))
}

// ── bucketize ───────────────────────────────────────────────────────────────

/// Coarse "how soon can they start" buckets used by listing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StartBucket {
    #[serde(rename = "within-1-day")]
    WithinOneDay,
    #[serde(rename = "1-to-3-days")]
    OneToThreeDays,
    #[serde(rename = "3-to-7-days")]
    ThreeToSevenDays,
    #[serde(rename = "beyond-7-days")]
    BeyondSevenDays,
}

impl StartBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartBucket::WithinOneDay => "within-1-day",
            StartBucket::OneToThreeDays => "1-to-3-days",
            StartBucket::ThreeToSevenDays => "3-to-7-days",
            StartBucket::BeyondSevenDays => "beyond-7-days",
        }
    }
}

/// Bucket `instant` relative to `now` with the default edges (1, 3, 7 days).
pub fn bucketize(instant: DateTime<Utc>, now: DateTime<Utc>) -> StartBucket {
    bucketize_with(instant, now, &BucketEdges::default())
}

/// Bucket `instant` relative to `now` by elapsed time, ignoring calendar days.
pub fn bucketize_with(
    instant: DateTime<Utc>,
    now: DateTime<Utc>,
    edges: &BucketEdges,
) -> StartBucket {
    let days = (instant - now).num_milliseconds() as f64 / MS_PER_DAY;
    if days < edges.within_one {
        StartBucket::WithinOneDay
    } else if days < edges.within_few {
        StartBucket::OneToThreeDays
    } else if days <= edges.within_week {
        StartBucket::ThreeToSevenDays
    } else {
        StartBucket::BeyondSevenDays
    }
}

/// A start-date filter chosen in listing search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartFilter {
    #[default]
    Any,
    Only(StartBucket),
}

impl StartFilter {
    /// Whether a listing whose earliest free instant is `earliest` passes.
    /// Listings with no future availability only pass [`StartFilter::Any`].
    pub fn matches(
        &self,
        earliest: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        edges: &BucketEdges,
    ) -> bool {
        match (self, earliest) {
            (StartFilter::Any, _) => true,
            (StartFilter::Only(_), None) => false,
            (StartFilter::Only(bucket), Some(at)) => bucketize_with(at, now, edges) == *bucket,
        }
    }
}

// ── region_matches ──────────────────────────────────────────────────────────

/// Whether `time_zone`'s offset at `at` lies in `region_id`'s ranges, using
/// the built-in region table.
pub fn region_matches(time_zone: &str, region_id: &str, at: DateTime<Utc>) -> bool {
    region_matches_in(&RegionTable::default(), time_zone, region_id, at)
}

/// [`region_matches`] against an explicit table.
///
/// A "no preference" id or an id missing from the table matches every zone.
/// An unresolvable zone matches nothing else.
pub fn region_matches_in(
    table: &RegionTable,
    time_zone: &str,
    region_id: &str,
    at: DateTime<Utc>,
) -> bool {
    if table.is_no_preference(region_id) {
        return true;
    }
    let Some(ranges) = table.ranges_for(region_id) else {
        return true;
    };

    match TimeZoneId::parse(time_zone) {
        Ok(tz) => {
            let hours = f64::from(tz.offset_minutes(at)) / 60.0;
            ranges.iter().any(|r| r.contains_hours(hours))
        }
        Err(err) => {
            warn!(time_zone, region_id, %err, "cannot place time zone in region");
            false
        }
    }
}

// ── listing ranking ─────────────────────────────────────────────────────────

/// One listing's earliest availability, as shown on a search result card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedListing<K> {
    pub id: K,
    pub earliest: Option<DateTime<Utc>>,
    pub bucket: Option<StartBucket>,
}

/// Rank listings by earliest free instant after `now`.
///
/// Listings with nothing in the future come last; ties are broken by id.
/// Records whose zone cannot be resolved are read in the configured default
/// zone.
pub fn rank_by_earliest<K>(
    listings: &[(K, AvailabilityRecord)],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<RankedListing<K>>
where
    K: Ord + Clone,
{
    let mut ranked: Vec<RankedListing<K>> = listings
        .iter()
        .map(|(id, record)| {
            let earliest = record.earliest_available(now, config);
            RankedListing {
                id: id.clone(),
                earliest,
                bucket: earliest.map(|at| bucketize_with(at, now, &config.buckets)),
            }
        })
        .collect();

    ranked.sort_by(|a, b| match (a.earliest, b.earliest) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
    ranked
}

/// Keep the ranked listings that pass `filter`.
pub fn filter_by_start<K>(
    ranked: Vec<RankedListing<K>>,
    filter: StartFilter,
    now: DateTime<Utc>,
    edges: &BucketEdges,
) -> Vec<RankedListing<K>> {
    ranked
        .into_iter()
        .filter(|listing| filter.matches(listing.earliest, now, edges))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn store(entries: &[(&str, u16, u16)]) -> DaySelections {
        entries.iter().fold(DaySelections::new(), |s, (day, a, b)| {
            s.add_interval(day, Interval::new(*a, *b)).unwrap()
        })
    }

    // ── earliest_future_instant ─────────────────────────────────────────

    #[test]
    fn test_earliest_straddling_now_returns_now() {
        let s = store(&[("2026-03-01", 0, 3)]);
        let now = utc(2026, 3, 1, 0, 30);
        assert_eq!(earliest_future_instant(&s, "UTC+0", now).unwrap(), Some(now));
    }

    #[test]
    fn test_earliest_future_interval_start() {
        let s = store(&[("2026-03-01", 40, 43), ("2026-03-02", 8, 11)]);
        let now = utc(2026, 3, 1, 9, 0);
        assert_eq!(
            earliest_future_instant(&s, "UTC+0", now).unwrap(),
            Some(utc(2026, 3, 1, 10, 0))
        );
    }

    #[test]
    fn test_earliest_skips_ended_intervals() {
        let s = store(&[("2026-03-01", 0, 3), ("2026-03-03", 36, 39)]);
        let now = utc(2026, 3, 1, 1, 0);
        assert_eq!(
            earliest_future_instant(&s, "UTC+0", now).unwrap(),
            Some(utc(2026, 3, 3, 9, 0))
        );
    }

    #[test]
    fn test_earliest_none_when_all_past() {
        let s = store(&[("2026-02-01", 0, 95)]);
        assert_eq!(earliest_future_instant(&s, "UTC+0", utc(2026, 3, 1, 0, 0)).unwrap(), None);
        assert_eq!(
            earliest_future_instant(&DaySelections::new(), "UTC+0", utc(2026, 3, 1, 0, 0)).unwrap(),
            None
        );
    }

    #[test]
    fn test_earliest_reads_day_in_zone() {
        // 09:00 on 2026-03-01 in Shanghai is 01:00 UTC.
        let s = store(&[("2026-03-01", 36, 39)]);
        let now = utc(2026, 2, 28, 0, 0);
        assert_eq!(
            earliest_future_instant(&s, "Asia/Shanghai", now).unwrap(),
            Some(utc(2026, 3, 1, 1, 0))
        );
    }

    #[test]
    fn test_earliest_dst_per_day() {
        // 09:00 New York is 14:00 UTC in winter and 13:00 UTC in summer.
        let winter = store(&[("2026-01-15", 36, 39)]);
        let summer = store(&[("2026-07-15", 36, 39)]);
        let now = utc(2026, 1, 1, 0, 0);
        assert_eq!(
            earliest_future_instant(&winter, "America/New_York", now).unwrap(),
            Some(utc(2026, 1, 15, 14, 0))
        );
        assert_eq!(
            earliest_future_instant(&summer, "America/New_York", now).unwrap(),
            Some(utc(2026, 7, 15, 13, 0))
        );
    }

    #[test]
    fn test_earliest_end_is_exclusive() {
        let s = store(&[("2026-03-01", 0, 3)]);
        assert_eq!(earliest_future_instant(&s, "UTC+0", utc(2026, 3, 1, 1, 0)).unwrap(), None);
    }

    #[test]
    fn test_earliest_invalid_zone() {
        let s = store(&[("2026-03-01", 0, 3)]);
        assert!(earliest_future_instant(&s, "Neverland", utc(2026, 3, 1, 0, 0)).is_err());
    }

    // ── bucketize ───────────────────────────────────────────────────────

    #[test]
    fn test_bucket_edges() {
        let now = utc(2026, 3, 1, 12, 0);
        assert_eq!(bucketize(now, now), StartBucket::WithinOneDay);
        assert_eq!(bucketize(utc(2026, 3, 2, 11, 59), now), StartBucket::WithinOneDay);
        assert_eq!(bucketize(utc(2026, 3, 2, 12, 0), now), StartBucket::OneToThreeDays);
        assert_eq!(bucketize(utc(2026, 3, 4, 12, 0), now), StartBucket::ThreeToSevenDays);
        assert_eq!(bucketize(utc(2026, 3, 8, 12, 0), now), StartBucket::ThreeToSevenDays);
        assert_eq!(bucketize(utc(2026, 3, 8, 12, 1), now), StartBucket::BeyondSevenDays);
    }

    #[test]
    fn test_bucket_custom_edges() {
        let edges = BucketEdges {
            within_one: 0.5,
            within_few: 2.0,
            within_week: 5.0,
        };
        let now = utc(2026, 3, 1, 0, 0);
        assert_eq!(
            bucketize_with(utc(2026, 3, 1, 18, 0), now, &edges),
            StartBucket::OneToThreeDays
        );
        assert_eq!(
            bucketize_with(utc(2026, 3, 7, 0, 0), now, &edges),
            StartBucket::BeyondSevenDays
        );
    }

    #[test]
    fn test_start_filter() {
        let now = utc(2026, 3, 1, 0, 0);
        let edges = BucketEdges::default();
        let soon = Some(utc(2026, 3, 1, 5, 0));
        assert!(StartFilter::Any.matches(None, now, &edges));
        assert!(StartFilter::Only(StartBucket::WithinOneDay).matches(soon, now, &edges));
        assert!(!StartFilter::Only(StartBucket::OneToThreeDays).matches(soon, now, &edges));
        assert!(!StartFilter::Only(StartBucket::WithinOneDay).matches(None, now, &edges));
    }

    #[test]
    fn test_bucket_serde_names() {
        assert_eq!(
            serde_json::to_string(&StartBucket::OneToThreeDays).unwrap(),
            "\"1-to-3-days\""
        );
        assert_eq!(StartBucket::BeyondSevenDays.as_str(), "beyond-7-days");
    }

    // ── region_matches ──────────────────────────────────────────────────

    #[test]
    fn test_region_china() {
        let at = utc(2026, 3, 1, 0, 0);
        assert!(region_matches("UTC+8 (Shanghai)", "中国", at));
        assert!(region_matches("Asia/Shanghai", "中国", at));
        assert!(!region_matches("UTC-5 (New York)", "中国", at));
    }

    #[test]
    fn test_region_no_preference_and_unknown() {
        let at = utc(2026, 3, 1, 0, 0);
        assert!(region_matches("UTC-5", "随便看看", at));
        assert!(region_matches("UTC-5", "no preference", at));
        assert!(region_matches("not a zone", "no preference", at));
        assert!(region_matches("UTC-5", "火星", at));
    }

    #[test]
    fn test_region_invalid_zone_does_not_match() {
        assert!(!region_matches("not a zone", "中国", utc(2026, 3, 1, 0, 0)));
    }

    #[test]
    fn test_region_depends_on_dst() {
        // London is UTC+0 in winter, UTC+1 in summer; a table entry for
        // summer time only accepts the latter.
        let mut table = RegionTable::default();
        table.ranges.insert(
            "summer-london".to_string(),
            vec![crate::config::OffsetRange::new(1.0, 1.0)],
        );
        assert!(!region_matches_in(&table, "Europe/London", "summer-london", utc(2026, 1, 15, 12, 0)));
        assert!(region_matches_in(&table, "Europe/London", "summer-london", utc(2026, 7, 15, 12, 0)));
    }

    // ── ranking ─────────────────────────────────────────────────────────

    #[test]
    fn test_rank_by_earliest() {
        let now = utc(2026, 3, 1, 0, 0);
        let mut late = AvailabilityRecord::new("UTC+0", 1.0);
        late.day_selections = store(&[("2026-03-10", 0, 3)]);
        let mut soon = AvailabilityRecord::new("UTC+0", 1.0);
        soon.day_selections = store(&[("2026-03-01", 8, 11)]);
        let never = AvailabilityRecord::new("UTC+0", 1.0);

        let listings = vec![("c", never), ("a", late), ("b", soon)];
        let ranked = rank_by_earliest(&listings, now, &EngineConfig::default());

        let ids: Vec<&str> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(ranked[0].bucket, Some(StartBucket::WithinOneDay));
        assert_eq!(ranked[1].bucket, Some(StartBucket::BeyondSevenDays));
        assert_eq!(ranked[2].bucket, None);

        let filtered = filter_by_start(
            ranked,
            StartFilter::Only(StartBucket::BeyondSevenDays),
            now,
            &BucketEdges::default(),
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "a");
    }
}
