//! The per-user availability record persisted by the backend.
//!
//! Serializes as `{ "timeZone", "sessionDurationHours", "daySelections" }`.
//! Day keys in `daySelections` only mean something together with
//! `timeZone`, so the zone is only ever changed through
//! [`AvailabilityRecord::with_time_zone`], which converts the store as well.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::convert::{convert, OffsetAnchor};
use crate::error::Result;
use crate::offset::TimeZoneId;
use crate::query::earliest_future_instant_in;
use crate::slot::{SlotIndex, SLOTS_PER_DAY};
use crate::store::{DaySelections, Interval};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRecord {
    pub time_zone: String,
    pub session_duration_hours: f64,
    #[serde(default)]
    pub day_selections: DaySelections,
}

impl AvailabilityRecord {
    pub fn new(time_zone: impl Into<String>, session_duration_hours: f64) -> Self {
        AvailabilityRecord {
            time_zone: time_zone.into(),
            session_duration_hours,
            day_selections: DaySelections::new(),
        }
    }

    /// The record's zone, or `config`'s default zone if it cannot be resolved.
    pub fn resolved_time_zone(&self, config: &EngineConfig) -> TimeZoneId {
        TimeZoneId::parse_or_default(&self.time_zone, &config.default_time_zone)
    }

    /// Slots one session occupies: the duration rounded up to whole quarter
    /// hours, at least one slot and at most one day.
    pub fn session_slots(&self) -> u16 {
        let hours = self.session_duration_hours;
        if !hours.is_finite() || hours <= 0.0 {
            return 1;
        }
        let slots = (hours * 4.0).ceil().min(f64::from(SLOTS_PER_DAY));
        (slots as u16).max(1)
    }

    /// Mark one session starting at `start` on `day` as free. A session
    /// running past midnight continues on the next day.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidDayKey`] for a malformed key.
    pub fn add_session(&self, day: &str, start: SlotIndex) -> Result<Self> {
        let candidate = Interval::new(start, start.saturating_add(self.session_slots() - 1));
        self.add_interval(day, candidate)
    }

    /// See [`DaySelections::add_interval`].
    pub fn add_interval(&self, day: &str, candidate: Interval) -> Result<Self> {
        Ok(AvailabilityRecord {
            day_selections: self.day_selections.add_interval(day, candidate)?,
            ..self.clone()
        })
    }

    /// See [`DaySelections::remove_interval`].
    pub fn remove_interval(&self, day: &str, index: SlotIndex) -> Result<Self> {
        Ok(AvailabilityRecord {
            day_selections: self.day_selections.remove_interval(day, index)?,
            ..self.clone()
        })
    }

    /// Switch the record to `new_zone`, converting its day selections.
    ///
    /// Either both the zone and the selections change or neither does.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidTimeZone`] if the current or the
    /// new zone cannot be resolved.
    pub fn with_time_zone(&self, new_zone: &str, anchor: OffsetAnchor) -> Result<Self> {
        let day_selections = convert(&self.day_selections, &self.time_zone, new_zone, anchor)?;
        debug!(from = %self.time_zone, to = new_zone, "changed record time zone");
        Ok(AvailabilityRecord {
            time_zone: new_zone.to_string(),
            session_duration_hours: self.session_duration_hours,
            day_selections,
        })
    }

    /// Earliest free instant at or after `now`, reading the day keys in the
    /// record's zone (or the configured default zone).
    pub fn earliest_available(
        &self,
        now: DateTime<Utc>,
        config: &EngineConfig,
    ) -> Option<DateTime<Utc>> {
        let tz = self.resolved_time_zone(config);
        earliest_future_instant_in(&self.day_selections, &tz, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineError;
    use chrono::TimeZone;

    #[test]
    fn test_json_shape() {
        let record = AvailabilityRecord::new("Asia/Shanghai", 1.5)
            .add_interval("2026-03-01", Interval::new(36, 41))
            .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "timeZone": "Asia/Shanghai",
                "sessionDurationHours": 1.5,
                "daySelections": { "2026-03-01": [{ "start": 36, "end": 41 }] }
            })
        );
    }

    #[test]
    fn test_missing_selections_default_to_empty() {
        let record: AvailabilityRecord =
            serde_json::from_str(r#"{"timeZone":"UTC+8","sessionDurationHours":1}"#).unwrap();
        assert!(record.day_selections.is_empty());
    }

    #[test]
    fn test_session_slots() {
        assert_eq!(AvailabilityRecord::new("UTC", 1.0).session_slots(), 4);
        assert_eq!(AvailabilityRecord::new("UTC", 1.25).session_slots(), 5);
        assert_eq!(AvailabilityRecord::new("UTC", 1.1).session_slots(), 5);
        assert_eq!(AvailabilityRecord::new("UTC", 0.0).session_slots(), 1);
        assert_eq!(AvailabilityRecord::new("UTC", f64::NAN).session_slots(), 1);
        assert_eq!(AvailabilityRecord::new("UTC", 40.0).session_slots(), 96);
    }

    #[test]
    fn test_add_session_overflows_midnight() {
        // 75 minutes starting at 23:00 is five inclusive slots, 92..=96, so
        // only 00:00-00:15 spills over. A raw `{92, 97}` add covers six.
        let record = AvailabilityRecord::new("UTC+8", 1.25)
            .add_session("2026-03-01", 92)
            .unwrap();
        let s = &record.day_selections;
        assert_eq!(s.day_blocks("2026-03-01").unwrap(), vec![Interval::new(92, 95)]);
        assert_eq!(s.day_blocks("2026-03-02").unwrap(), vec![Interval::new(0, 0)]);
    }

    #[test]
    fn test_with_time_zone_converts_selections() {
        let record = AvailabilityRecord::new("UTC+8", 1.0)
            .add_interval("2026-03-01", Interval::new(36, 39))
            .unwrap();
        let moved = record.with_time_zone("UTC+0", OffsetAnchor::DayNoon).unwrap();
        assert_eq!(moved.time_zone, "UTC+0");
        assert_eq!(
            moved.day_selections.day_blocks("2026-03-01").unwrap(),
            vec![Interval::new(4, 7)]
        );
    }

    #[test]
    fn test_with_time_zone_all_or_nothing() {
        let record = AvailabilityRecord::new("UTC+8", 1.0)
            .add_interval("2026-03-01", Interval::new(36, 39))
            .unwrap();
        let err = record.with_time_zone("Nowhere", OffsetAnchor::DayNoon).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeZone(_)));
        assert_eq!(record.time_zone, "UTC+8");
    }

    #[test]
    fn test_earliest_available_falls_back_to_default_zone() {
        let record = AvailabilityRecord::new("Somewhere/Else", 1.0)
            .add_interval("2026-03-01", Interval::new(36, 39))
            .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        // Default zone is Asia/Shanghai: 09:00 local is 01:00 UTC.
        assert_eq!(
            record.earliest_available(now, &EngineConfig::default()),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 1, 0, 0).unwrap())
        );
    }
}
