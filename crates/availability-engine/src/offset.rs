//! Timezone identifiers and their UTC offsets.
//!
//! Two kinds of identifier are accepted uniformly:
//!
//! - fixed labels `UTC±H` / `UTC±H:MM`, optionally followed by a display
//!   suffix such as `"UTC+8 (Shanghai)"`; the offset is constant all year.
//! - IANA names such as `"America/New_York"`; the offset depends on the
//!   instant it is evaluated at, so it is always resolved per reference
//!   instant and never cached.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{EngineError, Result};

/// Largest magnitude accepted for a fixed label, in hours.
const MAX_FIXED_HOURS: i32 = 14;

/// A parsed timezone identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZoneId {
    /// A constant offset in minutes east of UTC.
    Fixed { minutes: i32 },
    /// An IANA zone with DST rules.
    Iana(Tz),
}

impl TimeZoneId {
    pub const UTC: TimeZoneId = TimeZoneId::Fixed { minutes: 0 };

    /// Parse a fixed label or an IANA name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTimeZone`] when the identifier is neither.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(minutes) = parse_fixed_label(s) {
            return Ok(TimeZoneId::Fixed { minutes });
        }
        s.parse::<Tz>()
            .map(TimeZoneId::Iana)
            .map_err(|_| EngineError::InvalidTimeZone(format!("'{}'", s)))
    }

    /// Parse `s`, falling back to `default` (then UTC) when it cannot be resolved.
    pub fn parse_or_default(s: &str, default: &str) -> Self {
        match Self::parse(s) {
            Ok(tz) => tz,
            Err(err) => {
                warn!(time_zone = s, fallback = default, %err, "falling back to default time zone");
                Self::parse(default).unwrap_or(Self::UTC)
            }
        }
    }

    /// Minutes east of UTC in effect at `at`.
    pub fn offset_minutes(&self, at: DateTime<Utc>) -> i32 {
        match self {
            TimeZoneId::Fixed { minutes } => *minutes,
            TimeZoneId::Iana(tz) => at.with_timezone(tz).offset().fix().local_minus_utc() / 60,
        }
    }

    /// The instant at which the wall clock in this zone reads `local`.
    ///
    /// Ambiguous wall-clock times (fall back) resolve to the earlier instant.
    /// Skipped ones (spring forward) are read with the offset in effect before
    /// the transition, which lands them just after it.
    pub fn local_to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self {
            TimeZoneId::Fixed { minutes } => {
                local.and_utc() - Duration::minutes(i64::from(*minutes))
            }
            TimeZoneId::Iana(tz) => match tz.from_local_datetime(&local) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
                LocalResult::None => {
                    let before = self.offset_minutes(local.and_utc() - Duration::days(1));
                    local.and_utc() - Duration::minutes(i64::from(before))
                }
            },
        }
    }

    /// `"UTC±HH:MM"` for the offset in effect at `at`.
    pub fn offset_label(&self, at: DateTime<Utc>) -> String {
        format_offset(self.offset_minutes(at))
    }

    /// Whether `at` falls in daylight saving time for this zone.
    ///
    /// Fixed labels never observe DST.
    pub fn is_dst_active(&self, at: DateTime<Utc>) -> bool {
        let TimeZoneId::Iana(tz) = self else {
            return false;
        };
        // Compare against the January offset of the same year; southern
        // hemisphere zones are in DST in January, so also check July.
        let jan = Utc
            .with_ymd_and_hms(at.year(), 1, 1, 12, 0, 0)
            .single()
            .unwrap_or(at);
        let jul = Utc
            .with_ymd_and_hms(at.year(), 7, 1, 12, 0, 0)
            .single()
            .unwrap_or(at);
        let standard = jan
            .with_timezone(tz)
            .offset()
            .fix()
            .local_minus_utc()
            .min(jul.with_timezone(tz).offset().fix().local_minus_utc());
        at.with_timezone(tz).offset().fix().local_minus_utc() != standard
    }
}

impl FromStr for TimeZoneId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TimeZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeZoneId::Fixed { minutes } => f.write_str(&format_offset(*minutes)),
            TimeZoneId::Iana(tz) => f.write_str(tz.name()),
        }
    }
}

/// Offset of `time_zone` at `at`, in minutes east of UTC.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimeZone`] if `time_zone` cannot be resolved.
///
/// # Examples
///
/// ```
/// use availability_engine::offset::offset_minutes;
/// use chrono::{TimeZone, Utc};
///
/// let jan = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
/// assert_eq!(offset_minutes("America/New_York", jan).unwrap(), -300);
/// assert_eq!(offset_minutes("UTC+5:30", jan).unwrap(), 330);
/// ```
pub fn offset_minutes(time_zone: &str, at: DateTime<Utc>) -> Result<i32> {
    Ok(TimeZoneId::parse(time_zone)?.offset_minutes(at))
}

/// Parse `UTC±H[:MM]` with an optional trailing display suffix.
fn parse_fixed_label(s: &str) -> Option<i32> {
    let rest = s.strip_prefix("UTC")?;
    let (sign, rest) = match rest.as_bytes().first() {
        Some(b'+') => (1, &rest[1..]),
        Some(b'-') => (-1, &rest[1..]),
        _ => return None,
    };

    let hour_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if hour_len == 0 || hour_len > 2 {
        return None;
    }
    let hours: i32 = rest[..hour_len].parse().ok()?;
    let mut rest = &rest[hour_len..];

    let mut minutes = 0;
    if let Some(after_colon) = rest.strip_prefix(':') {
        let min_len = after_colon.bytes().take_while(u8::is_ascii_digit).count();
        if min_len != 2 {
            return None;
        }
        minutes = after_colon[..2].parse().ok()?;
        rest = &after_colon[2..];
    }

    // Anything after the offset must be a separate display suffix.
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace) || rest.starts_with('(')) {
        return None;
    }
    if hours > MAX_FIXED_HOURS || minutes >= 60 {
        return None;
    }

    Some(sign * (hours * 60 + minutes))
}

/// Format minutes east of UTC as `"UTC+08:00"`.
fn format_offset(minutes: i32) -> String {
    let sign = if minutes >= 0 { "+" } else { "-" };
    let abs = minutes.unsigned_abs();
    format!("UTC{sign}{:02}:{:02}", abs / 60, abs % 60)
}
