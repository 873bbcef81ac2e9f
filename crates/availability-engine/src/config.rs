//! Hand-tuned tables the engine consults: the fallback zone, region offset
//! ranges, start-date bucket edges and the zones offered by the picker.
//!
//! [`EngineConfig::default`] carries the built-in values. A JSON file may
//! override any subset of fields; absent fields keep their defaults.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::offset::TimeZoneId;

/// Inclusive range of UTC offsets, in hours (e.g. `7.5..=8.5`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub min: f64,
    pub max: f64,
}

impl OffsetRange {
    pub const fn new(min: f64, max: f64) -> Self {
        OffsetRange { min, max }
    }

    pub fn contains_hours(&self, hours: f64) -> bool {
        self.min <= hours && hours <= self.max
    }
}

/// Region id → accepted offset ranges, plus the ids that mean "anywhere".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionTable {
    pub ranges: BTreeMap<String, Vec<OffsetRange>>,
    pub no_preference: Vec<String>,
}

impl Default for RegionTable {
    fn default() -> Self {
        let ranges = [
            ("中国", vec![OffsetRange::new(7.5, 8.5)]),
            ("日韩", vec![OffsetRange::new(8.5, 9.5)]),
            ("东南亚", vec![OffsetRange::new(6.5, 8.0)]),
            ("澳洲", vec![OffsetRange::new(8.0, 11.0)]),
            ("新西兰", vec![OffsetRange::new(12.0, 13.0)]),
            ("英国", vec![OffsetRange::new(0.0, 1.0)]),
            ("欧洲", vec![OffsetRange::new(-1.0, 3.0)]),
            ("北美", vec![OffsetRange::new(-10.0, -2.5)]),
            ("美东", vec![OffsetRange::new(-5.0, -4.0)]),
            ("美西", vec![OffsetRange::new(-8.0, -7.0)]),
        ]
        .into_iter()
        .map(|(id, ranges)| (id.to_string(), ranges))
        .collect();

        RegionTable {
            ranges,
            no_preference: vec!["随便看看".to_string(), "no preference".to_string()],
        }
    }
}

impl RegionTable {
    pub fn is_no_preference(&self, region_id: &str) -> bool {
        self.no_preference.iter().any(|id| id == region_id)
    }

    pub fn ranges_for(&self, region_id: &str) -> Option<&[OffsetRange]> {
        self.ranges.get(region_id).map(Vec::as_slice)
    }
}

/// Day counts separating the start-date filter buckets.
///
/// A gap of `d` days falls in the first bucket when `d < within_one`, the
/// second when `d < within_few`, the third when `d <= within_week`, and the
/// last otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketEdges {
    pub within_one: f64,
    pub within_few: f64,
    pub within_week: f64,
}

impl Default for BucketEdges {
    fn default() -> Self {
        BucketEdges {
            within_one: 1.0,
            within_few: 3.0,
            within_week: 7.0,
        }
    }
}

const DEFAULT_SUPPORTED_ZONES: &[&str] = &[
    "Asia/Shanghai",
    "Asia/Hong_Kong",
    "Asia/Taipei",
    "Asia/Tokyo",
    "Asia/Seoul",
    "Asia/Singapore",
    "Australia/Perth",
    "Australia/Sydney",
    "Pacific/Auckland",
    "Europe/London",
    "Europe/Paris",
    "Europe/Berlin",
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "America/Toronto",
    "America/Vancouver",
    "UTC",
];

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Zone used whenever a stored or requested zone cannot be resolved.
    pub default_time_zone: String,
    pub regions: RegionTable,
    pub buckets: BucketEdges,
    /// IANA names offered by the timezone picker, in display order.
    pub supported_zones: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_time_zone: "Asia/Shanghai".to_string(),
            regions: RegionTable::default(),
            buckets: BucketEdges::default(),
            supported_zones: DEFAULT_SUPPORTED_ZONES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A picker entry: zone name plus its offset at the reference instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneOption {
    pub id: String,
    /// e.g. `"(UTC-04:00) America/New_York"`.
    pub label: String,
    pub offset_minutes: i32,
    pub dst_active: bool,
}

impl EngineConfig {
    /// Parse a JSON config and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for malformed JSON or any value
    /// rejected by [`EngineConfig::validate`].
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(s).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Check that every zone resolves and every range and edge is ordered.
    pub fn validate(&self) -> Result<()> {
        TimeZoneId::parse(&self.default_time_zone).map_err(|_| {
            EngineError::InvalidConfig(format!(
                "default_time_zone '{}' is not a valid zone",
                self.default_time_zone
            ))
        })?;

        for zone in &self.supported_zones {
            if !matches!(TimeZoneId::parse(zone), Ok(TimeZoneId::Iana(_))) {
                return Err(EngineError::InvalidConfig(format!(
                    "supported zone '{zone}' is not an IANA zone"
                )));
            }
        }

        for (region, ranges) in &self.regions.ranges {
            if let Some(bad) = ranges.iter().find(|r| r.min > r.max) {
                return Err(EngineError::InvalidConfig(format!(
                    "region '{region}' has inverted range {}..{}",
                    bad.min, bad.max
                )));
            }
        }

        let b = &self.buckets;
        if !(0.0 < b.within_one && b.within_one <= b.within_few && b.within_few <= b.within_week) {
            return Err(EngineError::InvalidConfig(format!(
                "bucket edges must be positive and ascending, got {}/{}/{}",
                b.within_one, b.within_few, b.within_week
            )));
        }

        Ok(())
    }

    /// The fallback zone, resolved. Falls back to UTC if even that is broken.
    pub fn default_zone(&self) -> TimeZoneId {
        TimeZoneId::parse(&self.default_time_zone).unwrap_or(TimeZoneId::UTC)
    }

    /// Picker entries for every supported zone, labelled with the offset in
    /// effect at `at`. Zones that fail to resolve are skipped.
    pub fn zone_options(&self, at: DateTime<Utc>) -> Vec<ZoneOption> {
        self.supported_zones
            .iter()
            .filter_map(|id| {
                let tz = TimeZoneId::parse(id).ok()?;
                Some(ZoneOption {
                    id: id.clone(),
                    label: format!("({}) {}", tz.offset_label(at), id),
                    offset_minutes: tz.offset_minutes(at),
                    dst_active: tz.is_dst_active(at),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"default_time_zone": "Europe/London"}"#).unwrap();
        assert_eq!(config.default_time_zone, "Europe/London");
        assert_eq!(config.buckets, BucketEdges::default());
        assert!(config.regions.ranges.contains_key("中国"));
    }

    #[test]
    fn test_override_bucket_edges() {
        let config =
            EngineConfig::from_json_str(r#"{"buckets": {"within_few": 2.0}}"#).unwrap();
        assert_eq!(config.buckets.within_one, 1.0);
        assert_eq!(config.buckets.within_few, 2.0);
        assert_eq!(config.buckets.within_week, 7.0);
    }

    #[test]
    fn test_rejects_bad_default_zone() {
        let err = EngineConfig::from_json_str(r#"{"default_time_zone": "Atlantis"}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_fixed_label_in_supported_zones() {
        let err =
            EngineConfig::from_json_str(r#"{"supported_zones": ["UTC+8"]}"#).unwrap_err();
        assert!(err.to_string().contains("not an IANA zone"), "got: {err}");
    }

    #[test]
    fn test_rejects_inverted_range() {
        let json = r#"{"regions": {"ranges": {"x": [{"min": 3.0, "max": 1.0}]}}}"#;
        assert!(EngineConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_rejects_unordered_buckets() {
        let json = r#"{"buckets": {"within_one": 5.0, "within_few": 3.0, "within_week": 7.0}}"#;
        assert!(EngineConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_from_path_reads_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"supported_zones": ["Asia/Tokyo", "Europe/Paris"]}}"#).unwrap();
        let config = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.supported_zones, vec!["Asia/Tokyo", "Europe/Paris"]);
        assert_eq!(config.default_time_zone, "Asia/Shanghai");
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = EngineConfig::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("here.json"), "got: {err}");
    }

    #[test]
    fn test_zone_options_dst_labels() {
        let july = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
        let jan = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let config = EngineConfig::default();

        let summer = config.zone_options(july);
        let ny = summer.iter().find(|o| o.id == "America/New_York").unwrap();
        assert_eq!(ny.label, "(UTC-04:00) America/New_York");
        assert_eq!(ny.offset_minutes, -240);
        assert!(ny.dst_active);

        let winter = config.zone_options(jan);
        let ny = winter.iter().find(|o| o.id == "America/New_York").unwrap();
        assert_eq!(ny.label, "(UTC-05:00) America/New_York");
        assert!(!ny.dst_active);

        assert_eq!(summer.len(), config.supported_zones.len());
    }

    #[test]
    fn test_region_lookup() {
        let table = RegionTable::default();
        assert!(table.is_no_preference("随便看看"));
        assert!(!table.is_no_preference("中国"));
        assert_eq!(table.ranges_for("中国").unwrap(), &[OffsetRange::new(7.5, 8.5)]);
        assert!(table.ranges_for("火星").is_none());
    }
}
