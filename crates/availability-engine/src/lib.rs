//! # availability-engine
//!
//! Quarter-hour free-time model behind a tutoring marketplace's scheduling.
//!
//! Users mark free time on a per-day grid of 96 slots, in the timezone they
//! have chosen to display. The engine keeps those selections minimal and
//! correct when a session crosses midnight, when the user switches timezone
//! (including DST-observing ones), and when listings are filtered by how
//! soon a tutor can start or which region they are in.
//!
//! Every operation is a pure function of its inputs. Nothing reads the
//! system clock; callers pass the reference instant.
//!
//! ## Modules
//!
//! - [`slot`] — The 96-slot day grid and index ↔ time-of-day conversions
//! - [`offset`] — Fixed-label and IANA timezone identifiers, DST-aware offsets
//! - [`store`] — Day-selection store: merging, midnight overflow, block removal
//! - [`convert`] — Re-express a whole store in another timezone
//! - [`query`] — Earliest free instant, start-date buckets, region filters, ranking
//! - [`record`] — The persisted per-user availability record
//! - [`config`] — Region table, bucket edges, supported zones, default zone
//! - [`error`] — Error types

pub mod config;
pub mod convert;
pub mod error;
pub mod offset;
pub mod query;
pub mod record;
pub mod slot;
pub mod store;

pub use config::{BucketEdges, EngineConfig, OffsetRange, RegionTable, ZoneOption};
pub use convert::{convert, convert_between, OffsetAnchor};
pub use error::{EngineError, Result};
pub use offset::{offset_minutes, TimeZoneId};
pub use query::{
    bucketize, bucketize_with, earliest_future_instant, earliest_future_instant_in,
    filter_by_start, rank_by_earliest, region_matches, region_matches_in, RankedListing,
    StartBucket, StartFilter,
};
pub use record::AvailabilityRecord;
pub use slot::SlotIndex;
pub use store::{merge_intervals, DayKey, DaySelections, Interval};
