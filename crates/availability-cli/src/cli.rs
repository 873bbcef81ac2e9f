//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// availctl - edit and query tutoring availability records
#[derive(Debug, Parser)]
#[command(name = "availctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to an engine configuration file (JSON)
    #[arg(long, short, env = "AVAILCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output on stderr
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Availability record to read (JSON); stdin when omitted
    #[arg(long, short, global = true)]
    pub input: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mark slots START..=END on DAY as free (END past 95 continues next day)
    Add {
        #[arg(long)]
        day: String,
        #[arg(long)]
        start: u16,
        #[arg(long)]
        end: u16,
    },

    /// Mark one session, sized by sessionDurationHours, starting at START
    AddSession {
        #[arg(long)]
        day: String,
        #[arg(long)]
        start: u16,
    },

    /// Remove the whole free block containing SLOT on DAY
    Remove {
        #[arg(long)]
        day: String,
        #[arg(long)]
        slot: u16,
    },

    /// Print the free blocks stored for DAY
    Blocks {
        #[arg(long)]
        day: String,
    },

    /// Move the record to another timezone, converting its selections
    Convert {
        /// Target timezone (IANA name or UTC±H[:MM])
        #[arg(long)]
        to: String,

        /// Evaluate every offset at this RFC 3339 instant instead of each day's noon
        ///
        /// Without it each day is shifted by the offsets at its own noon (UTC),
        /// so a block moved across a DST change comes back shifted by the DST
        /// amount when converted back. Passing the same --at in both
        /// directions makes the round trip exact.
        #[arg(long)]
        at: Option<String>,
    },

    /// Print the earliest free instant and its start-date bucket
    Earliest {
        /// Reference instant (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<String>,
    },

    /// Check whether the record's timezone lies in a region
    Region {
        #[arg(long)]
        region: String,

        /// Reference instant (RFC 3339); defaults to the current time
        #[arg(long)]
        at: Option<String>,
    },

    /// List the timezones offered by the picker with their current offsets
    Zones {
        /// Reference instant (RFC 3339); defaults to the current time
        #[arg(long)]
        at: Option<String>,
    },
}
