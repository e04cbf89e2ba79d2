// Parliamentary Records - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod dates;
pub mod table;
pub mod filter;     // Interval filter + cross filter
pub mod combine;    // Party membership span combining
pub mod elections;  // General elections calendar + dissolution adjustment
pub mod config;
pub mod queries;
pub mod sparql;
pub mod pipeline;

// Re-export commonly used types
pub use error::{Error, Result};
pub use table::{readable, Table, Value};
pub use filter::{
    filter_dates, filter_memberships,
    DateRange, Interval, MembershipColumns,
};
pub use combine::{
    combine_party_membership_table, combine_party_memberships,
    PartyMembership, MergedPartyMembership,
};
pub use elections::{
    adjust_end_dates, calendar_from_table, general_elections, general_elections_map,
    ElectionCalendar, ElectionDates, GeneralElection,
};
pub use config::Settings;
pub use queries::{Category, House};
pub use sparql::{RawSource, SparqlClient};
pub use pipeline::{Pipeline, QueryOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
