//! Parish duty rosters: recurring monthly rules for musicians and psalmists,
//! per-month overrides, and the date arithmetic that turns one into the other.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod month;
pub mod resolver;
pub mod roster;
pub mod schema;

pub use error::{Result, RosterError};
pub use month::YearMonth;
pub use resolver::{
    Assignment, GeneratedOccurrence, RecurringRule, RuleOverride, generate_occurrences_for_month,
    resolve_occurrence_date,
};
pub use roster::{MonthRoster, RosterData};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

pub fn format_date(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(&format)
        .unwrap_or_else(|_| format!("{}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value.trim(), &format)
        .map_err(|err| RosterError::invalid(format!("expected YYYY-MM-DD, got {value:?}: {err}")))
}

pub fn now_timestamp() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| RosterError::invalid(err.to_string()))
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
