//! Expansion of recurring "Nth weekday of the month" rules into concrete dates.
//!
//! Everything here is pure: rules and overrides are fetched by the caller,
//! and nothing is persisted or cached.

use crate::error::{Result, RosterError};
use crate::month::YearMonth;
use serde::{Serialize, Serializer};
use time::{Date, Duration};
use tracing::debug;

/// Descriptive payload shared by rules and their overrides.
pub trait Assignment {
    fn time(&self) -> &str;
    fn community(&self) -> &str;
    fn observations(&self) -> Option<&str>;
    /// Who serves, as display text.
    fn people(&self) -> String;
}

pub trait RecurringRule: Assignment {
    fn id(&self) -> &str;
    fn week_of_month(&self) -> u8;
    fn day_of_week(&self) -> u8;
    fn start_month(&self) -> YearMonth;
    fn is_active(&self) -> bool;
}

pub trait RuleOverride: Assignment {
    fn rule_id(&self) -> &str;
    fn specific_month(&self) -> YearMonth;
}

/// A rule applied to one month. Borrowed from the inputs, never stored.
#[derive(Debug, Serialize)]
pub struct GeneratedOccurrence<'a, R, O> {
    pub rule: &'a R,
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    #[serde(rename = "override")]
    pub override_entry: Option<&'a O>,
    pub is_override: bool,
}

impl<R, O> Clone for GeneratedOccurrence<'_, R, O> {
    fn clone(&self) -> Self {
        Self {
            rule: self.rule,
            date: self.date,
            override_entry: self.override_entry,
            is_override: self.is_override,
        }
    }
}

impl<R: RecurringRule, O: RuleOverride> GeneratedOccurrence<'_, R, O> {
    /// The details in effect this month: the override's when present.
    pub fn assignment(&self) -> &dyn Assignment {
        match self.override_entry {
            Some(o) => o,
            None => self.rule,
        }
    }
}

pub fn validate_week_of_month(week_of_month: u8) -> Result<()> {
    if (1..=5).contains(&week_of_month) {
        Ok(())
    } else {
        Err(RosterError::invalid(format!(
            "week_of_month must be between 1 and 5, got {week_of_month}"
        )))
    }
}

pub fn validate_day_of_week(day_of_week: u8) -> Result<()> {
    if day_of_week <= 6 {
        Ok(())
    } else {
        Err(RosterError::invalid(format!(
            "day_of_week must be between 0 (Sunday) and 6 (Saturday), got {day_of_week}"
        )))
    }
}

/// Date of the `week_of_month`-th `day_of_week` in the given month.
///
/// `day_of_week` counts from Sunday = 0. Returns `Ok(None)` when the month has
/// fewer than `week_of_month` such weekdays (a fifth Sunday in a four-Sunday
/// month); that is an ordinary outcome, not an error. Out-of-range arguments
/// are rejected with [`RosterError::InvalidInput`].
///
/// `year` is limited to 0..=9999, the range [`YearMonth`] can write as
/// `YYYY-MM`, which is narrower than what [`time::Date`] accepts.
pub fn resolve_occurrence_date(
    year: i32,
    month: u8,
    week_of_month: u8,
    day_of_week: u8,
) -> Result<Option<Date>> {
    validate_week_of_month(week_of_month)?;
    validate_day_of_week(day_of_week)?;
    let target = YearMonth::new(year, month)?;
    let first = target.first_day()?;

    let first_day_of_week = first.weekday().number_days_from_sunday();
    let offset = (day_of_week + 7 - first_day_of_week) % 7;
    let total_offset = i64::from(offset) + i64::from(week_of_month - 1) * 7;

    let candidate = first
        .checked_add(Duration::days(total_offset))
        .ok_or_else(|| RosterError::invalid(format!("{target}: date out of range")))?;

    if candidate.month() != first.month() {
        return Ok(None);
    }
    Ok(Some(candidate))
}

/// Applies every rule to `year`/`month` and pairs each hit with its override.
///
/// Inactive rules, rules starting after the target month and rules whose
/// weekday does not occur often enough that month produce nothing. When more
/// than one override matches a rule, the first in `overrides` wins. Output
/// follows the order of `rules`; sorting by date is left to the caller.
pub fn generate_occurrences_for_month<'a, R, O>(
    rules: &'a [R],
    overrides: &'a [O],
    year: i32,
    month: u8,
) -> Result<Vec<GeneratedOccurrence<'a, R, O>>>
where
    R: RecurringRule,
    O: RuleOverride,
{
    let target = YearMonth::new(year, month)?;
    let mut occurrences = Vec::new();

    for rule in rules {
        if !rule.is_active() {
            continue;
        }
        if rule.start_month() > target {
            continue;
        }

        let Some(date) =
            resolve_occurrence_date(year, month, rule.week_of_month(), rule.day_of_week())?
        else {
            debug!(rule_id = rule.id(), month = %target, "rule has no occurrence this month");
            continue;
        };

        let mut matching = overrides
            .iter()
            .filter(|o| o.rule_id() == rule.id() && o.specific_month() == target);
        let override_entry = matching.next();
        if matching.next().is_some() {
            debug!(rule_id = rule.id(), month = %target, "duplicate overrides, using the first");
        }

        occurrences.push(GeneratedOccurrence {
            rule,
            date,
            override_entry,
            is_override: override_entry.is_some(),
        });
    }

    Ok(occurrences)
}

pub(crate) fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::format_date(*date))
}
