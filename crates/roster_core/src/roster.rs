use crate::error::Result;
use crate::month::YearMonth;
use crate::resolver::{GeneratedOccurrence, RecurringRule, RuleOverride, generate_occurrences_for_month};
use crate::schema::{
    RecurringSalmistSchedule, RecurringSchedule, SalmistScheduleOverride, ScheduleOverride,
};
use serde::Serialize;

pub type MusicianOccurrence<'a> = GeneratedOccurrence<'a, RecurringSchedule, ScheduleOverride>;
pub type SalmistOccurrence<'a> =
    GeneratedOccurrence<'a, RecurringSalmistSchedule, SalmistScheduleOverride>;

/// Rules and the overrides of one month, as fetched from the store.
#[derive(Debug, Clone, Default)]
pub struct RosterData {
    pub recurring_schedules: Vec<RecurringSchedule>,
    pub schedule_overrides: Vec<ScheduleOverride>,
    pub salmist_schedules: Vec<RecurringSalmistSchedule>,
    pub salmist_overrides: Vec<SalmistScheduleOverride>,
}

#[derive(Debug, Serialize)]
pub struct MonthRoster<'a> {
    pub month: YearMonth,
    pub musicians: Vec<MusicianOccurrence<'a>>,
    pub psalmists: Vec<SalmistOccurrence<'a>>,
}

impl<'a> MonthRoster<'a> {
    /// Generates both rosters for `month`, sorted by date and optionally
    /// narrowed to one community.
    pub fn build(month: YearMonth, data: &'a RosterData, community: Option<&str>) -> Result<Self> {
        let mut musicians = generate_occurrences_for_month(
            &data.recurring_schedules,
            &data.schedule_overrides,
            month.year(),
            month.month(),
        )?;
        let mut psalmists = generate_occurrences_for_month(
            &data.salmist_schedules,
            &data.salmist_overrides,
            month.year(),
            month.month(),
        )?;

        sort_by_date(&mut musicians);
        sort_by_date(&mut psalmists);
        filter_by_community(&mut musicians, community);
        filter_by_community(&mut psalmists, community);

        Ok(Self {
            month,
            musicians,
            psalmists,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.musicians.is_empty() && self.psalmists.is_empty()
    }
}

/// Stable ascending sort; same-day entries keep their rule order.
pub fn sort_by_date<R, O>(occurrences: &mut [GeneratedOccurrence<'_, R, O>]) {
    occurrences.sort_by_key(|o| o.date);
}

/// Keeps occurrences whose effective community matches. `None` and `"all"`
/// keep everything.
pub fn filter_by_community<R, O>(
    occurrences: &mut Vec<GeneratedOccurrence<'_, R, O>>,
    community: Option<&str>,
) where
    R: RecurringRule,
    O: RuleOverride,
{
    let Some(community) = community.filter(|c| *c != "all") else {
        return;
    };
    occurrences.retain(|o| o.assignment().community() == community);
}

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn weekday_label(day_of_week: u8) -> &'static str {
    WEEKDAY_NAMES
        .get(usize::from(day_of_week))
        .copied()
        .unwrap_or("?")
}

pub fn week_label(week_of_month: u8) -> &'static str {
    match week_of_month {
        1 => "1st",
        2 => "2nd",
        3 => "3rd",
        4 => "4th",
        5 => "5th",
        _ => "?",
    }
}

/// "2nd Sunday" style description of a rule.
pub fn rule_label<R: RecurringRule>(rule: &R) -> String {
    format!(
        "{} {}",
        week_label(rule.week_of_month()),
        weekday_label(rule.day_of_week())
    )
}
