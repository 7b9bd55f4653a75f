use crate::month::YearMonth;
use crate::resolver::{Assignment, RecurringRule, RuleOverride};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    #[default]
    Dominical,
    Semanal,
    Especial,
    Outro,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Dominical => "dominical",
            ScheduleType::Semanal => "semanal",
            ScheduleType::Especial => "especial",
            ScheduleType::Outro => "outro",
        }
    }
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ScheduleType {
    type Err = crate::RosterError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "dominical" => Ok(ScheduleType::Dominical),
            "semanal" => Ok(ScheduleType::Semanal),
            "especial" => Ok(ScheduleType::Especial),
            "outro" => Ok(ScheduleType::Outro),
            _ => Err(crate::RosterError::invalid(format!(
                "unknown schedule type: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Musician {
    pub name: String,
}

/// Musician duty: the Nth weekday of every month from `start_month` on.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecurringSchedule {
    pub id: String,
    pub week_of_month: u8, // 1..=5
    pub day_of_week: u8,   // 0 = Sunday .. 6 = Saturday
    pub time: String,      // "19:30"
    #[serde(rename = "type", default)]
    pub schedule_type: ScheduleType,
    pub community: String,
    #[serde(default)]
    pub musicians: Vec<Musician>,
    pub observations: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[schemars(with = "String")]
    pub start_month: YearMonth,
    #[serde(default)]
    pub created_at: String, // ISO-8601 timestamp (UTC)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecurringSalmistSchedule {
    pub id: String,
    pub week_of_month: u8,
    pub day_of_week: u8,
    pub time: String,
    pub community: String,
    pub psalmist: String,
    pub observations: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[schemars(with = "String")]
    pub start_month: YearMonth,
    #[serde(default)]
    pub created_at: String,
}

/// One-month replacement for a musician duty. The recurring rule is untouched.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScheduleOverride {
    pub id: String,
    pub recurring_schedule_id: String,
    #[schemars(with = "String")]
    pub specific_month: YearMonth,
    pub date: String, // "YYYY-MM-DD"
    pub time: String,
    #[serde(rename = "type", default)]
    pub schedule_type: ScheduleType,
    pub community: String,
    #[serde(default)]
    pub musicians: Vec<Musician>,
    pub observations: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SalmistScheduleOverride {
    pub id: String,
    pub recurring_salmist_schedule_id: String,
    #[schemars(with = "String")]
    pub specific_month: YearMonth,
    pub date: String,
    pub time: String,
    pub community: String,
    pub psalmist: String,
    pub observations: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

fn default_active() -> bool {
    true
}

pub fn musician_names(musicians: &[Musician]) -> String {
    musicians
        .iter()
        .map(|m| m.name.trim())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Assignment for RecurringSchedule {
    fn time(&self) -> &str {
        &self.time
    }
    fn community(&self) -> &str {
        &self.community
    }
    fn observations(&self) -> Option<&str> {
        self.observations.as_deref()
    }
    fn people(&self) -> String {
        musician_names(&self.musicians)
    }
}

impl RecurringRule for RecurringSchedule {
    fn id(&self) -> &str {
        &self.id
    }
    fn week_of_month(&self) -> u8 {
        self.week_of_month
    }
    fn day_of_week(&self) -> u8 {
        self.day_of_week
    }
    fn start_month(&self) -> YearMonth {
        self.start_month
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Assignment for ScheduleOverride {
    fn time(&self) -> &str {
        &self.time
    }
    fn community(&self) -> &str {
        &self.community
    }
    fn observations(&self) -> Option<&str> {
        self.observations.as_deref()
    }
    fn people(&self) -> String {
        musician_names(&self.musicians)
    }
}

impl RuleOverride for ScheduleOverride {
    fn rule_id(&self) -> &str {
        &self.recurring_schedule_id
    }
    fn specific_month(&self) -> YearMonth {
        self.specific_month
    }
}

impl Assignment for RecurringSalmistSchedule {
    fn time(&self) -> &str {
        &self.time
    }
    fn community(&self) -> &str {
        &self.community
    }
    fn observations(&self) -> Option<&str> {
        self.observations.as_deref()
    }
    fn people(&self) -> String {
        self.psalmist.clone()
    }
}

impl RecurringRule for RecurringSalmistSchedule {
    fn id(&self) -> &str {
        &self.id
    }
    fn week_of_month(&self) -> u8 {
        self.week_of_month
    }
    fn day_of_week(&self) -> u8 {
        self.day_of_week
    }
    fn start_month(&self) -> YearMonth {
        self.start_month
    }
    fn is_active(&self) -> bool {
        self.is_active
    }
}

impl Assignment for SalmistScheduleOverride {
    fn time(&self) -> &str {
        &self.time
    }
    fn community(&self) -> &str {
        &self.community
    }
    fn observations(&self) -> Option<&str> {
        self.observations.as_deref()
    }
    fn people(&self) -> String {
        self.psalmist.clone()
    }
}

impl RuleOverride for SalmistScheduleOverride {
    fn rule_id(&self) -> &str {
        &self.recurring_salmist_schedule_id
    }
    fn specific_month(&self) -> YearMonth {
        self.specific_month
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_type_round_trips_through_str() {
        for ty in [
            ScheduleType::Dominical,
            ScheduleType::Semanal,
            ScheduleType::Especial,
            ScheduleType::Outro,
        ] {
            assert_eq!(ty.as_str().parse::<ScheduleType>().unwrap(), ty);
        }
        assert!("weekly".parse::<ScheduleType>().is_err());
    }

    #[test]
    fn recurring_schedule_defaults_when_deserializing() {
        let json = r#"{
            "id": "r1",
            "week_of_month": 2,
            "day_of_week": 0,
            "time": "09:00",
            "community": "Matriz",
            "observations": null,
            "start_month": "2025-01"
        }"#;
        let rule: RecurringSchedule = serde_json::from_str(json).unwrap();
        assert!(rule.is_active);
        assert_eq!(rule.schedule_type, ScheduleType::Dominical);
        assert!(rule.musicians.is_empty());
        assert_eq!(rule.start_month.to_string(), "2025-01");
    }

    #[test]
    fn musician_names_skips_blank_entries() {
        let musicians = vec![
            Musician { name: "Ana".into() },
            Musician { name: "  ".into() },
            Musician { name: "Bruno ".into() },
        ];
        assert_eq!(musician_names(&musicians), "Ana, Bruno");
    }
}
