use crate::db;
use crate::error::Result;
use crate::schema::{
    RecurringSalmistSchedule, RecurringSchedule, SalmistScheduleOverride, ScheduleOverride,
};
use rusqlite::Connection;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Bulk roster data, as written in a YAML seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RosterSeed {
    pub recurring_schedules: Vec<RecurringSchedule>,
    pub schedule_overrides: Vec<ScheduleOverride>,
    pub salmist_schedules: Vec<RecurringSalmistSchedule>,
    pub salmist_overrides: Vec<SalmistScheduleOverride>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub recurring_schedules: usize,
    pub schedule_overrides: usize,
    pub salmist_schedules: usize,
    pub salmist_overrides: usize,
}

impl RosterSeed {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }
}

/// Writes the whole seed in one transaction; any invalid record aborts it.
pub fn import_seed(conn: &mut Connection, seed: &RosterSeed) -> Result<ImportSummary> {
    let tx = conn.transaction()?;

    for rule in &seed.recurring_schedules {
        db::insert_recurring_schedule(&tx, rule)?;
    }
    for entry in &seed.schedule_overrides {
        db::insert_schedule_override(&tx, entry)?;
    }
    for rule in &seed.salmist_schedules {
        db::insert_salmist_schedule(&tx, rule)?;
    }
    for entry in &seed.salmist_overrides {
        db::insert_salmist_override(&tx, entry)?;
    }

    tx.commit()?;

    let summary = ImportSummary {
        recurring_schedules: seed.recurring_schedules.len(),
        schedule_overrides: seed.schedule_overrides.len(),
        salmist_schedules: seed.salmist_schedules.len(),
        salmist_overrides: seed.salmist_overrides.len(),
    };
    info!(?summary, "roster seed imported");
    Ok(summary)
}
