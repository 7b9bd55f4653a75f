use crate::error::{Result, RosterError};
use crate::month::YearMonth;
use crate::resolver::{validate_day_of_week, validate_week_of_month};
use crate::roster::RosterData;
use crate::schema::{
    Musician, RecurringSalmistSchedule, RecurringSchedule, SalmistScheduleOverride,
    ScheduleOverride, ScheduleType,
};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use tracing::{debug, info};

pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&conn)?;
    debug!(db_path, "database ready");
    Ok(conn)
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS recurring_schedules (
          id TEXT PRIMARY KEY,
          week_of_month INTEGER NOT NULL,
          day_of_week INTEGER NOT NULL,
          time TEXT NOT NULL,
          type TEXT NOT NULL DEFAULT 'dominical',
          community TEXT NOT NULL,
          musicians_json TEXT NOT NULL DEFAULT '[]',
          observations TEXT,
          is_active INTEGER DEFAULT 1,
          start_month TEXT NOT NULL,
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE TABLE IF NOT EXISTS schedule_overrides (
          id TEXT PRIMARY KEY,
          recurring_schedule_id TEXT NOT NULL
            REFERENCES recurring_schedules(id) ON DELETE CASCADE,
          specific_month TEXT NOT NULL,
          date TEXT NOT NULL,
          time TEXT NOT NULL,
          type TEXT NOT NULL DEFAULT 'dominical',
          community TEXT NOT NULL,
          musicians_json TEXT NOT NULL DEFAULT '[]',
          observations TEXT,
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE TABLE IF NOT EXISTS recurring_salmist_schedules (
          id TEXT PRIMARY KEY,
          week_of_month INTEGER NOT NULL,
          day_of_week INTEGER NOT NULL,
          time TEXT NOT NULL,
          community TEXT NOT NULL,
          psalmist TEXT NOT NULL,
          observations TEXT,
          is_active INTEGER DEFAULT 1,
          start_month TEXT NOT NULL,
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE TABLE IF NOT EXISTS salmist_schedule_overrides (
          id TEXT PRIMARY KEY,
          recurring_salmist_schedule_id TEXT NOT NULL
            REFERENCES recurring_salmist_schedules(id) ON DELETE CASCADE,
          specific_month TEXT NOT NULL,
          date TEXT NOT NULL,
          time TEXT NOT NULL,
          community TEXT NOT NULL,
          psalmist TEXT NOT NULL,
          observations TEXT,
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_schedule_overrides_month
          ON schedule_overrides(specific_month);
        CREATE INDEX IF NOT EXISTS idx_salmist_schedule_overrides_month
          ON salmist_schedule_overrides(specific_month);

        -- rows written before is_active had a default
        UPDATE recurring_schedules SET is_active = 1 WHERE is_active IS NULL;
        UPDATE recurring_salmist_schedules SET is_active = 1 WHERE is_active IS NULL;
        "#,
    )?;
    Ok(())
}

impl ToSql for YearMonth {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for YearMonth {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for ScheduleType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ScheduleType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

fn musicians_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<Musician>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn validate_rule(week_of_month: u8, day_of_week: u8) -> Result<()> {
    validate_week_of_month(week_of_month)?;
    validate_day_of_week(day_of_week)
}

fn validate_override_date(date: &str, specific_month: YearMonth) -> Result<()> {
    let parsed = crate::parse_date(date)?;
    if YearMonth::from_date(parsed)? != specific_month {
        return Err(RosterError::invalid(format!(
            "override date {date} is outside {specific_month}"
        )));
    }
    Ok(())
}

fn expect_changed(changed: usize, what: &str, id: &str) -> Result<()> {
    if changed == 0 {
        return Err(RosterError::NotFound(format!("{what} {id}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Musician rules

const RECURRING_SCHEDULE_COLUMNS: &str = "id, week_of_month, day_of_week, time, type, community, \
     musicians_json, observations, is_active, start_month, created_at";

fn recurring_schedule_from_row(row: &Row<'_>) -> rusqlite::Result<RecurringSchedule> {
    Ok(RecurringSchedule {
        id: row.get(0)?,
        week_of_month: row.get(1)?,
        day_of_week: row.get(2)?,
        time: row.get(3)?,
        schedule_type: row.get(4)?,
        community: row.get(5)?,
        musicians: musicians_column(row, 6)?,
        observations: row.get(7)?,
        is_active: row.get::<_, Option<bool>>(8)?.unwrap_or(true),
        start_month: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn insert_recurring_schedule(conn: &Connection, rule: &RecurringSchedule) -> Result<()> {
    validate_rule(rule.week_of_month, rule.day_of_week)?;
    let musicians_json = serde_json::to_string(&rule.musicians)?;
    let created_at = non_empty_or_now(&rule.created_at)?;

    conn.execute(
        r#"
        INSERT INTO recurring_schedules (
          id, week_of_month, day_of_week, time, type, community,
          musicians_json, observations, is_active, start_month, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            rule.id,
            rule.week_of_month,
            rule.day_of_week,
            rule.time,
            rule.schedule_type,
            rule.community,
            musicians_json,
            rule.observations,
            rule.is_active,
            rule.start_month,
            created_at
        ],
    )?;
    info!(id = %rule.id, community = %rule.community, "recurring schedule created");
    Ok(())
}

/// Overwrites every editable field in place.
pub fn update_recurring_schedule(conn: &Connection, rule: &RecurringSchedule) -> Result<()> {
    validate_rule(rule.week_of_month, rule.day_of_week)?;
    let musicians_json = serde_json::to_string(&rule.musicians)?;

    let changed = conn.execute(
        r#"
        UPDATE recurring_schedules SET
          week_of_month=?2, day_of_week=?3, time=?4, type=?5, community=?6,
          musicians_json=?7, observations=?8, is_active=?9, start_month=?10
        WHERE id=?1
        "#,
        params![
            rule.id,
            rule.week_of_month,
            rule.day_of_week,
            rule.time,
            rule.schedule_type,
            rule.community,
            musicians_json,
            rule.observations,
            rule.is_active,
            rule.start_month
        ],
    )?;
    expect_changed(changed, "recurring schedule", &rule.id)?;
    info!(id = %rule.id, "recurring schedule updated");
    Ok(())
}

pub fn set_recurring_schedule_active(conn: &Connection, id: &str, is_active: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE recurring_schedules SET is_active=?2 WHERE id=?1",
        params![id, is_active],
    )?;
    expect_changed(changed, "recurring schedule", id)?;
    info!(id, is_active, "recurring schedule toggled");
    Ok(())
}

/// Deletes the rule and, through the foreign key, all of its overrides.
pub fn delete_recurring_schedule(conn: &Connection, id: &str) -> Result<()> {
    let changed = conn.execute("DELETE FROM recurring_schedules WHERE id=?1", params![id])?;
    expect_changed(changed, "recurring schedule", id)?;
    info!(id, "recurring schedule deleted");
    Ok(())
}

pub fn get_recurring_schedule(conn: &Connection, id: &str) -> Result<RecurringSchedule> {
    let sql = format!("SELECT {RECURRING_SCHEDULE_COLUMNS} FROM recurring_schedules WHERE id=?1");
    conn.query_row(&sql, params![id], recurring_schedule_from_row)
        .optional()?
        .ok_or_else(|| RosterError::NotFound(format!("recurring schedule {id}")))
}

pub fn list_recurring_schedules(conn: &Connection) -> Result<Vec<RecurringSchedule>> {
    let sql = format!(
        "SELECT {RECURRING_SCHEDULE_COLUMNS} FROM recurring_schedules ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], recurring_schedule_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Musician overrides

const SCHEDULE_OVERRIDE_COLUMNS: &str = "id, recurring_schedule_id, specific_month, date, time, \
     type, community, musicians_json, observations, created_at";

fn schedule_override_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleOverride> {
    Ok(ScheduleOverride {
        id: row.get(0)?,
        recurring_schedule_id: row.get(1)?,
        specific_month: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        schedule_type: row.get(5)?,
        community: row.get(6)?,
        musicians: musicians_column(row, 7)?,
        observations: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn insert_schedule_override(conn: &Connection, entry: &ScheduleOverride) -> Result<()> {
    validate_override_date(&entry.date, entry.specific_month)?;
    let musicians_json = serde_json::to_string(&entry.musicians)?;
    let created_at = non_empty_or_now(&entry.created_at)?;

    conn.execute(
        r#"
        INSERT INTO schedule_overrides (
          id, recurring_schedule_id, specific_month, date, time, type,
          community, musicians_json, observations, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            entry.id,
            entry.recurring_schedule_id,
            entry.specific_month,
            entry.date,
            entry.time,
            entry.schedule_type,
            entry.community,
            musicians_json,
            entry.observations,
            created_at
        ],
    )?;
    info!(
        id = %entry.id,
        rule_id = %entry.recurring_schedule_id,
        month = %entry.specific_month,
        "schedule override created"
    );
    Ok(())
}

pub fn update_schedule_override(conn: &Connection, entry: &ScheduleOverride) -> Result<()> {
    validate_override_date(&entry.date, entry.specific_month)?;
    let musicians_json = serde_json::to_string(&entry.musicians)?;

    let changed = conn.execute(
        r#"
        UPDATE schedule_overrides SET
          date=?2, time=?3, type=?4, community=?5, musicians_json=?6, observations=?7
        WHERE id=?1
        "#,
        params![
            entry.id,
            entry.date,
            entry.time,
            entry.schedule_type,
            entry.community,
            musicians_json,
            entry.observations
        ],
    )?;
    expect_changed(changed, "schedule override", &entry.id)?;
    info!(id = %entry.id, "schedule override updated");
    Ok(())
}

pub fn delete_schedule_override(conn: &Connection, id: &str) -> Result<()> {
    let changed = conn.execute("DELETE FROM schedule_overrides WHERE id=?1", params![id])?;
    expect_changed(changed, "schedule override", id)?;
    info!(id, "schedule override deleted");
    Ok(())
}

pub fn get_schedule_override(conn: &Connection, id: &str) -> Result<ScheduleOverride> {
    let sql = format!("SELECT {SCHEDULE_OVERRIDE_COLUMNS} FROM schedule_overrides WHERE id=?1");
    conn.query_row(&sql, params![id], schedule_override_from_row)
        .optional()?
        .ok_or_else(|| RosterError::NotFound(format!("schedule override {id}")))
}

/// Overrides of one month, oldest first.
pub fn list_schedule_overrides(conn: &Connection, month: YearMonth) -> Result<Vec<ScheduleOverride>> {
    let sql = format!(
        "SELECT {SCHEDULE_OVERRIDE_COLUMNS} FROM schedule_overrides \
         WHERE specific_month=?1 ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![month], schedule_override_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Psalmist rules

const SALMIST_SCHEDULE_COLUMNS: &str = "id, week_of_month, day_of_week, time, community, psalmist, \
     observations, is_active, start_month, created_at";

fn salmist_schedule_from_row(row: &Row<'_>) -> rusqlite::Result<RecurringSalmistSchedule> {
    Ok(RecurringSalmistSchedule {
        id: row.get(0)?,
        week_of_month: row.get(1)?,
        day_of_week: row.get(2)?,
        time: row.get(3)?,
        community: row.get(4)?,
        psalmist: row.get(5)?,
        observations: row.get(6)?,
        is_active: row.get::<_, Option<bool>>(7)?.unwrap_or(true),
        start_month: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn insert_salmist_schedule(conn: &Connection, rule: &RecurringSalmistSchedule) -> Result<()> {
    validate_rule(rule.week_of_month, rule.day_of_week)?;
    let created_at = non_empty_or_now(&rule.created_at)?;

    conn.execute(
        r#"
        INSERT INTO recurring_salmist_schedules (
          id, week_of_month, day_of_week, time, community, psalmist,
          observations, is_active, start_month, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            rule.id,
            rule.week_of_month,
            rule.day_of_week,
            rule.time,
            rule.community,
            rule.psalmist,
            rule.observations,
            rule.is_active,
            rule.start_month,
            created_at
        ],
    )?;
    info!(id = %rule.id, psalmist = %rule.psalmist, "salmist schedule created");
    Ok(())
}

pub fn update_salmist_schedule(conn: &Connection, rule: &RecurringSalmistSchedule) -> Result<()> {
    validate_rule(rule.week_of_month, rule.day_of_week)?;

    let changed = conn.execute(
        r#"
        UPDATE recurring_salmist_schedules SET
          week_of_month=?2, day_of_week=?3, time=?4, community=?5, psalmist=?6,
          observations=?7, is_active=?8, start_month=?9
        WHERE id=?1
        "#,
        params![
            rule.id,
            rule.week_of_month,
            rule.day_of_week,
            rule.time,
            rule.community,
            rule.psalmist,
            rule.observations,
            rule.is_active,
            rule.start_month
        ],
    )?;
    expect_changed(changed, "salmist schedule", &rule.id)?;
    info!(id = %rule.id, "salmist schedule updated");
    Ok(())
}

pub fn set_salmist_schedule_active(conn: &Connection, id: &str, is_active: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE recurring_salmist_schedules SET is_active=?2 WHERE id=?1",
        params![id, is_active],
    )?;
    expect_changed(changed, "salmist schedule", id)?;
    info!(id, is_active, "salmist schedule toggled");
    Ok(())
}

pub fn delete_salmist_schedule(conn: &Connection, id: &str) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM recurring_salmist_schedules WHERE id=?1",
        params![id],
    )?;
    expect_changed(changed, "salmist schedule", id)?;
    info!(id, "salmist schedule deleted");
    Ok(())
}

pub fn get_salmist_schedule(conn: &Connection, id: &str) -> Result<RecurringSalmistSchedule> {
    let sql =
        format!("SELECT {SALMIST_SCHEDULE_COLUMNS} FROM recurring_salmist_schedules WHERE id=?1");
    conn.query_row(&sql, params![id], salmist_schedule_from_row)
        .optional()?
        .ok_or_else(|| RosterError::NotFound(format!("salmist schedule {id}")))
}

pub fn list_salmist_schedules(conn: &Connection) -> Result<Vec<RecurringSalmistSchedule>> {
    let sql = format!(
        "SELECT {SALMIST_SCHEDULE_COLUMNS} FROM recurring_salmist_schedules \
         ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], salmist_schedule_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Psalmist overrides

const SALMIST_OVERRIDE_COLUMNS: &str = "id, recurring_salmist_schedule_id, specific_month, date, \
     time, community, psalmist, observations, created_at";

fn salmist_override_from_row(row: &Row<'_>) -> rusqlite::Result<SalmistScheduleOverride> {
    Ok(SalmistScheduleOverride {
        id: row.get(0)?,
        recurring_salmist_schedule_id: row.get(1)?,
        specific_month: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        community: row.get(5)?,
        psalmist: row.get(6)?,
        observations: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn insert_salmist_override(conn: &Connection, entry: &SalmistScheduleOverride) -> Result<()> {
    validate_override_date(&entry.date, entry.specific_month)?;
    let created_at = non_empty_or_now(&entry.created_at)?;

    conn.execute(
        r#"
        INSERT INTO salmist_schedule_overrides (
          id, recurring_salmist_schedule_id, specific_month, date, time,
          community, psalmist, observations, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            entry.id,
            entry.recurring_salmist_schedule_id,
            entry.specific_month,
            entry.date,
            entry.time,
            entry.community,
            entry.psalmist,
            entry.observations,
            created_at
        ],
    )?;
    info!(
        id = %entry.id,
        rule_id = %entry.recurring_salmist_schedule_id,
        month = %entry.specific_month,
        "salmist override created"
    );
    Ok(())
}

pub fn update_salmist_override(conn: &Connection, entry: &SalmistScheduleOverride) -> Result<()> {
    validate_override_date(&entry.date, entry.specific_month)?;

    let changed = conn.execute(
        r#"
        UPDATE salmist_schedule_overrides SET
          date=?2, time=?3, community=?4, psalmist=?5, observations=?6
        WHERE id=?1
        "#,
        params![
            entry.id,
            entry.date,
            entry.time,
            entry.community,
            entry.psalmist,
            entry.observations
        ],
    )?;
    expect_changed(changed, "salmist override", &entry.id)?;
    info!(id = %entry.id, "salmist override updated");
    Ok(())
}

pub fn delete_salmist_override(conn: &Connection, id: &str) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM salmist_schedule_overrides WHERE id=?1",
        params![id],
    )?;
    expect_changed(changed, "salmist override", id)?;
    info!(id, "salmist override deleted");
    Ok(())
}

pub fn get_salmist_override(conn: &Connection, id: &str) -> Result<SalmistScheduleOverride> {
    let sql =
        format!("SELECT {SALMIST_OVERRIDE_COLUMNS} FROM salmist_schedule_overrides WHERE id=?1");
    conn.query_row(&sql, params![id], salmist_override_from_row)
        .optional()?
        .ok_or_else(|| RosterError::NotFound(format!("salmist override {id}")))
}

pub fn list_salmist_overrides(
    conn: &Connection,
    month: YearMonth,
) -> Result<Vec<SalmistScheduleOverride>> {
    let sql = format!(
        "SELECT {SALMIST_OVERRIDE_COLUMNS} FROM salmist_schedule_overrides \
         WHERE specific_month=?1 ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![month], salmist_override_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Everything the generator needs for `month`.
pub fn load_month(conn: &Connection, month: YearMonth) -> Result<RosterData> {
    Ok(RosterData {
        recurring_schedules: list_recurring_schedules(conn)?,
        schedule_overrides: list_schedule_overrides(conn, month)?,
        salmist_schedules: list_salmist_schedules(conn)?,
        salmist_overrides: list_salmist_overrides(conn, month)?,
    })
}

fn non_empty_or_now(created_at: &str) -> Result<String> {
    if created_at.is_empty() {
        crate::now_timestamp()
    } else {
        Ok(created_at.to_string())
    }
}
