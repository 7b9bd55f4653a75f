//! Store round trips against a temporary SQLite file.

use roster_core::db;
use roster_core::import::{RosterSeed, import_seed};
use roster_core::schema::{
    Musician, RecurringSalmistSchedule, RecurringSchedule, SalmistScheduleOverride,
    ScheduleOverride, ScheduleType,
};
use roster_core::{MonthRoster, RosterError, YearMonth};
use rusqlite::Connection;
use tempfile::TempDir;
use time::macros::date;

fn open_temp() -> (TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    let conn = db::open(path.to_str().unwrap()).unwrap();
    (dir, conn)
}

fn month(s: &str) -> YearMonth {
    s.parse().unwrap()
}

fn musician_rule(id: &str, week: u8, dow: u8, start: &str) -> RecurringSchedule {
    RecurringSchedule {
        id: id.to_string(),
        week_of_month: week,
        day_of_week: dow,
        time: "19:30".to_string(),
        schedule_type: ScheduleType::Semanal,
        community: "Matriz".to_string(),
        musicians: vec![
            Musician {
                name: "Ana".to_string(),
            },
            Musician {
                name: "Bruno".to_string(),
            },
        ],
        observations: Some("Bring the keyboard".to_string()),
        is_active: true,
        start_month: month(start),
        created_at: String::new(),
    }
}

fn musician_override(id: &str, rule_id: &str, specific: &str, date: &str) -> ScheduleOverride {
    ScheduleOverride {
        id: id.to_string(),
        recurring_schedule_id: rule_id.to_string(),
        specific_month: month(specific),
        date: date.to_string(),
        time: "08:00".to_string(),
        schedule_type: ScheduleType::Especial,
        community: "Capela".to_string(),
        musicians: vec![Musician {
            name: "Carla".to_string(),
        }],
        observations: None,
        created_at: String::new(),
    }
}

fn salmist_rule(id: &str, week: u8, dow: u8) -> RecurringSalmistSchedule {
    RecurringSalmistSchedule {
        id: id.to_string(),
        week_of_month: week,
        day_of_week: dow,
        time: "09:00".to_string(),
        community: "Matriz".to_string(),
        psalmist: "Clara".to_string(),
        observations: None,
        is_active: true,
        start_month: month("2025-01"),
        created_at: String::new(),
    }
}

#[test]
fn recurring_schedule_round_trip() {
    let (_dir, conn) = open_temp();
    let rule = musician_rule("r1", 2, 0, "2025-01");
    db::insert_recurring_schedule(&conn, &rule).unwrap();

    let loaded = db::get_recurring_schedule(&conn, "r1").unwrap();
    assert_eq!(loaded.week_of_month, 2);
    assert_eq!(loaded.schedule_type, ScheduleType::Semanal);
    assert_eq!(loaded.musicians, rule.musicians);
    assert_eq!(loaded.observations.as_deref(), Some("Bring the keyboard"));
    assert_eq!(loaded.start_month, month("2025-01"));
    assert!(!loaded.created_at.is_empty());
}

#[test]
fn invalid_rules_are_rejected_before_writing() {
    let (_dir, conn) = open_temp();
    let err = db::insert_recurring_schedule(&conn, &musician_rule("bad", 6, 0, "2025-01"))
        .unwrap_err();
    assert!(matches!(err, RosterError::InvalidInput(_)));
    assert!(db::insert_salmist_schedule(&conn, &salmist_rule("bad", 1, 7)).is_err());
    assert!(db::list_recurring_schedules(&conn).unwrap().is_empty());
}

#[test]
fn update_overwrites_in_place() {
    let (_dir, conn) = open_temp();
    let mut rule = musician_rule("r1", 2, 0, "2025-01");
    db::insert_recurring_schedule(&conn, &rule).unwrap();

    rule.week_of_month = 3;
    rule.community = "Capela".to_string();
    rule.musicians.clear();
    db::update_recurring_schedule(&conn, &rule).unwrap();

    let loaded = db::get_recurring_schedule(&conn, "r1").unwrap();
    assert_eq!(loaded.week_of_month, 3);
    assert_eq!(loaded.community, "Capela");
    assert!(loaded.musicians.is_empty());
    assert_eq!(db::list_recurring_schedules(&conn).unwrap().len(), 1);
}

#[test]
fn missing_ids_are_not_found() {
    let (_dir, conn) = open_temp();
    assert!(matches!(
        db::get_recurring_schedule(&conn, "nope"),
        Err(RosterError::NotFound(_))
    ));
    assert!(matches!(
        db::set_recurring_schedule_active(&conn, "nope", false),
        Err(RosterError::NotFound(_))
    ));
    assert!(matches!(
        db::delete_salmist_override(&conn, "nope"),
        Err(RosterError::NotFound(_))
    ));
    assert!(matches!(
        db::update_salmist_schedule(&conn, &salmist_rule("nope", 1, 0)),
        Err(RosterError::NotFound(_))
    ));
}

#[test]
fn toggling_active_hides_rule_from_month() {
    let (_dir, conn) = open_temp();
    db::insert_recurring_schedule(&conn, &musician_rule("r1", 1, 0, "2025-01")).unwrap();
    db::set_recurring_schedule_active(&conn, "r1", false).unwrap();

    let data = db::load_month(&conn, month("2025-03")).unwrap();
    let roster = MonthRoster::build(month("2025-03"), &data, None).unwrap();
    assert!(roster.musicians.is_empty());

    db::set_recurring_schedule_active(&conn, "r1", true).unwrap();
    let data = db::load_month(&conn, month("2025-03")).unwrap();
    let roster = MonthRoster::build(month("2025-03"), &data, None).unwrap();
    assert_eq!(roster.musicians.len(), 1);
}

#[test]
fn overrides_are_listed_per_month() {
    let (_dir, conn) = open_temp();
    db::insert_recurring_schedule(&conn, &musician_rule("r1", 1, 0, "2025-01")).unwrap();
    db::insert_schedule_override(&conn, &musician_override("o1", "r1", "2025-03", "2025-03-02"))
        .unwrap();
    db::insert_schedule_override(&conn, &musician_override("o2", "r1", "2025-04", "2025-04-06"))
        .unwrap();

    let march = db::list_schedule_overrides(&conn, month("2025-03")).unwrap();
    assert_eq!(march.len(), 1);
    assert_eq!(march[0].id, "o1");
    assert_eq!(march[0].musicians[0].name, "Carla");
    assert!(db::list_schedule_overrides(&conn, month("2025-05")).unwrap().is_empty());
}

#[test]
fn override_date_must_fall_in_its_month() {
    let (_dir, conn) = open_temp();
    db::insert_recurring_schedule(&conn, &musician_rule("r1", 1, 0, "2025-01")).unwrap();
    let err =
        db::insert_schedule_override(&conn, &musician_override("o1", "r1", "2025-03", "2025-04-06"))
            .unwrap_err();
    assert!(matches!(err, RosterError::InvalidInput(_)));
    assert!(
        db::insert_schedule_override(&conn, &musician_override("o1", "r1", "2025-03", "03/02/2025"))
            .is_err()
    );
}

#[test]
fn override_requires_existing_rule() {
    let (_dir, conn) = open_temp();
    let err =
        db::insert_schedule_override(&conn, &musician_override("o1", "ghost", "2025-03", "2025-03-02"))
            .unwrap_err();
    assert!(matches!(err, RosterError::Database(_)));
}

#[test]
fn deleting_rule_cascades_to_overrides() {
    let (_dir, conn) = open_temp();
    db::insert_recurring_schedule(&conn, &musician_rule("r1", 1, 0, "2025-01")).unwrap();
    db::insert_schedule_override(&conn, &musician_override("o1", "r1", "2025-03", "2025-03-02"))
        .unwrap();

    db::insert_salmist_schedule(&conn, &salmist_rule("s1", 3, 0)).unwrap();
    db::insert_salmist_override(
        &conn,
        &SalmistScheduleOverride {
            id: "so1".to_string(),
            recurring_salmist_schedule_id: "s1".to_string(),
            specific_month: month("2025-03"),
            date: "2025-03-16".to_string(),
            time: "09:00".to_string(),
            community: "Matriz".to_string(),
            psalmist: "Davi".to_string(),
            observations: None,
            created_at: String::new(),
        },
    )
    .unwrap();

    db::delete_recurring_schedule(&conn, "r1").unwrap();
    db::delete_salmist_schedule(&conn, "s1").unwrap();

    assert!(db::list_schedule_overrides(&conn, month("2025-03")).unwrap().is_empty());
    assert!(db::list_salmist_overrides(&conn, month("2025-03")).unwrap().is_empty());
    assert!(matches!(
        db::get_schedule_override(&conn, "o1"),
        Err(RosterError::NotFound(_))
    ));
}

#[test]
fn month_roster_merges_stored_overrides() {
    let (_dir, conn) = open_temp();
    db::insert_recurring_schedule(&conn, &musician_rule("late", 4, 0, "2025-01")).unwrap();
    db::insert_recurring_schedule(&conn, &musician_rule("early", 1, 0, "2025-01")).unwrap();
    db::insert_recurring_schedule(&conn, &musician_rule("future", 1, 0, "2025-06")).unwrap();
    db::insert_schedule_override(&conn, &musician_override("o1", "early", "2025-03", "2025-03-02"))
        .unwrap();
    db::insert_salmist_schedule(&conn, &salmist_rule("s1", 5, 0)).unwrap();

    let data = db::load_month(&conn, month("2025-03")).unwrap();
    let roster = MonthRoster::build(month("2025-03"), &data, None).unwrap();

    assert_eq!(roster.musicians.len(), 2);
    assert_eq!(roster.musicians[0].rule.id, "early");
    assert_eq!(roster.musicians[0].date, date!(2025 - 03 - 02));
    assert!(roster.musicians[0].is_override);
    assert_eq!(roster.musicians[1].rule.id, "late");
    assert_eq!(roster.musicians[1].date, date!(2025 - 03 - 23));
    assert!(!roster.musicians[1].is_override);

    assert_eq!(roster.psalmists.len(), 1);
    assert_eq!(roster.psalmists[0].date, date!(2025 - 03 - 30));

    // February 2025 has only four Sundays.
    let data = db::load_month(&conn, month("2025-02")).unwrap();
    let roster = MonthRoster::build(month("2025-02"), &data, None).unwrap();
    assert!(roster.psalmists.is_empty());
}

#[test]
fn legacy_null_is_active_is_patched_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.db");
    let path = path.to_str().unwrap();
    {
        let conn = db::open(path).unwrap();
        db::insert_salmist_schedule(&conn, &salmist_rule("s1", 1, 0)).unwrap();
        conn.execute(
            "UPDATE recurring_salmist_schedules SET is_active = NULL WHERE id = 's1'",
            [],
        )
        .unwrap();
    }
    let conn = db::open(path).unwrap();
    let active: Option<bool> = conn
        .query_row(
            "SELECT is_active FROM recurring_salmist_schedules WHERE id = 's1'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(active, Some(true));
}

#[test]
fn seed_import_is_all_or_nothing() {
    let (_dir, mut conn) = open_temp();
    let mut seed = RosterSeed {
        recurring_schedules: vec![musician_rule("r1", 1, 0, "2025-01")],
        schedule_overrides: vec![musician_override("o1", "r1", "2025-03", "2025-03-02")],
        salmist_schedules: vec![salmist_rule("s1", 2, 0)],
        salmist_overrides: Vec::new(),
    };

    seed.salmist_schedules.push(salmist_rule("broken", 9, 0));
    assert!(import_seed(&mut conn, &seed).is_err());
    assert!(db::list_recurring_schedules(&conn).unwrap().is_empty());

    seed.salmist_schedules.pop();
    let summary = import_seed(&mut conn, &seed).unwrap();
    assert_eq!(summary.recurring_schedules, 1);
    assert_eq!(summary.schedule_overrides, 1);
    assert_eq!(summary.salmist_schedules, 1);
    assert_eq!(db::list_salmist_schedules(&conn).unwrap().len(), 1);
}
