use notes::export_month;
use roster_core::schema::RecurringSalmistSchedule;
use roster_core::{MonthRoster, RosterData, YearMonth};
use std::fs;

fn data() -> RosterData {
    RosterData {
        salmist_schedules: vec![RecurringSalmistSchedule {
            id: "s1".into(),
            week_of_month: 2,
            day_of_week: 0,
            time: "10:00".into(),
            community: "Matriz".into(),
            psalmist: "Clara".into(),
            observations: None,
            is_active: true,
            start_month: "2025-01".parse().unwrap(),
            created_at: String::new(),
        }],
        ..RosterData::default()
    }
}

#[test]
fn export_writes_note_and_index() {
    let dir = tempfile::tempdir().unwrap();
    let data = data();

    for month in ["2025-03", "2025-04"] {
        let month: YearMonth = month.parse().unwrap();
        let roster = MonthRoster::build(month, &data, None).unwrap();
        export_month(&roster, dir.path()).unwrap();
    }

    let note = fs::read_to_string(dir.path().join("Rosters").join("2025-03.md")).unwrap();
    assert!(note.contains("# Roster 2025-03"));
    assert!(note.contains("| 2025-03-09 | 2nd Sunday | 10:00 | Matriz | Clara |  |"));

    let index = fs::read_to_string(dir.path().join("00_Index").join("MOC - Rosters.md")).unwrap();
    let april = index.find("[[Rosters/2025-04|2025-04]]").unwrap();
    let march = index.find("[[Rosters/2025-03|2025-03]]").unwrap();
    assert!(april < march, "newest month first");
}

#[test]
fn re_export_overwrites_month_note() {
    let dir = tempfile::tempdir().unwrap();
    let data = data();
    let month: YearMonth = "2025-03".parse().unwrap();

    let roster = MonthRoster::build(month, &data, None).unwrap();
    let path = export_month(&roster, dir.path()).unwrap();

    let empty = RosterData::default();
    let roster = MonthRoster::build(month, &empty, None).unwrap();
    assert_eq!(export_month(&roster, dir.path()).unwrap(), path);

    let note = fs::read_to_string(&path).unwrap();
    assert!(note.contains("musician_duties: 0"));
    assert!(!note.contains("Clara"));
}
