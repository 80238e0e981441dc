#![forbid(unsafe_code)]

use chrono::{NaiveDate, NaiveDateTime};
use hourbook_storage::ledger::{Ledger, LedgerError};

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn at(raw: &str, hour: u32) -> NaiveDateTime {
    day(raw).and_hms_opt(hour, 0, 0).unwrap()
}

#[test]
fn at_entries_db_01_last_write_wins_per_date() {
    let mut s = Ledger::new_in_memory();
    s.log_work(day("2025-03-03"), 2.0, Some("first".into()), at("2025-03-03", 9))
        .unwrap();
    s.log_work(day("2025-03-03"), 7.5, None, at("2025-03-03", 10))
        .unwrap();
    s.log_work(day("2025-03-03"), 4.0, Some("final".into()), at("2025-03-03", 11))
        .unwrap();

    let got = s.entries_in_range(day("2025-03-01"), day("2025-03-31"));
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].hours, 4.0);
    assert_eq!(got[0].description.as_deref(), Some("final"));
    assert_eq!(got[0].logged_at, at("2025-03-03", 11));
}

#[test]
fn at_entries_db_02_range_is_inclusive_and_ascending() {
    let mut s = Ledger::new_in_memory();
    for (d, h) in [
        ("2025-01-09", 1.0),
        ("2025-01-01", 2.0),
        ("2025-01-05", 3.0),
        ("2025-01-10", 4.0),
        ("2025-01-11", 5.0),
    ] {
        s.log_work(day(d), h, None, at(d, 12)).unwrap();
    }

    let got: Vec<NaiveDate> = s
        .entries_in_range(day("2025-01-01"), day("2025-01-10"))
        .iter()
        .map(|e| e.date)
        .collect();
    assert_eq!(
        got,
        vec![
            day("2025-01-01"),
            day("2025-01-05"),
            day("2025-01-09"),
            day("2025-01-10")
        ]
    );
    assert!(s
        .entries_in_range(day("2024-12-01"), day("2024-12-31"))
        .is_empty());
    assert_eq!(
        s.entries_in_range(day("2025-01-05"), day("2025-01-05")).len(),
        1
    );
}

#[test]
fn at_entries_db_03_earliest_date_and_totals() {
    let mut s = Ledger::new_in_memory();
    assert_eq!(s.earliest_entry_date(), None);
    s.log_work(day("2025-01-05"), 5.0, None, at("2025-01-05", 8))
        .unwrap();
    s.log_work(day("2025-01-01"), 3.0, None, at("2025-01-01", 8))
        .unwrap();
    assert_eq!(s.earliest_entry_date(), Some(day("2025-01-01")));

    let entries = s.entries_in_range(day("2025-01-01"), day("2025-01-31"));
    assert_eq!(s.total_hours(&entries), 8.0);
}

#[test]
fn at_entries_db_04_non_positive_hours_rejected_without_side_effects() {
    let mut s = Ledger::new_in_memory();
    s.log_work(day("2025-01-01"), 3.0, None, at("2025-01-01", 8))
        .unwrap();
    for bad in [0.0, -2.0, f64::NAN] {
        assert!(matches!(
            s.log_work(day("2025-01-01"), bad, None, at("2025-01-01", 9)),
            Err(LedgerError::ContractViolation(_))
        ));
    }
    assert_eq!(s.entry_on(day("2025-01-01")).unwrap().hours, 3.0);
}

#[test]
fn at_entries_db_05_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    {
        let mut s = Ledger::open(&path).unwrap();
        s.log_work(day("2025-02-01"), 6.0, Some("api work".into()), at("2025-02-01", 17))
            .unwrap();
        s.log_work(day("2025-02-01"), 6.5, Some("api work".into()), at("2025-02-01", 18))
            .unwrap();
    }
    let s = Ledger::open(&path).unwrap();
    let got = s.entries_in_range(day("2025-02-01"), day("2025-02-01"));
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].hours, 6.5);
}

#[test]
fn at_entries_db_06_failed_save_leaves_memory_and_disk_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let mut s = Ledger::open(&path).unwrap();
    s.log_work(day("2025-02-01"), 6.0, None, at("2025-02-01", 17))
        .unwrap();
    let on_disk = std::fs::read_to_string(&path).unwrap();

    std::fs::create_dir(path.with_extension("tmp")).unwrap();
    assert!(matches!(
        s.log_work(day("2025-02-02"), 1.0, None, at("2025-02-02", 9)),
        Err(LedgerError::Io(_))
    ));
    assert!(s.entry_on(day("2025-02-02")).is_none());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), on_disk);
}
