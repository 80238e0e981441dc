#![forbid(unsafe_code)]

use chrono::NaiveDate;
use hourbook_kernel_contracts::{BillingPeriod, InvoiceNumber};
use hourbook_storage::ledger::{Ledger, LedgerError};

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn period(a: &str, b: &str) -> BillingPeriod {
    BillingPeriod::new(day(a), day(b)).unwrap()
}

fn n(v: u64) -> InvoiceNumber {
    InvoiceNumber::new(v).unwrap()
}

#[test]
fn at_invoice_db_01_numbering_starts_at_base_and_steps_by_ten() {
    let mut s = Ledger::new_in_memory();
    assert_eq!(s.next_invoice_number().unwrap(), n(391));

    s.store_draft(n(391), period("2025-01-01", "2025-01-10"))
        .unwrap();
    // Drafts never advance numbering.
    assert_eq!(s.next_invoice_number().unwrap(), n(391));

    s.commit_draft(n(391), period("2025-01-01", "2025-01-10"))
        .unwrap();
    assert_eq!(s.next_invoice_number().unwrap(), n(401));
}

#[test]
fn at_invoice_db_02_store_draft_overwrites_previous_draft() {
    let mut s = Ledger::new_in_memory();
    s.store_draft(n(391), period("2025-01-01", "2025-01-10"))
        .unwrap();
    s.store_draft(n(391), period("2025-01-01", "2025-01-15"))
        .unwrap();

    let draft = s.last_unconfirmed_invoice().unwrap();
    assert_eq!(draft.end_date, day("2025-01-15"));
    assert!(s.invoice_by_number(n(391)).is_none());
}

#[test]
fn at_invoice_db_03_commit_moves_draft_into_history() {
    let mut s = Ledger::new_in_memory();
    s.store_draft(n(391), period("2025-01-01", "2025-01-10"))
        .unwrap();
    let confirmed = s
        .commit_draft(n(391), period("2025-01-01", "2025-01-10"))
        .unwrap();

    assert!(s.last_unconfirmed_invoice().is_none());
    assert_eq!(s.last_confirmed_invoice(), Some(&confirmed));
    assert_eq!(s.invoice_by_number(n(391)), Some(&confirmed));
    assert_eq!(s.confirmed_invoices().count(), 1);
}

#[test]
fn at_invoice_db_04_commit_without_draft_fails() {
    let mut s = Ledger::new_in_memory();
    assert!(matches!(
        s.commit_draft(n(391), period("2025-01-01", "2025-01-10")),
        Err(LedgerError::NoDraft)
    ));
}

#[test]
fn at_invoice_db_05_lifecycle_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    {
        let mut s = Ledger::open(&path).unwrap();
        s.store_draft(n(391), period("2025-01-01", "2025-01-10"))
            .unwrap();
        s.commit_draft(n(391), period("2025-01-01", "2025-01-10"))
            .unwrap();
        s.store_draft(n(401), period("2025-01-11", "2025-02-01"))
            .unwrap();
    }
    let s = Ledger::open(&path).unwrap();
    assert_eq!(s.last_confirmed_invoice().unwrap().invoice_number, n(391));
    assert_eq!(s.last_unconfirmed_invoice().unwrap().invoice_number, n(401));
    assert_eq!(s.next_invoice_number().unwrap(), n(401));
}

#[test]
fn at_invoice_db_06_loads_ledger_written_by_earlier_tool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aldo_data.json");
    std::fs::write(
        &path,
        r#"{
  "last_confirmed_invoice": {"invoice_number": "391", "start_date": "2025-01-01", "end_date": "2025-01-10"},
  "last_unconfirmed_invoice": null,
  "confirmed_invoices": {
    "391": {"invoice_number": "391", "start_date": "2025-01-01", "end_date": "2025-01-10"}
  },
  "work_entries": [
    {"date": "2025-01-05", "hours": 5, "description": "", "timestamp": "2025-01-05T18:00:00.000001"},
    {"date": "2025-01-01", "hours": 3, "description": "kickoff", "timestamp": "2025-01-01T18:00:00"}
  ]
}"#,
    )
    .unwrap();

    let s = Ledger::open(&path).unwrap();
    assert_eq!(s.earliest_entry_date(), Some(day("2025-01-01")));
    assert_eq!(s.next_invoice_number().unwrap(), n(401));
    assert!(s.last_confirmed_invoice().unwrap().entries_digest.is_none());
}

#[test]
fn at_invoice_db_07_duplicate_work_dates_on_disk_are_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(
        &path,
        r#"{"work_entries": [
    {"date": "2025-01-05", "hours": 5, "timestamp": "2025-01-05T18:00:00"},
    {"date": "2025-01-05", "hours": 2, "timestamp": "2025-01-05T19:00:00"}
]}"#,
    )
    .unwrap();
    assert!(matches!(
        Ledger::open(&path),
        Err(LedgerError::Corrupt { .. })
    ));
}

#[test]
fn at_invoice_db_08_blank_ledger_file_is_corrupt_not_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    {
        let mut s = Ledger::open(&path).unwrap();
        s.store_draft(n(391), period("2025-01-01", "2025-01-10"))
            .unwrap();
        s.commit_draft(n(391), period("2025-01-01", "2025-01-10"))
            .unwrap();
    }
    // Truncated by a crash mid-write.
    std::fs::write(&path, "\n").unwrap();

    assert!(matches!(
        Ledger::open(&path),
        Err(LedgerError::Corrupt { .. })
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "\n");
}

#[test]
fn at_invoice_db_09_malformed_ledger_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let raw = r#"{"work_entries": [{"date": "2025-01-05", "hours": 5"#;
    std::fs::write(&path, raw).unwrap();

    assert!(matches!(
        Ledger::open(&path),
        Err(LedgerError::Corrupt { .. })
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), raw);
}
