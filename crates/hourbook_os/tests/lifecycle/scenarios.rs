#![forbid(unsafe_code)]

use chrono::{NaiveDate, NaiveDateTime};
use hourbook_kernel_contracts::{InvoiceNumber, WorkEntry};
use hourbook_os::lifecycle::{InvoiceLifecycleEngine, LifecycleError, RangeViolation};
use hourbook_storage::Ledger;

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn at(raw: &str) -> NaiveDateTime {
    day(raw).and_hms_opt(20, 15, 0).unwrap()
}

fn n(v: u64) -> InvoiceNumber {
    InvoiceNumber::new(v).unwrap()
}

fn log(l: &mut Ledger, d: &str, h: f64) -> WorkEntry {
    l.log_work(day(d), h, Some(format!("session {d}")), at(d))
        .unwrap()
}

#[test]
fn at_lifecycle_sc_01_first_period_confirm_and_continue() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();

    assert!(matches!(
        engine.propose_invoice(&mut l, None, day("2025-01-01")),
        Err(LifecycleError::NoWorkRecorded { period: None })
    ));

    log(&mut l, "2025-01-01", 3.0);
    log(&mut l, "2025-01-05", 5.0);

    let p = engine
        .propose_invoice(&mut l, Some(day("2025-01-10")), day("2025-01-10"))
        .unwrap();
    assert_eq!(p.start_date(), day("2025-01-01"));
    assert_eq!(p.end_date(), day("2025-01-10"));
    assert_eq!(p.number(), n(391));
    assert_eq!(p.entries.len(), 2);
    assert_eq!(p.total_hours, 8.0);

    engine.confirm_invoice(&mut l, n(391)).unwrap();
    assert!(matches!(
        engine.confirm_invoice(&mut l, n(391)),
        Err(LifecycleError::NoDraft)
    ));

    log(&mut l, "2025-01-20", 2.0);
    let next = engine
        .propose_invoice(&mut l, Some(day("2025-02-01")), day("2025-02-01"))
        .unwrap();
    assert_eq!(next.start_date(), day("2025-01-11"));
    assert_eq!(next.number(), n(401));
}

#[test]
fn at_lifecycle_sc_02_reproposal_overwrites_the_draft() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();
    log(&mut l, "2025-01-01", 3.0);
    log(&mut l, "2025-01-12", 1.0);

    let first = engine
        .propose_invoice(&mut l, Some(day("2025-01-10")), day("2025-01-20"))
        .unwrap();
    assert_eq!(l.last_unconfirmed_invoice(), Some(&first.record));

    let second = engine
        .propose_invoice(&mut l, Some(day("2025-01-15")), day("2025-01-20"))
        .unwrap();
    assert_eq!(l.last_unconfirmed_invoice(), Some(&second.record));
    assert_eq!(second.entries.len(), 2);

    // The abandoned dates are gone; confirmation uses the draft's own period.
    let confirmed = engine.confirm_invoice(&mut l, second.number()).unwrap();
    assert_eq!(confirmed.end_date, day("2025-01-15"));
}

#[test]
fn at_lifecycle_sc_03_wrong_number_leaves_draft_pending() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();
    log(&mut l, "2025-01-01", 3.0);
    engine
        .propose_invoice(&mut l, Some(day("2025-01-10")), day("2025-01-20"))
        .unwrap();

    for wrong in [381, 401, 7] {
        assert!(matches!(
            engine.confirm_invoice(&mut l, n(wrong)),
            Err(LifecycleError::NumberMismatch { pending, requested })
                if pending == n(391) && requested == n(wrong)
        ));
    }
    assert_eq!(
        l.last_unconfirmed_invoice().map(|r| r.invoice_number),
        Some(n(391))
    );
    assert!(l.last_confirmed_invoice().is_none());
}

#[test]
fn at_lifecycle_sc_04_gapless_periods_and_number_step() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();
    let ends = ["2025-01-10", "2025-01-31", "2025-02-14"];
    for d in ["2025-01-02", "2025-01-15", "2025-02-03"] {
        log(&mut l, d, 1.5);
    }

    let mut expected_number = 391;
    for end in ends {
        let p = engine
            .propose_invoice(&mut l, Some(day(end)), day("2025-03-01"))
            .unwrap();
        let previous = l.last_confirmed_invoice().cloned();
        if let Some(prev) = previous {
            assert_eq!(prev.end_date.succ_opt(), Some(p.start_date()));
        }
        assert_eq!(p.number(), n(expected_number));
        engine.confirm_invoice(&mut l, p.number()).unwrap();
        expected_number += 10;
    }
    assert_eq!(l.next_invoice_number().unwrap(), n(421));
    assert_eq!(l.confirmed_invoices().count(), 3);
}

#[test]
fn at_lifecycle_sc_05_cannot_rebill_confirmed_time() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();
    log(&mut l, "2025-01-01", 3.0);
    let p = engine
        .propose_invoice(&mut l, Some(day("2025-01-10")), day("2025-01-10"))
        .unwrap();
    engine.confirm_invoice(&mut l, p.number()).unwrap();

    let err = engine
        .propose_invoice(&mut l, Some(day("2025-01-05")), day("2025-01-20"))
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidRange {
            violation: RangeViolation::RebillsConfirmedPeriod,
            ..
        }
    ));
    assert!(l.last_unconfirmed_invoice().is_none());
}

#[test]
fn at_lifecycle_sc_06_default_end_before_boundary_is_invalid_range() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();
    log(&mut l, "2025-01-01", 3.0);
    let p = engine
        .propose_invoice(&mut l, Some(day("2025-01-31")), day("2025-01-10"))
        .unwrap();
    engine.confirm_invoice(&mut l, p.number()).unwrap();

    // Today is still inside the confirmed period.
    assert!(matches!(
        engine.propose_invoice(&mut l, None, day("2025-01-20")),
        Err(LifecycleError::InvalidRange {
            violation: RangeViolation::EndBeforeStart,
            ..
        })
    ));
}

#[test]
fn at_lifecycle_sc_07_empty_period_is_not_invoiced() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();
    log(&mut l, "2025-01-01", 3.0);
    let p = engine
        .propose_invoice(&mut l, Some(day("2025-01-10")), day("2025-01-10"))
        .unwrap();
    engine.confirm_invoice(&mut l, p.number()).unwrap();

    let err = engine
        .propose_invoice(&mut l, Some(day("2025-01-31")), day("2025-02-01"))
        .unwrap_err();
    match err {
        LifecycleError::NoWorkRecorded { period: Some(period) } => {
            assert_eq!(period.start(), day("2025-01-11"));
            assert_eq!(period.end(), day("2025-01-31"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn at_lifecycle_sc_08_regenerate_reads_confirmed_history_only() {
    let engine = InvoiceLifecycleEngine;
    let mut l = Ledger::new_in_memory();
    log(&mut l, "2025-01-01", 3.0);
    log(&mut l, "2025-01-04", 2.0);
    let p = engine
        .propose_invoice(&mut l, Some(day("2025-01-10")), day("2025-01-10"))
        .unwrap();
    assert!(matches!(
        engine.regenerate_invoice(&l, p.number()),
        Err(LifecycleError::NotFound(_))
    ));
    engine.confirm_invoice(&mut l, p.number()).unwrap();

    let again = engine.regenerate_invoice(&l, n(391)).unwrap();
    assert_eq!(again.entries.len(), 2);
    assert_eq!(again.total_hours, 5.0);
    assert!(!again.entries_changed);

    log(&mut l, "2025-01-04", 6.0);
    let drifted = engine.regenerate_invoice(&l, n(391)).unwrap();
    assert!(drifted.entries_changed);
    assert_eq!(drifted.total_hours, 9.0);
    assert!(l.last_unconfirmed_invoice().is_none());
}

#[test]
fn at_lifecycle_sc_09_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let engine = InvoiceLifecycleEngine;

    {
        let mut l = Ledger::open(&path).unwrap();
        log(&mut l, "2025-01-01", 3.0);
        let p = engine
            .propose_invoice(&mut l, Some(day("2025-01-10")), day("2025-01-10"))
            .unwrap();
        engine.confirm_invoice(&mut l, p.number()).unwrap();
        log(&mut l, "2025-01-13", 4.0);
        engine
            .propose_invoice(&mut l, Some(day("2025-01-20")), day("2025-01-20"))
            .unwrap();
    }

    let mut l = Ledger::open(&path).unwrap();
    assert_eq!(
        l.last_unconfirmed_invoice().map(|r| r.invoice_number),
        Some(n(401))
    );
    let confirmed = engine.confirm_invoice(&mut l, n(401)).unwrap();
    assert_eq!(confirmed.start_date, day("2025-01-11"));
    assert_eq!(Ledger::open(&path).unwrap().next_invoice_number().unwrap(), n(411));
}
