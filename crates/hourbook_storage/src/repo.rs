#![forbid(unsafe_code)]

use chrono::{NaiveDate, NaiveDateTime};
use hourbook_kernel_contracts::{BillingPeriod, InvoiceNumber, InvoiceRecord, WorkEntry};

use crate::ledger::{Ledger, LedgerError};

/// Typed repository interface the invoice lifecycle is written against.
pub trait LedgerRepo {
    fn log_work(
        &mut self,
        date: NaiveDate,
        hours: f64,
        description: Option<String>,
        logged_at: NaiveDateTime,
    ) -> Result<WorkEntry, LedgerError>;

    fn entries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<WorkEntry>;
    fn earliest_entry_date(&self) -> Option<NaiveDate>;
    fn entries_digest(&self, period: BillingPeriod) -> String;

    fn last_confirmed_invoice(&self) -> Option<&InvoiceRecord>;
    fn last_unconfirmed_invoice(&self) -> Option<&InvoiceRecord>;
    fn invoice_by_number(&self, number: InvoiceNumber) -> Option<&InvoiceRecord>;
    fn next_invoice_number(&self) -> Result<InvoiceNumber, LedgerError>;

    fn store_draft(
        &mut self,
        number: InvoiceNumber,
        period: BillingPeriod,
    ) -> Result<InvoiceRecord, LedgerError>;

    fn commit_draft(
        &mut self,
        number: InvoiceNumber,
        period: BillingPeriod,
    ) -> Result<InvoiceRecord, LedgerError>;
}

impl LedgerRepo for Ledger {
    fn log_work(
        &mut self,
        date: NaiveDate,
        hours: f64,
        description: Option<String>,
        logged_at: NaiveDateTime,
    ) -> Result<WorkEntry, LedgerError> {
        Ledger::log_work(self, date, hours, description, logged_at)
    }

    fn entries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<WorkEntry> {
        Ledger::entries_in_range(self, start, end)
    }

    fn earliest_entry_date(&self) -> Option<NaiveDate> {
        Ledger::earliest_entry_date(self)
    }

    fn entries_digest(&self, period: BillingPeriod) -> String {
        Ledger::entries_digest(self, period)
    }

    fn last_confirmed_invoice(&self) -> Option<&InvoiceRecord> {
        Ledger::last_confirmed_invoice(self)
    }

    fn last_unconfirmed_invoice(&self) -> Option<&InvoiceRecord> {
        Ledger::last_unconfirmed_invoice(self)
    }

    fn invoice_by_number(&self, number: InvoiceNumber) -> Option<&InvoiceRecord> {
        Ledger::invoice_by_number(self, number)
    }

    fn next_invoice_number(&self) -> Result<InvoiceNumber, LedgerError> {
        Ledger::next_invoice_number(self)
    }

    fn store_draft(
        &mut self,
        number: InvoiceNumber,
        period: BillingPeriod,
    ) -> Result<InvoiceRecord, LedgerError> {
        Ledger::store_draft(self, number, period)
    }

    fn commit_draft(
        &mut self,
        number: InvoiceNumber,
        period: BillingPeriod,
    ) -> Result<InvoiceRecord, LedgerError> {
        Ledger::commit_draft(self, number, period)
    }
}
