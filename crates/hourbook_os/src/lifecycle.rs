#![forbid(unsafe_code)]

use std::fmt;

use chrono::{Days, NaiveDate};
use hourbook_kernel_contracts::work::total_hours;
use hourbook_kernel_contracts::{
    BillingPeriod, ContractViolation, InvoiceNumber, InvoiceRecord, WorkEntry,
};
use hourbook_storage::{LedgerError, LedgerRepo};
use tracing::{info, warn};

/// Look-ahead applied to a first invoice whose start is not in the past.
pub const FIRST_INVOICE_LOOKAHEAD_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeViolation {
    EndBeforeStart,
    RebillsConfirmedPeriod,
    BreaksContinuity,
}

impl fmt::Display for RangeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndBeforeStart => write!(f, "end date is before start date"),
            Self::RebillsConfirmedPeriod => {
                write!(f, "end date falls inside an already confirmed period")
            }
            Self::BreaksContinuity => {
                write!(f, "period does not start the day after the last confirmed invoice")
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(ContractViolation),
    #[error("{}", no_work_message(.period))]
    NoWorkRecorded { period: Option<BillingPeriod> },
    #[error("invalid billing range {start} to {end}: {violation}")]
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
        violation: RangeViolation,
    },
    #[error("no unconfirmed invoice draft is pending")]
    NoDraft,
    #[error("invoice #{requested} is not the pending draft #{pending}")]
    NumberMismatch {
        pending: InvoiceNumber,
        requested: InvoiceNumber,
    },
    #[error("invoice #{0} is not a confirmed invoice")]
    NotFound(InvoiceNumber),
    #[error(transparent)]
    Storage(LedgerError),
}

fn no_work_message(period: &Option<BillingPeriod>) -> String {
    match period {
        Some(p) => format!("no work recorded between {} and {}", p.start(), p.end()),
        None => "no work recorded".to_string(),
    }
}

impl From<ContractViolation> for LifecycleError {
    fn from(v: ContractViolation) -> Self {
        LifecycleError::Validation(v)
    }
}

impl From<LedgerError> for LifecycleError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ContractViolation(v) => LifecycleError::Validation(v),
            LedgerError::NoDraft => LifecycleError::NoDraft,
            LedgerError::DraftMismatch { pending, requested } => {
                LifecycleError::NumberMismatch { pending, requested }
            }
            other => LifecycleError::Storage(other),
        }
    }
}

/// Where the ledger stands in the current billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    NoHistory,
    AwaitingFirstDraft,
    DraftPending,
    Confirmed,
}

/// A computed but not yet stored invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoicePlan {
    pub number: InvoiceNumber,
    pub period: BillingPeriod,
    pub entries: Vec<WorkEntry>,
}

impl InvoicePlan {
    pub fn total_hours(&self) -> f64 {
        total_hours(&self.entries)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceProposal {
    pub record: InvoiceRecord,
    pub entries: Vec<WorkEntry>,
    pub total_hours: f64,
}

impl InvoiceProposal {
    pub fn number(&self) -> InvoiceNumber {
        self.record.invoice_number
    }

    pub fn start_date(&self) -> NaiveDate {
        self.record.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.record.end_date
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegeneratedInvoice {
    pub record: InvoiceRecord,
    pub entries: Vec<WorkEntry>,
    pub total_hours: f64,
    /// Entries inside the period no longer match what was confirmed.
    pub entries_changed: bool,
}

/// Billing-period sequencing and the confirm-in-order protocol over a ledger.
#[derive(Debug, Default, Clone)]
pub struct InvoiceLifecycleEngine;

impl InvoiceLifecycleEngine {
    pub fn phase<R: LedgerRepo>(&self, repo: &R) -> LifecyclePhase {
        if repo.last_unconfirmed_invoice().is_some() {
            LifecyclePhase::DraftPending
        } else if repo.last_confirmed_invoice().is_some() {
            LifecyclePhase::Confirmed
        } else if repo.earliest_entry_date().is_some() {
            LifecyclePhase::AwaitingFirstDraft
        } else {
            LifecyclePhase::NoHistory
        }
    }

    /// Day after the last confirmed period, or the earliest logged day.
    pub fn next_start_date<R: LedgerRepo>(&self, repo: &R) -> Result<NaiveDate, LifecycleError> {
        match repo.last_confirmed_invoice() {
            Some(last) => Ok(last.period()?.next_start()?),
            None => repo
                .earliest_entry_date()
                .ok_or(LifecycleError::NoWorkRecorded { period: None }),
        }
    }

    /// Computes the next invoice without touching the ledger.
    pub fn plan_invoice<R: LedgerRepo>(
        &self,
        repo: &R,
        requested_end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<InvoicePlan, LifecycleError> {
        let has_history = repo.last_confirmed_invoice().is_some();
        let start = self.next_start_date(repo)?;

        let end = match requested_end {
            Some(end) => end,
            None if !has_history && start >= today => start
                .checked_add_days(Days::new(FIRST_INVOICE_LOOKAHEAD_DAYS))
                .ok_or(ContractViolation::InvalidValue {
                    field: "billing_period.end",
                    reason: "look-ahead overflows the calendar",
                })?,
            None => today,
        };

        if start > end {
            let violation = if has_history && requested_end.is_some() {
                RangeViolation::RebillsConfirmedPeriod
            } else {
                RangeViolation::EndBeforeStart
            };
            return Err(LifecycleError::InvalidRange {
                start,
                end,
                violation,
            });
        }
        let period = BillingPeriod::new(start, end)?;

        let entries = repo.entries_in_range(start, end);
        if entries.is_empty() {
            return Err(LifecycleError::NoWorkRecorded {
                period: Some(period),
            });
        }

        Ok(InvoicePlan {
            number: repo.next_invoice_number()?,
            period,
            entries,
        })
    }

    /// Stores `plan` as the single pending draft, abandoning any earlier one.
    pub fn store_plan<R: LedgerRepo>(
        &self,
        repo: &mut R,
        plan: InvoicePlan,
    ) -> Result<InvoiceProposal, LifecycleError> {
        let record = repo.store_draft(plan.number, plan.period)?;
        let total_hours = plan.total_hours();
        Ok(InvoiceProposal {
            record,
            entries: plan.entries,
            total_hours,
        })
    }

    pub fn propose_invoice<R: LedgerRepo>(
        &self,
        repo: &mut R,
        requested_end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<InvoiceProposal, LifecycleError> {
        let plan = self.plan_invoice(repo, requested_end, today)?;
        self.store_plan(repo, plan)
    }

    /// Period and entries of a confirmed invoice. Drafts are never regenerated.
    pub fn regenerate_invoice<R: LedgerRepo>(
        &self,
        repo: &R,
        number: InvoiceNumber,
    ) -> Result<RegeneratedInvoice, LifecycleError> {
        let record = repo
            .invoice_by_number(number)
            .cloned()
            .ok_or(LifecycleError::NotFound(number))?;
        let period = record.period()?;
        let entries = repo.entries_in_range(period.start(), period.end());

        let entries_changed = record
            .entries_digest
            .as_deref()
            .is_some_and(|d| d != repo.entries_digest(period));
        if entries_changed {
            warn!(
                number = %number,
                "work entries changed since this invoice was confirmed"
            );
        }

        Ok(RegeneratedInvoice {
            total_hours: total_hours(&entries),
            record,
            entries,
            entries_changed,
        })
    }

    /// Confirms the pending draft. Only the most recent draft's number is accepted.
    pub fn confirm_invoice<R: LedgerRepo>(
        &self,
        repo: &mut R,
        number: InvoiceNumber,
    ) -> Result<InvoiceRecord, LifecycleError> {
        let draft = repo
            .last_unconfirmed_invoice()
            .cloned()
            .ok_or(LifecycleError::NoDraft)?;
        if draft.invoice_number != number {
            return Err(LifecycleError::NumberMismatch {
                pending: draft.invoice_number,
                requested: number,
            });
        }

        let period = draft.period()?;
        if let Some(last) = repo.last_confirmed_invoice() {
            if last.period()?.next_start()? != period.start() {
                return Err(LifecycleError::InvalidRange {
                    start: period.start(),
                    end: period.end(),
                    violation: RangeViolation::BreaksContinuity,
                });
            }
        }
        if let Some(digest) = draft.entries_digest.as_deref() {
            if digest != repo.entries_digest(period) {
                warn!(
                    number = %number,
                    "work entries changed since the draft was generated"
                );
            }
        }

        let record = repo.commit_draft(number, period)?;
        info!(
            number = %record.invoice_number,
            next_start = %period.next_start()?,
            "billing period closed"
        );
        Ok(record)
    }
}
