#![forbid(unsafe_code)]

use chrono::{NaiveDate, NaiveDateTime};
use hourbook_engines::config::Settings;
use hourbook_engines::render::{InvoiceDocument, RenderError, Renderer};
use hourbook_kernel_contracts::{
    BillingPeriod, ContractViolation, InvoiceNumber, InvoiceNumberFormat, InvoiceRecord,
    WorkEntry,
};
use hourbook_storage::LedgerRepo;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::lifecycle::{InvoiceLifecycleEngine, LifecycleError, LifecyclePhase};
use crate::summary::{summarize, SummaryPeriod, WorkSummary};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invoice rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("invalid invoice settings: {0}")]
    Settings(ContractViolation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedInvoice {
    pub number: InvoiceNumber,
    pub invoice_id: String,
    pub period: BillingPeriod,
    pub entry_count: usize,
    pub total_hours: f64,
    pub total_amount: Decimal,
    pub entries_changed: bool,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedInvoice {
    pub record: InvoiceRecord,
    pub invoice_id: String,
    pub next_start: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStatus {
    pub phase: LifecyclePhase,
    pub earliest_entry: Option<NaiveDate>,
    pub last_confirmed: Option<InvoiceRecord>,
    pub pending_draft: Option<InvoiceRecord>,
    pub next_start: Option<NaiveDate>,
    pub next_number: InvoiceNumber,
}

/// Ledger plus settings: the user-facing invoice operations.
///
/// Generation renders before the draft is stored, so a render failure leaves
/// the ledger untouched.
pub struct InvoiceWorkflow<R> {
    ledger: R,
    settings: Settings,
    format: InvoiceNumberFormat,
    engine: InvoiceLifecycleEngine,
}

impl<R: LedgerRepo> InvoiceWorkflow<R> {
    pub fn new(ledger: R, settings: Settings) -> Result<Self, WorkflowError> {
        let format = settings.invoice_format().map_err(WorkflowError::Settings)?;
        Ok(Self {
            ledger,
            settings,
            format,
            engine: InvoiceLifecycleEngine,
        })
    }

    pub fn ledger(&self) -> &R {
        &self.ledger
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_ledger(self) -> R {
        self.ledger
    }

    pub fn invoice_id(&self, number: InvoiceNumber) -> String {
        self.format.format(number)
    }

    /// Accepts `391`, `INV-0391` and similar.
    pub fn parse_number(&self, raw: &str) -> Result<InvoiceNumber, WorkflowError> {
        self.format
            .parse(raw)
            .map_err(|v| WorkflowError::Lifecycle(LifecycleError::Validation(v)))
    }

    pub fn log_work(
        &mut self,
        date: NaiveDate,
        hours: f64,
        description: Option<String>,
        logged_at: NaiveDateTime,
    ) -> Result<WorkEntry, WorkflowError> {
        self.ledger
            .log_work(date, hours, description, logged_at)
            .map_err(|e| WorkflowError::Lifecycle(e.into()))
    }

    pub fn summary(
        &self,
        period: SummaryPeriod,
        today: NaiveDate,
    ) -> Result<WorkSummary, WorkflowError> {
        summarize(&self.ledger, period, today)
            .map_err(|v| WorkflowError::Lifecycle(LifecycleError::Validation(v)))
    }

    pub fn generate(
        &mut self,
        requested_end: Option<NaiveDate>,
        today: NaiveDate,
        renderer: &dyn Renderer,
    ) -> Result<RenderedInvoice, WorkflowError> {
        let plan = self.engine.plan_invoice(&self.ledger, requested_end, today)?;
        let invoice_id = self.invoice_id(plan.number);
        let doc = InvoiceDocument::build(
            invoice_id.clone(),
            today,
            plan.period,
            &plan.entries,
            &self.settings,
        )?;
        let bytes = renderer.render(&doc)?;
        debug!(bytes = bytes.len(), format = renderer.file_extension(), "invoice rendered");

        let proposal = self.engine.store_plan(&mut self.ledger, plan)?;
        info!(
            invoice = %invoice_id,
            start = %proposal.start_date(),
            end = %proposal.end_date(),
            "invoice draft generated"
        );
        Ok(RenderedInvoice {
            number: proposal.number(),
            invoice_id,
            period: doc.period,
            entry_count: proposal.entries.len(),
            total_hours: proposal.total_hours,
            total_amount: doc.total_amount,
            entries_changed: false,
            bytes,
        })
    }

    /// Re-renders a confirmed invoice for its stored period. Never mutates the ledger.
    pub fn regenerate(
        &self,
        raw_number: &str,
        today: NaiveDate,
        renderer: &dyn Renderer,
    ) -> Result<RenderedInvoice, WorkflowError> {
        let number = self.parse_number(raw_number)?;
        let regenerated = self.engine.regenerate_invoice(&self.ledger, number)?;
        let period = regenerated.record.period().map_err(LifecycleError::from)?;
        let invoice_id = self.invoice_id(number);
        let doc = InvoiceDocument::build(
            invoice_id.clone(),
            today,
            period,
            &regenerated.entries,
            &self.settings,
        )?;
        Ok(RenderedInvoice {
            number,
            invoice_id,
            period,
            entry_count: regenerated.entries.len(),
            total_hours: regenerated.total_hours,
            total_amount: doc.total_amount,
            entries_changed: regenerated.entries_changed,
            bytes: renderer.render(&doc)?,
        })
    }

    pub fn confirm(&mut self, raw_number: &str) -> Result<ConfirmedInvoice, WorkflowError> {
        let number = self.parse_number(raw_number)?;
        let record = self.engine.confirm_invoice(&mut self.ledger, number)?;
        let next_start = record
            .period()
            .and_then(|p| p.next_start())
            .map_err(LifecycleError::from)?;
        Ok(ConfirmedInvoice {
            invoice_id: self.invoice_id(number),
            record,
            next_start,
        })
    }

    pub fn status(&self) -> Result<LedgerStatus, WorkflowError> {
        let next_start = match self.engine.next_start_date(&self.ledger) {
            Ok(d) => Some(d),
            Err(LifecycleError::NoWorkRecorded { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(LedgerStatus {
            phase: self.engine.phase(&self.ledger),
            earliest_entry: self.ledger.earliest_entry_date(),
            last_confirmed: self.ledger.last_confirmed_invoice().cloned(),
            pending_draft: self.ledger.last_unconfirmed_invoice().cloned(),
            next_start,
            next_number: self
                .ledger
                .next_invoice_number()
                .map_err(LifecycleError::from)?,
        })
    }
}
