#![forbid(unsafe_code)]

use std::path::Path;

use chrono::NaiveDate;
use hourbook_kernel_contracts::work::total_hours;
use hourbook_kernel_contracts::{BillingPeriod, WorkEntry};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::{BusinessInfo, ClientInfo, PaymentInfo, Settings};
use crate::pdf::PdfRenderer;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot express {hours} hours as a decimal amount")]
    Amount { hours: f64 },
    #[error("amount for {hours} hours overflows")]
    AmountOverflow { hours: f64 },
    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("pdf write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLine {
    pub date: NaiveDate,
    pub hours: f64,
    pub description: String,
}

/// Everything a renderer needs; renderers never look at the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub invoice_id: String,
    pub issued_on: NaiveDate,
    pub period: BillingPeriod,
    pub business: BusinessInfo,
    pub client: ClientInfo,
    pub payment: PaymentInfo,
    pub lines: Vec<InvoiceLine>,
    pub total_hours: f64,
    pub hourly_rate: Decimal,
    pub total_amount: Decimal,
    pub footer_text: String,
}

impl InvoiceDocument {
    pub fn build(
        invoice_id: String,
        issued_on: NaiveDate,
        period: BillingPeriod,
        entries: &[WorkEntry],
        settings: &Settings,
    ) -> Result<Self, RenderError> {
        let hours = total_hours(entries);
        let hourly_rate = settings.payment.hourly_rate;
        Ok(Self {
            invoice_id,
            issued_on,
            period,
            business: settings.business.clone(),
            client: settings.client.clone(),
            payment: settings.payment.clone(),
            lines: entries
                .iter()
                .map(|e| InvoiceLine {
                    date: e.date,
                    hours: e.hours,
                    description: e.description_or_empty().to_string(),
                })
                .collect(),
            total_hours: hours,
            hourly_rate,
            total_amount: amount_due(hours, hourly_rate)?,
            footer_text: settings.invoice.footer_text.clone(),
        })
    }
}

/// `hours * rate`, rounded to cents with ties away from zero.
pub fn amount_due(hours: f64, rate: Decimal) -> Result<Decimal, RenderError> {
    let hours_dec = Decimal::try_from(hours).map_err(|_| RenderError::Amount { hours })?;
    let amount = hours_dec
        .checked_mul(rate)
        .ok_or(RenderError::AmountOverflow { hours })?;
    Ok(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

pub trait Renderer {
    fn render(&self, doc: &InvoiceDocument) -> Result<Vec<u8>, RenderError>;
    fn file_extension(&self) -> &'static str;
}

#[derive(Debug, Default, Clone)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&self, doc: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        let mut out = layout_lines(doc).join("\n");
        out.push('\n');
        Ok(out.into_bytes())
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}

/// `.pdf` gets the PDF renderer, anything else plain text.
pub fn renderer_for_path(path: &Path) -> Box<dyn Renderer> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Box::new(PdfRenderer::default())
    } else {
        Box::new(TextRenderer)
    }
}

const RULE_WIDTH: usize = 64;

/// Fixed-width layout shared by the text and PDF renderers.
pub fn layout_lines(doc: &InvoiceDocument) -> Vec<String> {
    let mut lines = Vec::new();
    let b = &doc.business;
    let c = &doc.client;
    let p = &doc.payment;

    lines.push("INVOICE".to_string());
    lines.push("=".repeat(RULE_WIDTH));
    lines.push(String::new());
    lines.push(format!("Invoice Number:   {}", doc.invoice_id));
    lines.push(format!("Invoice Date:     {}", doc.issued_on));
    lines.push(format!(
        "Period:           {} to {}",
        doc.period.start(),
        doc.period.end()
    ));
    lines.push(String::new());

    lines.push("FROM:".to_string());
    lines.push(format!("  {}", b.name));
    lines.push(format!("  {}", b.address));
    lines.push(format!("  {}, {} {}", b.city, b.state, b.zip));
    lines.push(format!("  {}", b.country));
    lines.push(format!("  Phone: {}", b.phone));
    lines.push(format!("  Email: {}", b.email));
    if !b.tax_id.trim().is_empty() {
        lines.push(format!("  Tax ID: {}", b.tax_id));
    }
    lines.push(String::new());
    lines.push("TO:".to_string());
    lines.push(format!("  {}", c.name));
    lines.push(format!("  {}", c.address));
    lines.push(format!("  {}, {} {}", c.city, c.state, c.zip));
    lines.push(format!("  {}", c.country));
    lines.push(format!("  Contact: {}", c.contact_person));
    lines.push(format!("  Email: {}", c.email));
    lines.push(String::new());

    lines.push("WORK SUMMARY".to_string());
    lines.push("-".repeat(RULE_WIDTH));
    lines.push(format!("{:<10}  {:>7}  {}", "Date", "Hours", "Description"));
    for line in &doc.lines {
        lines.push(format!(
            "{:<10}  {:>7.2}  {}",
            line.date.to_string(),
            line.hours,
            line.description
        ));
    }
    lines.push("-".repeat(RULE_WIDTH));
    lines.push(format!("{:<10}  {:>7.2}", "TOTAL", doc.total_hours));
    lines.push(String::new());

    lines.push("PAYMENT DETAILS".to_string());
    lines.push("-".repeat(RULE_WIDTH));
    lines.push(format!(
        "Hourly Rate:      {} {:.2}",
        p.currency, doc.hourly_rate
    ));
    lines.push(format!(
        "Total Amount Due: {} {:.2}",
        p.currency, doc.total_amount
    ));
    lines.push(format!("Payment Terms:    {}", p.payment_terms));
    lines.push(format!("Bank:             {}", p.bank_name));
    lines.push(format!("Account Name:     {}", p.account_name));
    lines.push(format!("Account Number:   {}", p.account_number));
    if !p.iban.trim().is_empty() {
        lines.push(format!("IBAN:             {}", p.iban));
    }
    lines.push(format!("Routing/SWIFT:    {}", p.routing_or_swift()));

    if !doc.footer_text.trim().is_empty() {
        lines.push(String::new());
        lines.push(doc.footer_text.clone());
    }
    lines
}
