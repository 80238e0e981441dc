#![forbid(unsafe_code)]

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ContractViolation, Validate};

/// Canonical invoice identifier. Display prefixes never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvoiceNumber(u64);

impl InvoiceNumber {
    /// Number assigned to the first invoice of an empty ledger.
    pub const BASE: InvoiceNumber = InvoiceNumber(391);
    /// Distance between consecutive confirmed invoice numbers.
    pub const STEP: u64 = 10;

    pub fn new(v: u64) -> Result<Self, ContractViolation> {
        if v == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "invoice_number",
                reason: "must be > 0",
            });
        }
        Ok(Self(v))
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn successor(self) -> Result<Self, ContractViolation> {
        self.0
            .checked_add(Self::STEP)
            .map(Self)
            .ok_or(ContractViolation::InvalidValue {
                field: "invoice_number",
                reason: "numbering space exhausted",
            })
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for InvoiceNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

// Older ledgers stored the number as a decimal string.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredInvoiceNumber {
    Int(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for InvoiceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match StoredInvoiceNumber::deserialize(deserializer)? {
            StoredInvoiceNumber::Int(v) => v,
            StoredInvoiceNumber::Text(s) => parse_digits(s.trim())
                .ok_or_else(|| serde::de::Error::custom("invoice number must be digits"))?,
        };
        InvoiceNumber::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Inclusive date range covered by one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl BillingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ContractViolation> {
        let p = Self { start, end };
        p.validate()?;
        Ok(p)
    }

    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// First day of the period that would follow this one.
    pub fn next_start(&self) -> Result<NaiveDate, ContractViolation> {
        self.end.succ_opt().ok_or(ContractViolation::InvalidValue {
            field: "billing_period.end",
            reason: "has no following day",
        })
    }
}

impl Validate for BillingPeriod {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.start > self.end {
            return Err(ContractViolation::InvalidValue {
                field: "billing_period",
                reason: "start must be <= end",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice_number: InvoiceNumber,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// SHA-256 over the entries inside the period when the draft was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_digest: Option<String>,
}

impl InvoiceRecord {
    pub fn v1(
        invoice_number: InvoiceNumber,
        period: BillingPeriod,
        entries_digest: Option<String>,
    ) -> Self {
        Self {
            invoice_number,
            start_date: period.start(),
            end_date: period.end(),
            entries_digest,
        }
    }

    pub fn period(&self) -> Result<BillingPeriod, ContractViolation> {
        BillingPeriod::new(self.start_date, self.end_date)
    }

    /// Same number and same dates. The digest is not part of the identity.
    pub fn matches(&self, number: InvoiceNumber, period: BillingPeriod) -> bool {
        self.invoice_number == number
            && self.start_date == period.start()
            && self.end_date == period.end()
    }
}

impl Validate for InvoiceRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.period().map(|_| ())
    }
}

/// Cosmetic rendering of invoice numbers, e.g. `INV-0391`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNumberFormat {
    prefix: String,
    width: usize,
}

impl InvoiceNumberFormat {
    pub const MAX_WIDTH: usize = 12;

    pub fn new(prefix: impl Into<String>, width: usize) -> Result<Self, ContractViolation> {
        let f = Self {
            prefix: prefix.into(),
            width,
        };
        f.validate()?;
        Ok(f)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn format(&self, number: InvoiceNumber) -> String {
        format!("{}{:0width$}", self.prefix, number.get(), width = self.width)
    }

    /// Accepts a bare number or the prefixed display form. Anything else is rejected.
    pub fn parse(&self, raw: &str) -> Result<InvoiceNumber, ContractViolation> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "invoice_number",
                reason: "must not be empty",
            });
        }
        let digits = if !self.prefix.is_empty() {
            raw.strip_prefix(self.prefix.as_str()).unwrap_or(raw)
        } else {
            raw
        };
        let value = parse_digits(digits).ok_or(ContractViolation::InvalidValue {
            field: "invoice_number",
            reason: "must be digits, optionally after the configured prefix",
        })?;
        InvoiceNumber::new(value)
    }
}

impl Default for InvoiceNumberFormat {
    fn default() -> Self {
        Self {
            prefix: "INV-".to_string(),
            width: 4,
        }
    }
}

impl Validate for InvoiceNumberFormat {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.width > Self::MAX_WIDTH {
            return Err(ContractViolation::InvalidRange {
                field: "invoice_number_format.width",
                min: 0.0,
                max: Self::MAX_WIDTH as f64,
                got: self.width as f64,
            });
        }
        if self.prefix.chars().last().is_some_and(|c| c.is_ascii_digit()) {
            return Err(ContractViolation::InvalidValue {
                field: "invoice_number_format.prefix",
                reason: "must not end with a digit",
            });
        }
        Ok(())
    }
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
