#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use hourbook_kernel_contracts::work::total_hours;
use hourbook_kernel_contracts::{
    BillingPeriod, ContractViolation, InvoiceNumber, InvoiceRecord, SchemaVersion, Validate,
    WorkEntry,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::persist::{default_ledger_path, read_json, write_json};

pub const LEDGER_SCHEMA_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    ContractViolation(#[from] ContractViolation),
    #[error("no unconfirmed invoice draft is pending")]
    NoDraft,
    #[error("pending draft is #{pending}, refusing to commit #{requested}")]
    DraftMismatch {
        pending: InvoiceNumber,
        requested: InvoiceNumber,
    },
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("ledger state is corrupt: {reason}")]
    Corrupt { reason: String },
    #[error("unsupported ledger schema version {found}")]
    UnsupportedSchema { found: u32 },
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk layout. Field names match ledgers written by the earlier tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    work_entries: Vec<WorkEntry>,
    #[serde(default)]
    last_confirmed_invoice: Option<InvoiceRecord>,
    #[serde(default)]
    last_unconfirmed_invoice: Option<InvoiceRecord>,
    #[serde(default)]
    confirmed_invoices: BTreeMap<String, InvoiceRecord>,
}

#[cfg(test)]
impl Default for LedgerDocument {
    fn default() -> Self {
        Self {
            schema_version: LEDGER_SCHEMA_VERSION.0,
            work_entries: Vec::new(),
            last_confirmed_invoice: None,
            last_unconfirmed_invoice: None,
            confirmed_invoices: BTreeMap::new(),
        }
    }
}

fn default_schema_version() -> u32 {
    LEDGER_SCHEMA_VERSION.0
}

#[derive(Debug, Clone, Default, PartialEq)]
struct LedgerState {
    entries: BTreeMap<NaiveDate, WorkEntry>,
    confirmed: BTreeMap<InvoiceNumber, InvoiceRecord>,
    draft: Option<InvoiceRecord>,
}

impl LedgerState {
    fn from_document(doc: LedgerDocument) -> Result<Self, LedgerError> {
        if doc.schema_version != LEDGER_SCHEMA_VERSION.0 {
            return Err(LedgerError::UnsupportedSchema {
                found: doc.schema_version,
            });
        }

        let mut entries = BTreeMap::new();
        for entry in doc.work_entries {
            entry.validate()?;
            let date = entry.date;
            if entries.insert(date, entry).is_some() {
                return Err(corrupt(format!("more than one work entry for {date}")));
            }
        }

        let mut confirmed = BTreeMap::new();
        for (key, record) in doc.confirmed_invoices {
            record.validate()?;
            if key.trim() != record.invoice_number.to_string() {
                return Err(corrupt(format!(
                    "confirmed invoice key {key} holds invoice #{}",
                    record.invoice_number
                )));
            }
            confirmed.insert(record.invoice_number, record);
        }
        check_confirmed_sequence(&confirmed)?;

        let derived_last = confirmed.values().next_back();
        if doc.last_confirmed_invoice.as_ref() != derived_last {
            return Err(corrupt(
                "last confirmed invoice does not match confirmed history".to_string(),
            ));
        }

        if let Some(draft) = &doc.last_unconfirmed_invoice {
            draft.validate()?;
        }

        Ok(Self {
            entries,
            confirmed,
            draft: doc.last_unconfirmed_invoice,
        })
    }

    fn to_document(&self) -> LedgerDocument {
        LedgerDocument {
            schema_version: LEDGER_SCHEMA_VERSION.0,
            work_entries: self.entries.values().cloned().collect(),
            last_confirmed_invoice: self.last_confirmed().cloned(),
            last_unconfirmed_invoice: self.draft.clone(),
            confirmed_invoices: self
                .confirmed
                .iter()
                .map(|(n, r)| (n.to_string(), r.clone()))
                .collect(),
        }
    }

    fn last_confirmed(&self) -> Option<&InvoiceRecord> {
        self.confirmed.values().next_back()
    }

    fn entries_in(&self, start: NaiveDate, end: NaiveDate) -> Vec<WorkEntry> {
        if start > end {
            return Vec::new();
        }
        self.entries.range(start..=end).map(|(_, e)| e.clone()).collect()
    }
}

/// Confirmed periods must chain day-to-day and numbers must advance by the fixed step.
fn check_confirmed_sequence(
    confirmed: &BTreeMap<InvoiceNumber, InvoiceRecord>,
) -> Result<(), LedgerError> {
    let mut prev: Option<&InvoiceRecord> = None;
    for record in confirmed.values() {
        if let Some(p) = prev {
            if p.invoice_number.successor()? != record.invoice_number {
                return Err(corrupt(format!(
                    "invoice #{} does not follow #{}",
                    record.invoice_number, p.invoice_number
                )));
            }
            if p.period()?.next_start()? != record.start_date {
                return Err(corrupt(format!(
                    "invoice #{} does not start the day after #{} ended",
                    record.invoice_number, p.invoice_number
                )));
            }
        }
        prev = Some(record);
    }
    Ok(())
}

fn corrupt(reason: String) -> LedgerError {
    LedgerError::Corrupt { reason }
}

#[derive(Debug, Clone)]
enum Backing {
    InMemory,
    File(PathBuf),
}

/// Durable store of work entries and invoice lifecycle state.
///
/// Every mutation is applied to a copy of the state, persisted, and only then
/// becomes visible, so a failed write leaves the ledger exactly as it was.
/// There is no locking: one writer per ledger file.
#[derive(Debug, Clone)]
pub struct Ledger {
    state: LedgerState,
    backing: Backing,
}

impl Ledger {
    pub fn new_in_memory() -> Self {
        Self {
            state: LedgerState::default(),
            backing: Backing::InMemory,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let state = match read_json::<LedgerDocument>(&path)? {
            Some(doc) => LedgerState::from_document(doc)?,
            None => LedgerState::default(),
        };
        debug!(path = %path.display(), entries = state.entries.len(), "ledger opened");
        Ok(Self {
            state,
            backing: Backing::File(path),
        })
    }

    pub fn open_default() -> Result<Self, LedgerError> {
        Self::open(default_ledger_path())
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::InMemory => None,
            Backing::File(path) => Some(path.as_path()),
        }
    }

    /// Writes the current state even if nothing changed, creating the file on first use.
    pub fn ensure_persisted(&self) -> Result<(), LedgerError> {
        self.persist(&self.state)
    }

    pub fn log_work(
        &mut self,
        date: NaiveDate,
        hours: f64,
        description: Option<String>,
        logged_at: NaiveDateTime,
    ) -> Result<WorkEntry, LedgerError> {
        let entry = WorkEntry::v1(date, hours, description, logged_at)?;
        let replaced = self.mutate(|s| Ok(s.entries.insert(date, entry.clone())))?;
        if let Some(old) = replaced {
            warn!(
                %date,
                old_hours = old.hours,
                new_hours = entry.hours,
                "replaced previous work entry"
            );
        } else {
            info!(%date, hours = entry.hours, "work logged");
        }
        Ok(entry)
    }

    /// Entries with `start <= date <= end`, ascending. Empty when `start > end`.
    pub fn entries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<WorkEntry> {
        self.state.entries_in(start, end)
    }

    pub fn entry_on(&self, date: NaiveDate) -> Option<&WorkEntry> {
        self.state.entries.get(&date)
    }

    pub fn earliest_entry_date(&self) -> Option<NaiveDate> {
        self.state.entries.keys().next().copied()
    }

    pub fn total_hours(&self, entries: &[WorkEntry]) -> f64 {
        total_hours(entries)
    }

    pub fn last_confirmed_invoice(&self) -> Option<&InvoiceRecord> {
        self.state.last_confirmed()
    }

    pub fn last_unconfirmed_invoice(&self) -> Option<&InvoiceRecord> {
        self.state.draft.as_ref()
    }

    pub fn invoice_by_number(&self, number: InvoiceNumber) -> Option<&InvoiceRecord> {
        self.state.confirmed.get(&number)
    }

    pub fn confirmed_invoices(&self) -> impl Iterator<Item = &InvoiceRecord> {
        self.state.confirmed.values()
    }

    pub fn next_invoice_number(&self) -> Result<InvoiceNumber, LedgerError> {
        match self.state.last_confirmed() {
            Some(last) => Ok(last.invoice_number.successor()?),
            None => Ok(InvoiceNumber::BASE),
        }
    }

    /// SHA-256 over the entries currently inside `period`, hex encoded.
    pub fn entries_digest(&self, period: BillingPeriod) -> String {
        digest_entries(&self.state.entries_in(period.start(), period.end()))
    }

    /// Overwrites the draft slot unconditionally.
    pub fn store_draft(
        &mut self,
        number: InvoiceNumber,
        period: BillingPeriod,
    ) -> Result<InvoiceRecord, LedgerError> {
        let record = InvoiceRecord::v1(number, period, Some(self.entries_digest(period)));
        let previous = self.mutate(|s| Ok(s.draft.replace(record.clone())))?;
        if let Some(old) = previous.filter(|old| old.invoice_number != number) {
            warn!(
                abandoned = %old.invoice_number,
                replacement = %number,
                "unconfirmed draft replaced"
            );
        }
        info!(
            number = %number,
            start = %period.start(),
            end = %period.end(),
            "invoice draft stored"
        );
        Ok(record)
    }

    /// Moves the pending draft into confirmed history and clears the draft slot.
    pub fn commit_draft(
        &mut self,
        number: InvoiceNumber,
        period: BillingPeriod,
    ) -> Result<InvoiceRecord, LedgerError> {
        let record = self.mutate(|s| {
            let draft = s.draft.take().ok_or(LedgerError::NoDraft)?;
            if !draft.matches(number, period) {
                return Err(LedgerError::DraftMismatch {
                    pending: draft.invoice_number,
                    requested: number,
                });
            }
            if s.confirmed.contains_key(&number) {
                return Err(LedgerError::DuplicateKey {
                    table: "confirmed_invoices",
                    key: number.to_string(),
                });
            }
            s.confirmed.insert(number, draft.clone());
            Ok(draft)
        })?;
        info!(
            number = %number,
            start = %record.start_date,
            end = %record.end_date,
            "invoice confirmed"
        );
        Ok(record)
    }

    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut LedgerState) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut next = self.state.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        self.state = next;
        Ok(out)
    }

    fn persist(&self, state: &LedgerState) -> Result<(), LedgerError> {
        match &self.backing {
            Backing::InMemory => Ok(()),
            Backing::File(path) => {
                write_json(path, &state.to_document())?;
                debug!(path = %path.display(), "ledger saved");
                Ok(())
            }
        }
    }
}

/// SHA-256 over the entries, each field length-prefixed so free text cannot
/// shift field boundaries.
pub fn digest_entries(entries: &[WorkEntry]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((entries.len() as u64).to_le_bytes());
    for e in entries {
        digest_field(&mut hasher, e.date.to_string().as_bytes());
        digest_field(&mut hasher, &e.hours.to_bits().to_le_bytes());
        digest_field(&mut hasher, e.description_or_empty().as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn digest_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
