#![forbid(unsafe_code)]

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ContractViolation, Validate};

pub const DESCRIPTION_MAX_LEN: usize = 4096;

/// One day of logged work. The date is the entry's identity inside a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEntry {
    pub date: NaiveDate,
    pub hours: f64,
    #[serde(default, deserialize_with = "empty_text_as_none")]
    pub description: Option<String>,
    #[serde(rename = "timestamp")]
    pub logged_at: NaiveDateTime,
}

impl WorkEntry {
    pub fn v1(
        date: NaiveDate,
        hours: f64,
        description: Option<String>,
        logged_at: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let entry = Self {
            date,
            hours,
            description,
            logged_at,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

impl Validate for WorkEntry {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_hours("work_entry.hours", self.hours)?;
        if let Some(d) = &self.description {
            if d.len() > DESCRIPTION_MAX_LEN {
                return Err(ContractViolation::InvalidValue {
                    field: "work_entry.description",
                    reason: "exceeds max length",
                });
            }
        }
        Ok(())
    }
}

pub fn validate_hours(field: &'static str, hours: f64) -> Result<(), ContractViolation> {
    if !hours.is_finite() {
        return Err(ContractViolation::NotFinite { field });
    }
    if hours <= 0.0 {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be > 0",
        });
    }
    Ok(())
}

/// Sum of `hours` over `entries`.
pub fn total_hours<'a, I>(entries: I) -> f64
where
    I: IntoIterator<Item = &'a WorkEntry>,
{
    entries.into_iter().map(|e| e.hours).sum()
}

fn empty_text_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|d| !d.trim().is_empty()))
}
