#![forbid(unsafe_code)]

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use hourbook_kernel_contracts::{ContractViolation, InvoiceNumberFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

pub const CONFIG_PATH_ENV: &str = "HOURBOOK_CONFIG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("invalid config: {0}")]
    ContractViolation(#[from] ContractViolation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    pub website: String,
    pub tax_id: String,
}

impl Default for BusinessInfo {
    fn default() -> Self {
        Self {
            name: "Your Business Name".to_string(),
            address: "Your Business Address".to_string(),
            city: "City".to_string(),
            state: "State".to_string(),
            zip: "Zip Code".to_string(),
            country: "Country".to_string(),
            phone: "Phone Number".to_string(),
            email: "your.email@example.com".to_string(),
            website: "www.yourbusiness.com".to_string(),
            tax_id: "Your Tax ID".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub contact_person: String,
    pub email: String,
    pub phone: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "Client Company Name".to_string(),
            address: "Client Address".to_string(),
            city: "Client City".to_string(),
            state: "Client State".to_string(),
            zip: "Client Zip Code".to_string(),
            country: "Client Country".to_string(),
            contact_person: "Client Contact Name".to_string(),
            email: "client.email@example.com".to_string(),
            phone: "Client Phone Number".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentInfo {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub routing_number: String,
    pub iban: String,
    pub swift: String,
    pub payment_terms: String,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub hourly_rate: Decimal,
}

impl Default for PaymentInfo {
    fn default() -> Self {
        Self {
            bank_name: "Your Bank Name".to_string(),
            account_name: "Your Account Name".to_string(),
            account_number: "Your Account Number".to_string(),
            routing_number: "Your Routing Number".to_string(),
            iban: "Your IBAN".to_string(),
            swift: "Your SWIFT/BIC".to_string(),
            payment_terms: "Due within 30 days".to_string(),
            currency: "USD".to_string(),
            hourly_rate: Decimal::new(5000, 2),
        }
    }
}

impl PaymentInfo {
    /// Routing number when present, otherwise SWIFT.
    pub fn routing_or_swift(&self) -> &str {
        if self.routing_number.trim().is_empty() {
            &self.swift
        } else {
            &self.routing_number
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceSettings {
    pub prefix: String,
    pub number_width: usize,
    pub footer_text: String,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            prefix: "INV-".to_string(),
            number_width: 4,
            footer_text: "Thank you for your business!".to_string(),
        }
    }
}

/// Everything the invoice document needs that is not in the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub business: BusinessInfo,
    pub client: ClientInfo,
    pub payment: PaymentInfo,
    pub invoice: InvoiceSettings,
}

impl Settings {
    pub fn invoice_format(&self) -> Result<InvoiceNumberFormat, ContractViolation> {
        InvoiceNumberFormat::new(self.invoice.prefix.clone(), self.invoice.number_width)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payment.hourly_rate.is_sign_negative() {
            return Err(ConfigError::InvalidValue {
                key: "payment.hourly_rate".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if self.payment.currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "payment.currency".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        self.invoice_format()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn default_local() -> Self {
        let path = env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        Self::for_path(path)
    }

    pub fn for_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Settings from disk with defaults filled in for missing keys.
    pub fn load_or_default(&self) -> Result<Settings, ConfigError> {
        let Some(settings) = self.read_document()? else {
            return Ok(Settings::default());
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Writes the default settings if no file exists yet. Returns whether it did.
    pub fn ensure_exists(&self) -> Result<bool, ConfigError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&Settings::default())?;
        info!(path = %self.path.display(), "created default configuration");
        Ok(true)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.ensure_parent_dirs()?;
        let mut serialized = serde_json::to_vec_pretty(settings)?;
        serialized.push(b'\n');
        atomic_write(&self.path, &serialized)?;
        Ok(())
    }

    /// Updates one dotted key, e.g. `payment.hourly_rate`, and saves the result.
    ///
    /// The new value takes the JSON type of the value it replaces. Unknown keys and
    /// values that fail validation leave the file untouched.
    pub fn set_value(&self, key: &str, raw: &str) -> Result<Settings, ConfigError> {
        let current = self.load_or_default()?;
        let mut doc = serde_json::to_value(&current)?;

        let mut slot = &mut doc;
        for part in key.split('.') {
            slot = slot
                .as_object_mut()
                .and_then(|obj| obj.get_mut(part))
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }
        *slot = coerce_like(slot, key, raw)?;

        let updated: Settings = serde_json::from_value(doc)?;
        self.save(&updated)?;
        info!(key, "configuration updated");
        Ok(updated)
    }

    fn ensure_parent_dirs(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn read_document(&self) -> Result<Option<Settings>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Some(Settings::default()));
        }
        Ok(Some(serde_json::from_str::<Settings>(&raw)?))
    }
}

fn coerce_like(existing: &Value, key: &str, raw: &str) -> Result<Value, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    match existing {
        Value::String(_) => Ok(Value::String(raw.to_string())),
        Value::Number(n) if n.is_u64() => raw
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| invalid("expected a whole number")),
        Value::Number(_) => {
            let v = raw
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid("expected a number"))?;
            serde_json::Number::from_f64(v)
                .map(Value::Number)
                .ok_or_else(|| invalid("expected a finite number"))
        }
        Value::Bool(_) => raw
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| invalid("expected true or false")),
        _ => Err(ConfigError::UnknownKey(key.to_string())),
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg_config_home)
            .join("hourbook")
            .join("config.json");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("hourbook")
            .join("config.json");
    }
    PathBuf::from(".hourbook").join("config.json")
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}
