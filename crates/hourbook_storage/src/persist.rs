#![forbid(unsafe_code)]

use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ledger::LedgerError;

pub const LEDGER_PATH_ENV: &str = "HOURBOOK_LEDGER_PATH";

pub fn default_ledger_path() -> PathBuf {
    if let Ok(path) = env::var(LEDGER_PATH_ENV) {
        return PathBuf::from(path);
    }
    if let Ok(xdg_data_home) = env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home)
            .join("hourbook")
            .join("ledger.json");
    }
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("hourbook")
            .join("ledger.json");
    }
    PathBuf::from(".hourbook").join("ledger.json")
}

/// Reads a JSON document. Only a missing file is `None`; a blank or
/// unparsable file is `Corrupt`, never an empty document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LedgerError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if raw.trim().is_empty() {
        return Err(LedgerError::Corrupt {
            reason: format!("{} is blank", path.display()),
        });
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| LedgerError::Corrupt {
            reason: format!("{}: {e}", path.display()),
        })
}

pub fn write_json<T: Serialize>(path: &Path, doc: &T) -> Result<(), io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut serialized = serde_json::to_vec_pretty(doc).map_err(io::Error::from)?;
    serialized.push(b'\n');
    atomic_write(path, &serialized)
}

/// Writes `data` next to `path` and renames it into place, so a crash
/// mid-write leaves the previous file intact.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), io::Error> {
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}
