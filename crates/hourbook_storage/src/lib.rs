#![forbid(unsafe_code)]

pub mod ledger;
pub mod persist;
pub mod repo;

pub use ledger::{Ledger, LedgerError};
pub use repo::LedgerRepo;
