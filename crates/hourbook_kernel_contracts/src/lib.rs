#![forbid(unsafe_code)]

pub mod common;
pub mod invoice;
pub mod work;

pub use common::{ContractViolation, SchemaVersion, Validate};
pub use invoice::{BillingPeriod, InvoiceNumber, InvoiceNumberFormat, InvoiceRecord};
pub use work::WorkEntry;
