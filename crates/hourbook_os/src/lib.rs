#![forbid(unsafe_code)]

pub mod lifecycle;
pub mod summary;
pub mod workflow;

pub use lifecycle::{InvoiceLifecycleEngine, LifecycleError, LifecyclePhase};
pub use workflow::{InvoiceWorkflow, WorkflowError};
