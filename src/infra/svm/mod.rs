//! Local simulator backend: error normalization and per-transaction executor.

pub mod errors;
pub mod executor;

pub use errors::{instruction_failure_from_svm, transaction_failure_from_svm};
pub use executor::SvmTransactionExecutor;
