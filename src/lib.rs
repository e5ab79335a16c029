//! Composable Solana client plugins.
//!
//! Instructions are folded into size-bounded transaction messages by a
//! [`app::TransactionPlanner`], then executed against a JSON-RPC node or a
//! local simulator with bounded concurrency. Failures from either backend
//! are normalized into the same [`domain::TransactionFailure`] shapes.

pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use app::{Client, TransactionPlanningConfig, plugins};
pub use domain::{Error, InstructionPlan, TransactionMessage, TransactionPlan};
