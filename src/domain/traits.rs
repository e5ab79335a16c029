//! Domain traits defining contracts for backends and executors.

use async_trait::async_trait;
use solana_sdk::{hash::Hash, signature::Signature, transaction::VersionedTransaction};
use tokio_util::sync::CancellationToken;

use super::error::{Error, TransactionFailure};
use super::message::TransactionMessage;
use super::types::{
    SingleTransactionPlanResult, SvmTransactionMetadata, TransactionPlan, TransactionPlanResult,
};

// ============================================================================
// RPC BACKEND
// ============================================================================

/// Outcome of a transaction simulation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcSimulation {
    /// Normalized failure, when the simulated transaction failed
    pub err: Option<TransactionFailure>,
    pub units_consumed: Option<u64>,
    pub logs: Vec<String>,
}

/// JSON-RPC operations needed to execute transactions.
/// Implementations normalize every error before returning it.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Fetch a recent blockhash to use as transaction lifetime
    async fn get_latest_blockhash(&self) -> Result<Hash, Error>;

    /// Simulate without signature verification, replacing the blockhash
    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<RpcSimulation, Error>;

    /// Send a transaction and wait until the configured commitment is reached
    async fn send_and_confirm_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> Result<Signature, Error>;
}

// ============================================================================
// LOCAL SIMULATOR BACKEND
// ============================================================================

/// Transaction error as reported by the local simulator: payload-less
/// variants are identified by their ordinal in the native enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvmTransactionError {
    Fieldless(u32),
    InstructionError { index: u8, error: SvmInstructionError },
    DuplicateInstruction(u8),
    InsufficientFundsForRent { account_index: u8 },
    ProgramExecutionTemporarilyRestricted { account_index: u8 },
}

/// Instruction error as reported by the local simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvmInstructionError {
    Fieldless(u32),
    Custom(u32),
    BorshIoError(String),
}

/// A transaction the simulator processed and rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvmFailedTransaction {
    pub err: SvmTransactionError,
    pub meta: SvmTransactionMetadata,
}

/// In-process Solana virtual machine. Calls are synchronous.
pub trait LocalSvm: Send + Sync {
    fn latest_blockhash(&self) -> Hash;

    /// Process a transaction immediately
    fn send_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<SvmTransactionMetadata, SvmFailedTransaction>;
}

// ============================================================================
// EXECUTORS
// ============================================================================

/// Executes one planned message. Never fails outright: failures are
/// reported in the returned result.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    async fn execute_transaction(&self, message: TransactionMessage) -> SingleTransactionPlanResult;
}

/// Executes a whole transaction plan
#[async_trait]
pub trait TransactionPlanExecutor: Send + Sync {
    /// Returns the result tree when every transaction succeeded, or
    /// [`Error::FailedToExecuteTransactionPlan`] carrying it otherwise.
    async fn execute(
        &self,
        plan: &TransactionPlan,
        cancel: &CancellationToken,
    ) -> Result<TransactionPlanResult, Error>;
}
