//! Error types for planning and executing transactions.

use serde::Serialize;
use thiserror::Error;

use super::codes::{InstructionErrorCode, RpcErrorCode, TransactionErrorCode};
use super::types::TransactionPlanResult;

/// Main error type for the crate
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    #[error("Transaction failed: {0}")]
    Transaction(#[from] TransactionFailure),

    /// Raised while estimating compute units, before anything was sent
    #[error("Transaction simulation failed: {failure}")]
    Simulation {
        failure: TransactionFailure,
        units_consumed: Option<u64>,
        logs: Vec<String>,
    },

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcFailure),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Error normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    /// At least one transaction of the plan failed. `result` holds the whole
    /// result tree, `cause` the error of the first failed transaction.
    #[error("Failed to execute transaction plan: {cause}")]
    FailedToExecuteTransactionPlan {
        result: Box<TransactionPlanResult>,
        #[source]
        cause: Box<Error>,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Expected a single transaction result, got a {0} result")]
    ExpectedSingleTransactionResult(&'static str),
}

impl Error {
    /// Turn a failed estimation simulation into the transaction error it wraps.
    /// Every other error passes through unchanged.
    pub fn unwrap_simulation_error(self) -> Self {
        match self {
            Error::Simulation { failure, .. } => Error::Transaction(failure),
            other => other,
        }
    }

    /// The normalized transaction failure behind this error, if any
    pub fn transaction_failure(&self) -> Option<&TransactionFailure> {
        match self {
            Error::Transaction(failure) => Some(failure),
            Error::Simulation { failure, .. } => Some(failure),
            Error::FailedToExecuteTransactionPlan { cause, .. } => cause.transaction_failure(),
            _ => None,
        }
    }

    /// The partial result tree carried by an execution failure
    pub fn transaction_plan_result(&self) -> Option<&TransactionPlanResult> {
        match self {
            Error::FailedToExecuteTransactionPlan { result, .. } => Some(result),
            _ => None,
        }
    }

    /// The wrapped error of an execution failure
    pub fn cause(&self) -> Option<&Error> {
        match self {
            Error::FailedToExecuteTransactionPlan { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Check whether this error, or the failure it wraps, has the given code
    pub fn is_transaction_error(&self, code: TransactionErrorCode) -> bool {
        self.transaction_failure()
            .is_some_and(|failure| failure.is(code))
    }
}

/// Configuration errors, raised when a plugin is installed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No payer configured: pass one in the config or install the payer plugin first")]
    MissingPayer,

    #[error("No {0} backend installed on the client")]
    MissingBackend(&'static str),

    #[error("Max concurrency must be a positive integer, got {0}")]
    InvalidMaxConcurrency(usize),

    #[error("The {0} capability is not installed on the client")]
    MissingCapability(&'static str),

    #[error("Invalid payer key: {0}")]
    InvalidPayerKey(String),
}

/// Errors raised while turning instructions into transaction messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("Instruction plan is empty")]
    EmptyInstructionPlan,

    #[error(
        "Message cannot accommodate the plan: {num_bytes_required} bytes required, \
         {num_bytes_available} available"
    )]
    MessageCannotAccommodatePlan {
        num_bytes_required: usize,
        num_bytes_available: usize,
    },

    #[error("Expected a single transaction message, the plan produced {count}")]
    ExpectedSingleTransactionPlan { count: usize },

    #[error("Invalid transaction message: {0}")]
    InvalidMessage(String),
}

/// Transport-level RPC failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcFailure {
    #[error("JSON-RPC error {code}: {message}")]
    Server { code: RpcErrorCode, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed RPC response: {0}")]
    Response(String),
}

/// Backend error shapes that could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("Unknown transaction error ordinal {0}")]
    UnknownTransactionErrorOrdinal(u32),

    #[error("Unknown instruction error ordinal {0}")]
    UnknownInstructionErrorOrdinal(u32),

    #[error("Unrecognized error shape: {0}")]
    UnrecognizedShape(String),
}

// ============================================================================
// NORMALIZED TRANSACTION FAILURES
// ============================================================================

/// A transaction failure, independent of the backend that reported it
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum TransactionFailure {
    #[error("{0}")]
    Fieldless(TransactionErrorCode),

    #[error("Error processing instruction {index}: {error}")]
    InstructionError { index: u8, error: InstructionFailure },

    #[error("Transaction contains a duplicate instruction ({index}) that is not allowed")]
    DuplicateInstruction { index: u8 },

    #[error("Transaction results in an account ({account_index}) with insufficient funds for rent")]
    InsufficientFundsForRent { account_index: u8 },

    #[error(
        "Execution of the program referenced by account at index {account_index} \
         is temporarily restricted"
    )]
    ProgramExecutionTemporarilyRestricted { account_index: u8 },
}

impl TransactionFailure {
    /// Network name of the failure
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fieldless(code) => code.name(),
            Self::InstructionError { .. } => "InstructionError",
            Self::DuplicateInstruction { .. } => "DuplicateInstruction",
            Self::InsufficientFundsForRent { .. } => "InsufficientFundsForRent",
            Self::ProgramExecutionTemporarilyRestricted { .. } => {
                "ProgramExecutionTemporarilyRestricted"
            }
        }
    }

    pub fn is(&self, code: TransactionErrorCode) -> bool {
        matches!(self, Self::Fieldless(own) if *own == code)
    }

    /// Index and error of the failing instruction
    pub fn instruction_error(&self) -> Option<(u8, &InstructionFailure)> {
        match self {
            Self::InstructionError { index, error } => Some((*index, error)),
            _ => None,
        }
    }

    /// Custom program error code, when an instruction returned one
    pub fn custom_program_error(&self) -> Option<u32> {
        match self.instruction_error() {
            Some((_, InstructionFailure::Custom(code))) => Some(*code),
            _ => None,
        }
    }
}

/// An instruction failure nested in [`TransactionFailure::InstructionError`]
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum InstructionFailure {
    #[error("{0}")]
    Fieldless(InstructionErrorCode),

    #[error("custom program error: {0:#x}")]
    Custom(u32),

    #[error("Failed to serialize or deserialize account data: {0}")]
    BorshIoError(String),
}

impl InstructionFailure {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fieldless(code) => code.name(),
            Self::Custom(_) => "Custom",
            Self::BorshIoError(_) => "BorshIoError",
        }
    }
}
