//! Normalization of local simulator errors.
//!
//! The simulator identifies payload-less errors by their position in the
//! native enums. The tables below list the codes in that order.

use crate::domain::{
    InstructionErrorCode, InstructionFailure, NormalizationError, SvmInstructionError,
    SvmTransactionError, TransactionErrorCode, TransactionFailure,
};

static TRANSACTION_ERROR_ORDINALS: [TransactionErrorCode; 35] = [
    TransactionErrorCode::AccountInUse,
    TransactionErrorCode::AccountLoadedTwice,
    TransactionErrorCode::AccountNotFound,
    TransactionErrorCode::ProgramAccountNotFound,
    TransactionErrorCode::InsufficientFundsForFee,
    TransactionErrorCode::InvalidAccountForFee,
    TransactionErrorCode::AlreadyProcessed,
    TransactionErrorCode::BlockhashNotFound,
    TransactionErrorCode::CallChainTooDeep,
    TransactionErrorCode::MissingSignatureForFee,
    TransactionErrorCode::InvalidAccountIndex,
    TransactionErrorCode::SignatureFailure,
    TransactionErrorCode::InvalidProgramForExecution,
    TransactionErrorCode::SanitizeFailure,
    TransactionErrorCode::ClusterMaintenance,
    TransactionErrorCode::AccountBorrowOutstanding,
    TransactionErrorCode::WouldExceedMaxBlockCostLimit,
    TransactionErrorCode::UnsupportedVersion,
    TransactionErrorCode::InvalidWritableAccount,
    TransactionErrorCode::WouldExceedMaxAccountCostLimit,
    TransactionErrorCode::WouldExceedAccountDataBlockLimit,
    TransactionErrorCode::TooManyAccountLocks,
    TransactionErrorCode::AddressLookupTableNotFound,
    TransactionErrorCode::InvalidAddressLookupTableOwner,
    TransactionErrorCode::InvalidAddressLookupTableData,
    TransactionErrorCode::InvalidAddressLookupTableIndex,
    TransactionErrorCode::InvalidRentPayingAccount,
    TransactionErrorCode::WouldExceedMaxVoteCostLimit,
    TransactionErrorCode::WouldExceedAccountDataTotalLimit,
    TransactionErrorCode::MaxLoadedAccountsDataSizeExceeded,
    TransactionErrorCode::InvalidLoadedAccountsDataSizeLimit,
    TransactionErrorCode::ResanitizationNeeded,
    TransactionErrorCode::UnbalancedTransaction,
    TransactionErrorCode::ProgramCacheHitMaxLimit,
    TransactionErrorCode::CommitCancelled,
];

static INSTRUCTION_ERROR_ORDINALS: [InstructionErrorCode; 52] = [
    InstructionErrorCode::GenericError,
    InstructionErrorCode::InvalidArgument,
    InstructionErrorCode::InvalidInstructionData,
    InstructionErrorCode::InvalidAccountData,
    InstructionErrorCode::AccountDataTooSmall,
    InstructionErrorCode::InsufficientFunds,
    InstructionErrorCode::IncorrectProgramId,
    InstructionErrorCode::MissingRequiredSignature,
    InstructionErrorCode::AccountAlreadyInitialized,
    InstructionErrorCode::UninitializedAccount,
    InstructionErrorCode::UnbalancedInstruction,
    InstructionErrorCode::ModifiedProgramId,
    InstructionErrorCode::ExternalAccountLamportSpend,
    InstructionErrorCode::ExternalAccountDataModified,
    InstructionErrorCode::ReadonlyLamportChange,
    InstructionErrorCode::ReadonlyDataModified,
    InstructionErrorCode::DuplicateAccountIndex,
    InstructionErrorCode::ExecutableModified,
    InstructionErrorCode::RentEpochModified,
    InstructionErrorCode::NotEnoughAccountKeys,
    InstructionErrorCode::AccountDataSizeChanged,
    InstructionErrorCode::AccountNotExecutable,
    InstructionErrorCode::AccountBorrowFailed,
    InstructionErrorCode::AccountBorrowOutstanding,
    InstructionErrorCode::DuplicateAccountOutOfSync,
    InstructionErrorCode::InvalidError,
    InstructionErrorCode::ExecutableDataModified,
    InstructionErrorCode::ExecutableLamportChange,
    InstructionErrorCode::ExecutableAccountNotRentExempt,
    InstructionErrorCode::UnsupportedProgramId,
    InstructionErrorCode::CallDepth,
    InstructionErrorCode::MissingAccount,
    InstructionErrorCode::ReentrancyNotAllowed,
    InstructionErrorCode::MaxSeedLengthExceeded,
    InstructionErrorCode::InvalidSeeds,
    InstructionErrorCode::InvalidRealloc,
    InstructionErrorCode::ComputationalBudgetExceeded,
    InstructionErrorCode::PrivilegeEscalation,
    InstructionErrorCode::ProgramEnvironmentSetupFailure,
    InstructionErrorCode::ProgramFailedToComplete,
    InstructionErrorCode::ProgramFailedToCompile,
    InstructionErrorCode::Immutable,
    InstructionErrorCode::IncorrectAuthority,
    InstructionErrorCode::AccountNotRentExempt,
    InstructionErrorCode::InvalidAccountOwner,
    InstructionErrorCode::ArithmeticOverflow,
    InstructionErrorCode::UnsupportedSysvar,
    InstructionErrorCode::IllegalOwner,
    InstructionErrorCode::MaxAccountsDataAllocationsExceeded,
    InstructionErrorCode::MaxAccountsExceeded,
    InstructionErrorCode::MaxInstructionTraceLengthExceeded,
    InstructionErrorCode::BuiltinProgramsMustConsumeComputeUnits,
];

pub fn transaction_error_code(ordinal: u32) -> Result<TransactionErrorCode, NormalizationError> {
    TRANSACTION_ERROR_ORDINALS
        .get(ordinal as usize)
        .copied()
        .ok_or(NormalizationError::UnknownTransactionErrorOrdinal(ordinal))
}

pub fn instruction_error_code(ordinal: u32) -> Result<InstructionErrorCode, NormalizationError> {
    INSTRUCTION_ERROR_ORDINALS
        .get(ordinal as usize)
        .copied()
        .ok_or(NormalizationError::UnknownInstructionErrorOrdinal(ordinal))
}

/// Normalize a simulator transaction error
pub fn transaction_failure_from_svm(
    err: &SvmTransactionError,
) -> Result<TransactionFailure, NormalizationError> {
    Ok(match err {
        SvmTransactionError::Fieldless(ordinal) => {
            TransactionFailure::Fieldless(transaction_error_code(*ordinal)?)
        }
        SvmTransactionError::InstructionError { index, error } => {
            TransactionFailure::InstructionError {
                index: *index,
                error: instruction_failure_from_svm(error)?,
            }
        }
        SvmTransactionError::DuplicateInstruction(index) => {
            TransactionFailure::DuplicateInstruction { index: *index }
        }
        SvmTransactionError::InsufficientFundsForRent { account_index } => {
            TransactionFailure::InsufficientFundsForRent {
                account_index: *account_index,
            }
        }
        SvmTransactionError::ProgramExecutionTemporarilyRestricted { account_index } => {
            TransactionFailure::ProgramExecutionTemporarilyRestricted {
                account_index: *account_index,
            }
        }
    })
}

/// Normalize a simulator instruction error
pub fn instruction_failure_from_svm(
    err: &SvmInstructionError,
) -> Result<InstructionFailure, NormalizationError> {
    Ok(match err {
        SvmInstructionError::Fieldless(ordinal) => {
            InstructionFailure::Fieldless(instruction_error_code(*ordinal)?)
        }
        SvmInstructionError::Custom(code) => InstructionFailure::Custom(*code),
        SvmInstructionError::BorshIoError(message) => {
            InstructionFailure::BorshIoError(message.clone())
        }
    })
}
