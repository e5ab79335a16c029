//! Named error codes shared by every backend.
//!
//! The names match the ones the network reports in its JSON error payloads,
//! so a failure coming from the local simulator and one coming from an RPC
//! node compare equal when they describe the same condition.

use std::fmt;

use serde::Serialize;

macro_rules! error_codes {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every code, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Name used by the network for this code
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }

            /// Look a code up by its network name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

error_codes! {
    /// Transaction-level failures that carry no payload
    TransactionErrorCode {
        AccountInUse,
        AccountLoadedTwice,
        AccountNotFound,
        ProgramAccountNotFound,
        InsufficientFundsForFee,
        InvalidAccountForFee,
        AlreadyProcessed,
        BlockhashNotFound,
        CallChainTooDeep,
        MissingSignatureForFee,
        InvalidAccountIndex,
        SignatureFailure,
        InvalidProgramForExecution,
        SanitizeFailure,
        ClusterMaintenance,
        AccountBorrowOutstanding,
        WouldExceedMaxBlockCostLimit,
        UnsupportedVersion,
        InvalidWritableAccount,
        WouldExceedMaxAccountCostLimit,
        WouldExceedAccountDataBlockLimit,
        TooManyAccountLocks,
        AddressLookupTableNotFound,
        InvalidAddressLookupTableOwner,
        InvalidAddressLookupTableData,
        InvalidAddressLookupTableIndex,
        InvalidRentPayingAccount,
        WouldExceedMaxVoteCostLimit,
        WouldExceedAccountDataTotalLimit,
        MaxLoadedAccountsDataSizeExceeded,
        InvalidLoadedAccountsDataSizeLimit,
        ResanitizationNeeded,
        UnbalancedTransaction,
        ProgramCacheHitMaxLimit,
        CommitCancelled,
    }
}

error_codes! {
    /// Instruction-level failures that carry no payload
    InstructionErrorCode {
        GenericError,
        InvalidArgument,
        InvalidInstructionData,
        InvalidAccountData,
        AccountDataTooSmall,
        InsufficientFunds,
        IncorrectProgramId,
        MissingRequiredSignature,
        AccountAlreadyInitialized,
        UninitializedAccount,
        UnbalancedInstruction,
        ModifiedProgramId,
        ExternalAccountLamportSpend,
        ExternalAccountDataModified,
        ReadonlyLamportChange,
        ReadonlyDataModified,
        DuplicateAccountIndex,
        ExecutableModified,
        RentEpochModified,
        NotEnoughAccountKeys,
        AccountDataSizeChanged,
        AccountNotExecutable,
        AccountBorrowFailed,
        AccountBorrowOutstanding,
        DuplicateAccountOutOfSync,
        InvalidError,
        ExecutableDataModified,
        ExecutableLamportChange,
        ExecutableAccountNotRentExempt,
        UnsupportedProgramId,
        CallDepth,
        MissingAccount,
        ReentrancyNotAllowed,
        MaxSeedLengthExceeded,
        InvalidSeeds,
        InvalidRealloc,
        ComputationalBudgetExceeded,
        PrivilegeEscalation,
        ProgramEnvironmentSetupFailure,
        ProgramFailedToComplete,
        ProgramFailedToCompile,
        Immutable,
        IncorrectAuthority,
        AccountNotRentExempt,
        InvalidAccountOwner,
        ArithmeticOverflow,
        UnsupportedSysvar,
        IllegalOwner,
        MaxAccountsDataAllocationsExceeded,
        MaxAccountsExceeded,
        MaxInstructionTraceLengthExceeded,
        BuiltinProgramsMustConsumeComputeUnits,
    }
}

// ============================================================================
// JSON-RPC SERVER ERROR CODES
// ============================================================================

/// Error codes returned by Solana JSON-RPC nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RpcErrorCode {
    BlockCleanedUp,
    SendTransactionPreflightFailure,
    TransactionSignatureVerificationFailure,
    BlockNotAvailable,
    NodeUnhealthy,
    TransactionPrecompileVerificationFailure,
    SlotSkipped,
    NoSnapshot,
    LongTermStorageSlotSkipped,
    KeyExcludedFromSecondaryIndex,
    TransactionHistoryNotAvailable,
    ScanError,
    TransactionSignatureLenMismatch,
    BlockStatusNotAvailableYet,
    UnsupportedTransactionVersion,
    MinContextSlotNotReached,
    EpochRewardsPeriodActive,
    SlotNotEpochBoundary,
    LongTermStorageUnreachable,
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Any code this crate does not know about
    Other(i64),
}

impl RpcErrorCode {
    pub fn from_code(code: i64) -> Self {
        match code {
            -32001 => Self::BlockCleanedUp,
            -32002 => Self::SendTransactionPreflightFailure,
            -32003 => Self::TransactionSignatureVerificationFailure,
            -32004 => Self::BlockNotAvailable,
            -32005 => Self::NodeUnhealthy,
            -32006 => Self::TransactionPrecompileVerificationFailure,
            -32007 => Self::SlotSkipped,
            -32008 => Self::NoSnapshot,
            -32009 => Self::LongTermStorageSlotSkipped,
            -32010 => Self::KeyExcludedFromSecondaryIndex,
            -32011 => Self::TransactionHistoryNotAvailable,
            -32012 => Self::ScanError,
            -32013 => Self::TransactionSignatureLenMismatch,
            -32014 => Self::BlockStatusNotAvailableYet,
            -32015 => Self::UnsupportedTransactionVersion,
            -32016 => Self::MinContextSlotNotReached,
            -32017 => Self::EpochRewardsPeriodActive,
            -32018 => Self::SlotNotEpochBoundary,
            -32019 => Self::LongTermStorageUnreachable,
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::BlockCleanedUp => -32001,
            Self::SendTransactionPreflightFailure => -32002,
            Self::TransactionSignatureVerificationFailure => -32003,
            Self::BlockNotAvailable => -32004,
            Self::NodeUnhealthy => -32005,
            Self::TransactionPrecompileVerificationFailure => -32006,
            Self::SlotSkipped => -32007,
            Self::NoSnapshot => -32008,
            Self::LongTermStorageSlotSkipped => -32009,
            Self::KeyExcludedFromSecondaryIndex => -32010,
            Self::TransactionHistoryNotAvailable => -32011,
            Self::ScanError => -32012,
            Self::TransactionSignatureLenMismatch => -32013,
            Self::BlockStatusNotAvailableYet => -32014,
            Self::UnsupportedTransactionVersion => -32015,
            Self::MinContextSlotNotReached => -32016,
            Self::EpochRewardsPeriodActive => -32017,
            Self::SlotNotEpochBoundary => -32018,
            Self::LongTermStorageUnreachable => -32019,
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Other(code) => *code,
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "{}", code),
            known => write!(f, "{:?} ({})", known, known.code()),
        }
    }
}
