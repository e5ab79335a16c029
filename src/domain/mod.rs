//! Domain layer containing messages, plans, traits, and error definitions.

pub mod codes;
pub mod error;
pub mod message;
pub mod traits;
pub mod types;

pub use codes::{InstructionErrorCode, RpcErrorCode, TransactionErrorCode};
pub use error::{
    ConfigError, Error, InstructionFailure, NormalizationError, PlanningError, RpcFailure,
    TransactionFailure,
};
pub use message::{
    ComputeUnitLimit, MAX_COMPUTE_UNIT_LIMIT, PROVISORY_COMPUTE_UNIT_LIMIT, SharedSigner,
    TRANSACTION_SIZE_LIMIT, TransactionMessage, compute_unit_limit_of,
};
pub use traits::{
    LocalSvm, RpcSimulation, RpcTransport, SvmFailedTransaction, SvmInstructionError,
    SvmTransactionError, TransactionExecutor, TransactionPlanExecutor,
};
pub use types::{
    ComputeUnitEstimate, ExecutionContext, InstructionPlan, LinearMessagePacker, MessagePacker,
    MessagePackerCursor, PlanShape, ReturnData, SingleTransactionPlanResult, SvmTransactionMetadata,
    TransactionPlan, TransactionPlanResult, TransactionStatus,
};
