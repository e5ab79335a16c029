//! Instruction plans, transaction plans and their execution results.

use std::fmt;
use std::sync::Arc;

use solana_sdk::{
    instruction::Instruction, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};

use super::error::{Error, PlanningError};
use super::message::{TRANSACTION_SIZE_LIMIT, TransactionMessage};

// ============================================================================
// INSTRUCTION PLANS
// ============================================================================

/// A tree describing instructions and how they may be split across transactions
#[derive(Debug, Clone)]
pub enum InstructionPlan {
    /// One instruction
    Single(Instruction),
    /// Children that must execute in order. When `divisible` is false, every
    /// instruction of the subtree must land in the same transaction.
    Sequential {
        plans: Vec<InstructionPlan>,
        divisible: bool,
    },
    /// Children with no ordering constraint between them
    Parallel(Vec<InstructionPlan>),
    /// Instructions produced on demand to fill the available space
    MessagePacker(Arc<dyn MessagePacker>),
}

impl InstructionPlan {
    pub fn single(instruction: Instruction) -> Self {
        Self::Single(instruction)
    }

    /// Divisible sequential plan
    pub fn sequential(plans: impl IntoIterator<Item = InstructionPlan>) -> Self {
        Self::Sequential {
            plans: plans.into_iter().collect(),
            divisible: true,
        }
    }

    /// Sequential plan that must fit in a single transaction
    pub fn non_divisible_sequential(plans: impl IntoIterator<Item = InstructionPlan>) -> Self {
        Self::Sequential {
            plans: plans.into_iter().collect(),
            divisible: false,
        }
    }

    pub fn parallel(plans: impl IntoIterator<Item = InstructionPlan>) -> Self {
        Self::Parallel(plans.into_iter().collect())
    }

    pub fn message_packer(packer: impl MessagePacker + 'static) -> Self {
        Self::MessagePacker(Arc::new(packer))
    }
}

impl From<Instruction> for InstructionPlan {
    fn from(instruction: Instruction) -> Self {
        Self::Single(instruction)
    }
}

impl From<Vec<Instruction>> for InstructionPlan {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::sequential(instructions.into_iter().map(Self::Single))
    }
}

/// Produces instructions sized to whatever room a message has left
pub trait MessagePacker: fmt::Debug + Send + Sync {
    /// Start a new packing pass
    fn cursor(&self) -> Box<dyn MessagePackerCursor>;
}

/// One packing pass over a [`MessagePacker`]
pub trait MessagePackerCursor: Send {
    fn done(&self) -> bool;

    /// Append as many instructions as fit in `message`. Fails when the message
    /// has no room left for any progress.
    fn pack(&mut self, message: TransactionMessage) -> Result<TransactionMessage, PlanningError>;
}

/// Builds an instruction for the byte range `offset..offset + length`
pub type LinearInstructionBuilder = Arc<dyn Fn(usize, usize) -> Instruction + Send + Sync>;

/// Splits a payload of `total_length` bytes into as few instructions as possible,
/// e.g. to write a large buffer account in chunks.
#[derive(Clone)]
pub struct LinearMessagePacker {
    total_length: usize,
    build: LinearInstructionBuilder,
}

impl LinearMessagePacker {
    pub fn new(
        total_length: usize,
        build: impl Fn(usize, usize) -> Instruction + Send + Sync + 'static,
    ) -> Self {
        Self {
            total_length,
            build: Arc::new(build),
        }
    }
}

impl fmt::Debug for LinearMessagePacker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearMessagePacker")
            .field("total_length", &self.total_length)
            .finish_non_exhaustive()
    }
}

impl MessagePacker for LinearMessagePacker {
    fn cursor(&self) -> Box<dyn MessagePackerCursor> {
        Box::new(LinearCursor {
            offset: 0,
            total_length: self.total_length,
            build: Arc::clone(&self.build),
        })
    }
}

struct LinearCursor {
    offset: usize,
    total_length: usize,
    build: LinearInstructionBuilder,
}

impl MessagePackerCursor for LinearCursor {
    fn done(&self) -> bool {
        self.offset >= self.total_length
    }

    fn pack(&mut self, message: TransactionMessage) -> Result<TransactionMessage, PlanningError> {
        let empty = (self.build)(self.offset, 0);
        let base_size = message.clone().with_instruction(empty).transaction_size()?;
        // Growing the data may widen its compact-u16 length prefix by one byte.
        let free = TRANSACTION_SIZE_LIMIT.saturating_sub(base_size + 1);
        let length = free.min(self.total_length - self.offset);
        if length == 0 {
            return Err(PlanningError::MessageCannotAccommodatePlan {
                num_bytes_required: base_size + 1,
                num_bytes_available: TRANSACTION_SIZE_LIMIT,
            });
        }

        let instruction = (self.build)(self.offset, length);
        self.offset += length;
        Ok(message.with_instruction(instruction))
    }
}

// ============================================================================
// TRANSACTION PLANS
// ============================================================================

/// A tree of transaction messages with the same composition rules as
/// [`InstructionPlan`]
#[derive(Debug, Clone)]
pub enum TransactionPlan {
    Single(TransactionMessage),
    Sequential {
        plans: Vec<TransactionPlan>,
        divisible: bool,
    },
    Parallel(Vec<TransactionPlan>),
}

/// Structure of a plan or result tree, without its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanShape {
    Single,
    Sequential(Vec<PlanShape>),
    Parallel(Vec<PlanShape>),
}

impl TransactionPlan {
    pub fn single(message: TransactionMessage) -> Self {
        Self::Single(message)
    }

    pub fn sequential(plans: impl IntoIterator<Item = TransactionPlan>) -> Self {
        Self::Sequential {
            plans: plans.into_iter().collect(),
            divisible: true,
        }
    }

    pub fn parallel(plans: impl IntoIterator<Item = TransactionPlan>) -> Self {
        Self::Parallel(plans.into_iter().collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Sequential { .. } => "sequential",
            Self::Parallel(_) => "parallel",
        }
    }

    /// Messages in depth-first order
    pub fn messages(&self) -> Vec<&TransactionMessage> {
        let mut messages = Vec::new();
        self.collect_messages(&mut messages);
        messages
    }

    fn collect_messages<'a>(&'a self, out: &mut Vec<&'a TransactionMessage>) {
        match self {
            Self::Single(message) => out.push(message),
            Self::Sequential { plans, .. } | Self::Parallel(plans) => {
                for plan in plans {
                    plan.collect_messages(out);
                }
            }
        }
    }

    /// Number of transactions in the plan
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Sequential { plans, .. } | Self::Parallel(plans) => {
                plans.iter().map(Self::len).sum()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> PlanShape {
        match self {
            Self::Single(_) => PlanShape::Single,
            Self::Sequential { plans, .. } => {
                PlanShape::Sequential(plans.iter().map(Self::shape).collect())
            }
            Self::Parallel(plans) => PlanShape::Parallel(plans.iter().map(Self::shape).collect()),
        }
    }
}

impl From<TransactionMessage> for TransactionPlan {
    fn from(message: TransactionMessage) -> Self {
        Self::Single(message)
    }
}

impl From<Vec<TransactionMessage>> for TransactionPlan {
    fn from(messages: Vec<TransactionMessage>) -> Self {
        Self::parallel(messages.into_iter().map(Self::Single))
    }
}

// ============================================================================
// EXECUTION RESULTS
// ============================================================================

/// How the compute-unit limit of a sent transaction was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeUnitEstimate {
    /// Buffered units from a successful simulation
    Estimated(u32),
    /// Units consumed by a failed simulation, used because preflight is skipped
    RecoveredFromFailure(u32),
}

impl ComputeUnitEstimate {
    pub fn units(&self) -> u32 {
        match self {
            Self::Estimated(units) | Self::RecoveredFromFailure(units) => *units,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::RecoveredFromFailure(_))
    }
}

/// Return data set by the last program of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnData {
    pub program_id: Pubkey,
    pub data: Vec<u8>,
}

/// Execution metadata reported by the local simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvmTransactionMetadata {
    pub signature: Signature,
    pub logs: Vec<String>,
    pub compute_units_consumed: u64,
    pub return_data: Option<ReturnData>,
}

/// Backend-specific details of an executed transaction
#[derive(Debug, Clone)]
pub enum ExecutionContext {
    Rpc {
        signature: Signature,
        compute_unit_estimate: Option<ComputeUnitEstimate>,
    },
    Svm(SvmTransactionMetadata),
}

impl ExecutionContext {
    pub fn signature(&self) -> Signature {
        match self {
            Self::Rpc { signature, .. } => *signature,
            Self::Svm(metadata) => metadata.signature,
        }
    }
}

/// Outcome of one transaction
#[derive(Debug, Clone)]
pub enum TransactionStatus {
    Successful {
        transaction: VersionedTransaction,
        context: ExecutionContext,
    },
    Failed {
        error: Error,
        transaction: Option<VersionedTransaction>,
        context: Option<ExecutionContext>,
    },
    /// Never attempted because an earlier transaction failed
    Canceled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Successful { .. } => "successful",
            Self::Failed { .. } => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one transaction, with the message as it was last prepared
#[derive(Debug, Clone)]
pub struct SingleTransactionPlanResult {
    pub message: TransactionMessage,
    pub status: TransactionStatus,
}

impl SingleTransactionPlanResult {
    pub fn successful(
        message: TransactionMessage,
        transaction: VersionedTransaction,
        context: ExecutionContext,
    ) -> Self {
        Self {
            message,
            status: TransactionStatus::Successful {
                transaction,
                context,
            },
        }
    }

    pub fn failed(
        message: TransactionMessage,
        error: Error,
        transaction: Option<VersionedTransaction>,
        context: Option<ExecutionContext>,
    ) -> Self {
        Self {
            message,
            status: TransactionStatus::Failed {
                error,
                transaction,
                context,
            },
        }
    }

    pub fn canceled(message: TransactionMessage) -> Self {
        Self {
            message,
            status: TransactionStatus::Canceled,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.status, TransactionStatus::Successful { .. })
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.status {
            TransactionStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn transaction(&self) -> Option<&VersionedTransaction> {
        match &self.status {
            TransactionStatus::Successful { transaction, .. } => Some(transaction),
            TransactionStatus::Failed { transaction, .. } => transaction.as_ref(),
            TransactionStatus::Canceled => None,
        }
    }

    pub fn context(&self) -> Option<&ExecutionContext> {
        match &self.status {
            TransactionStatus::Successful { context, .. } => Some(context),
            TransactionStatus::Failed { context, .. } => context.as_ref(),
            TransactionStatus::Canceled => None,
        }
    }

    pub fn signature(&self) -> Option<Signature> {
        self.context().map(ExecutionContext::signature)
    }
}

/// Result tree mirroring the executed [`TransactionPlan`]
#[derive(Debug, Clone)]
pub enum TransactionPlanResult {
    Single(SingleTransactionPlanResult),
    Sequential {
        results: Vec<TransactionPlanResult>,
        divisible: bool,
    },
    Parallel(Vec<TransactionPlanResult>),
}

impl TransactionPlanResult {
    /// Mark every transaction of `plan` as canceled
    pub fn canceled(plan: &TransactionPlan) -> Self {
        match plan {
            TransactionPlan::Single(message) => {
                Self::Single(SingleTransactionPlanResult::canceled(message.clone()))
            }
            TransactionPlan::Sequential { plans, divisible } => Self::Sequential {
                results: plans.iter().map(Self::canceled).collect(),
                divisible: *divisible,
            },
            TransactionPlan::Parallel(plans) => {
                Self::Parallel(plans.iter().map(Self::canceled).collect())
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Sequential { .. } => "sequential",
            Self::Parallel(_) => "parallel",
        }
    }

    /// Single results in depth-first order
    pub fn results(&self) -> Vec<&SingleTransactionPlanResult> {
        let mut results = Vec::new();
        self.collect_results(&mut results);
        results
    }

    fn collect_results<'a>(&'a self, out: &mut Vec<&'a SingleTransactionPlanResult>) {
        match self {
            Self::Single(result) => out.push(result),
            Self::Sequential { results, .. } | Self::Parallel(results) => {
                for result in results {
                    result.collect_results(out);
                }
            }
        }
    }

    /// Error of the first failed transaction, in plan order
    pub fn first_error(&self) -> Option<&Error> {
        self.results().into_iter().find_map(|result| result.error())
    }

    pub fn has_failures(&self) -> bool {
        self.first_error().is_some()
    }

    pub fn is_successful(&self) -> bool {
        self.results().iter().all(|result| result.is_successful())
    }

    pub fn shape(&self) -> PlanShape {
        match self {
            Self::Single(_) => PlanShape::Single,
            Self::Sequential { results, .. } => {
                PlanShape::Sequential(results.iter().map(Self::shape).collect())
            }
            Self::Parallel(results) => {
                PlanShape::Parallel(results.iter().map(Self::shape).collect())
            }
        }
    }
}
