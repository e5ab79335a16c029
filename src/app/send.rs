//! Plan and send helpers on [`Client`].

use solana_sdk::instruction::Instruction;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::client::Client;
use crate::domain::{
    Error, InstructionPlan, PlanningError, SingleTransactionPlanResult, TransactionMessage,
    TransactionPlan, TransactionPlanResult,
};

/// Anything the send helpers accept
#[derive(Debug, Clone)]
pub enum TransactionInput {
    /// Planned before execution
    Instructions(InstructionPlan),
    /// Executed as given
    Transactions(TransactionPlan),
}

impl From<Instruction> for TransactionInput {
    fn from(instruction: Instruction) -> Self {
        Self::Instructions(InstructionPlan::Single(instruction))
    }
}

/// Instructions that may be spread over several transactions, in order
impl From<Vec<Instruction>> for TransactionInput {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::Instructions(instructions.into())
    }
}

impl From<InstructionPlan> for TransactionInput {
    fn from(plan: InstructionPlan) -> Self {
        Self::Instructions(plan)
    }
}

impl From<TransactionMessage> for TransactionInput {
    fn from(message: TransactionMessage) -> Self {
        Self::Transactions(TransactionPlan::Single(message))
    }
}

/// Messages executed in parallel
impl From<Vec<TransactionMessage>> for TransactionInput {
    fn from(messages: Vec<TransactionMessage>) -> Self {
        Self::Transactions(messages.into())
    }
}

impl From<TransactionPlan> for TransactionInput {
    fn from(plan: TransactionPlan) -> Self {
        Self::Transactions(plan)
    }
}

impl Client {
    /// Plan the input into a transaction plan. Transaction inputs pass through.
    pub async fn plan_transactions(
        &self,
        input: impl Into<TransactionInput>,
        cancel: &CancellationToken,
    ) -> Result<TransactionPlan, Error> {
        match input.into() {
            TransactionInput::Instructions(plan) => {
                self.transaction_planner()?.plan(&plan, cancel).await
            }
            TransactionInput::Transactions(plan) => Ok(plan),
        }
    }

    /// Plan the input into exactly one transaction message
    pub async fn plan_transaction(
        &self,
        input: impl Into<TransactionInput>,
        cancel: &CancellationToken,
    ) -> Result<TransactionMessage, Error> {
        match self.plan_transactions(input, cancel).await? {
            TransactionPlan::Single(message) => Ok(message),
            plan => Err(PlanningError::ExpectedSingleTransactionPlan { count: plan.len() }.into()),
        }
    }

    /// Plan and execute the input
    #[instrument(skip_all)]
    pub async fn send_transactions(
        &self,
        input: impl Into<TransactionInput>,
        cancel: &CancellationToken,
    ) -> Result<TransactionPlanResult, Error> {
        let plan = self.plan_transactions(input, cancel).await?;
        self.transaction_plan_executor()?
            .execute(&plan, cancel)
            .await
    }

    /// Plan and execute the input as exactly one transaction
    #[instrument(skip_all)]
    pub async fn send_transaction(
        &self,
        input: impl Into<TransactionInput>,
        cancel: &CancellationToken,
    ) -> Result<SingleTransactionPlanResult, Error> {
        let message = self.plan_transaction(input, cancel).await?;
        let result = self
            .transaction_plan_executor()?
            .execute(&TransactionPlan::Single(message), cancel)
            .await?;

        match result {
            TransactionPlanResult::Single(result) => Ok(result),
            other => Err(Error::ExpectedSingleTransactionResult(other.kind())),
        }
    }
}
