//! Instruction plan to transaction plan folding.

use std::fmt;

use solana_sdk::signer::Signer;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::domain::{
    Error, InstructionPlan, PROVISORY_COMPUTE_UNIT_LIMIT, PlanningError, SharedSigner,
    TRANSACTION_SIZE_LIMIT, TransactionMessage, TransactionPlan,
};

/// Whether planned messages reserve a compute-unit limit instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeUnitLimitPolicy {
    /// Add a provisory limit, replaced by an estimate before sending
    Provisory,
    /// Leave the limit out
    Omit,
}

/// Packs instruction plans into as few transaction messages as possible
#[derive(Clone)]
pub struct TransactionPlanner {
    payer: SharedSigner,
    priority_fees: Option<u64>,
    compute_unit_limit: ComputeUnitLimitPolicy,
}

impl TransactionPlanner {
    #[must_use]
    pub fn new(
        payer: SharedSigner,
        priority_fees: Option<u64>,
        compute_unit_limit: ComputeUnitLimitPolicy,
    ) -> Self {
        Self {
            payer,
            priority_fees,
            compute_unit_limit,
        }
    }

    /// Fold an instruction plan into a transaction plan
    #[instrument(skip_all, fields(payer = %self.payer.pubkey()))]
    pub async fn plan(
        &self,
        plan: &InstructionPlan,
        cancel: &CancellationToken,
    ) -> Result<TransactionPlan, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let planned = self
            .plan_node(plan)?
            .ok_or(PlanningError::EmptyInstructionPlan)?;

        info!(
            transactions = planned.len(),
            kind = planned.kind(),
            "Planned transactions"
        );
        Ok(planned)
    }

    /// A fresh message carrying the fee payer and compute-budget prelude
    pub fn create_message(&self) -> TransactionMessage {
        let mut message = TransactionMessage::new().with_fee_payer_signer(self.payer.clone());
        if self.compute_unit_limit == ComputeUnitLimitPolicy::Provisory {
            message = message.with_compute_unit_limit(PROVISORY_COMPUTE_UNIT_LIMIT);
        }
        if let Some(micro_lamports) = self.priority_fees {
            message = message.with_compute_unit_price(micro_lamports);
        }
        message
    }

    fn prelude_len(&self) -> usize {
        usize::from(self.compute_unit_limit == ComputeUnitLimitPolicy::Provisory)
            + usize::from(self.priority_fees.is_some())
    }

    fn plan_node(&self, plan: &InstructionPlan) -> Result<Option<TransactionPlan>, PlanningError> {
        match plan {
            InstructionPlan::Single(instruction) => {
                let message = self.create_message().with_instruction(instruction.clone());
                ensure_fits(&message)?;
                Ok(Some(TransactionPlan::Single(message)))
            }
            InstructionPlan::Sequential {
                plans,
                divisible: false,
            } => {
                let message = pack_atomically(plan, self.create_message())?;
                if message.instructions().len() == self.prelude_len() {
                    return Ok(None);
                }
                ensure_fits(&message)?;
                debug!(children = plans.len(), "Packed non-divisible sequence");
                Ok(Some(TransactionPlan::Single(message)))
            }
            InstructionPlan::Sequential {
                plans,
                divisible: true,
            } => {
                let mut folded = Vec::with_capacity(plans.len());
                for child in plans {
                    match self.plan_node(child)? {
                        Some(TransactionPlan::Sequential {
                            plans: nested,
                            divisible: true,
                        }) => {
                            for nested_plan in nested {
                                self.push_sequential(&mut folded, nested_plan)?;
                            }
                        }
                        Some(planned) => self.push_sequential(&mut folded, planned)?,
                        None => {}
                    }
                }
                Ok(collapse(folded, |plans| TransactionPlan::Sequential {
                    plans,
                    divisible: true,
                }))
            }
            InstructionPlan::Parallel(plans) => {
                let mut folded = Vec::with_capacity(plans.len());
                for child in plans {
                    match self.plan_node(child)? {
                        Some(TransactionPlan::Parallel(nested)) => {
                            for nested_plan in nested {
                                self.push_parallel(&mut folded, nested_plan)?;
                            }
                        }
                        Some(planned) => self.push_parallel(&mut folded, planned)?,
                        None => {}
                    }
                }
                Ok(collapse(folded, TransactionPlan::Parallel))
            }
            InstructionPlan::MessagePacker(packer) => {
                let mut cursor = packer.cursor();
                let mut messages = Vec::new();
                while !cursor.done() {
                    let message = cursor.pack(self.create_message())?;
                    if message.instructions().len() == self.prelude_len() {
                        return Err(PlanningError::MessageCannotAccommodatePlan {
                            num_bytes_required: message.transaction_size()? + 1,
                            num_bytes_available: TRANSACTION_SIZE_LIMIT,
                        });
                    }
                    ensure_fits(&message)?;
                    messages.push(TransactionPlan::Single(message));
                }
                Ok(collapse(messages, |plans| TransactionPlan::Sequential {
                    plans,
                    divisible: true,
                }))
            }
        }
    }

    /// Merge `next` into the last message when both are single messages
    /// and the result still fits; otherwise append it.
    fn push_sequential(
        &self,
        folded: &mut Vec<TransactionPlan>,
        next: TransactionPlan,
    ) -> Result<(), PlanningError> {
        if let TransactionPlan::Single(message) = &next {
            if let Some(TransactionPlan::Single(previous)) = folded.last_mut() {
                if let Some(merged) = self.try_merge(previous, message)? {
                    *previous = merged;
                    return Ok(());
                }
            }
        }
        folded.push(next);
        Ok(())
    }

    /// Merge `next` into the first single message with enough room left
    fn push_parallel(
        &self,
        folded: &mut Vec<TransactionPlan>,
        next: TransactionPlan,
    ) -> Result<(), PlanningError> {
        if let TransactionPlan::Single(message) = &next {
            for candidate in folded.iter_mut() {
                if let TransactionPlan::Single(existing) = candidate {
                    if let Some(merged) = self.try_merge(existing, message)? {
                        *existing = merged;
                        return Ok(());
                    }
                }
            }
        }
        folded.push(next);
        Ok(())
    }

    fn try_merge(
        &self,
        previous: &TransactionMessage,
        next: &TransactionMessage,
    ) -> Result<Option<TransactionMessage>, PlanningError> {
        let payload = next.instructions().iter().skip(self.prelude_len()).cloned();
        let merged = next
            .signers()
            .iter()
            .cloned()
            .fold(previous.clone().with_instructions(payload), |message, signer| {
                message.with_signer(signer)
            });
        if merged.fits_in_transaction()? {
            Ok(Some(merged))
        } else {
            Ok(None)
        }
    }
}

impl fmt::Debug for TransactionPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionPlanner")
            .field("payer", &self.payer.pubkey())
            .field("priority_fees", &self.priority_fees)
            .field("compute_unit_limit", &self.compute_unit_limit)
            .finish()
    }
}

/// Append every instruction of `plan` to `message`, in order
fn pack_atomically(
    plan: &InstructionPlan,
    message: TransactionMessage,
) -> Result<TransactionMessage, PlanningError> {
    match plan {
        InstructionPlan::Single(instruction) => Ok(message.with_instruction(instruction.clone())),
        InstructionPlan::Sequential { plans, .. } | InstructionPlan::Parallel(plans) => plans
            .iter()
            .try_fold(message, |message, child| pack_atomically(child, message)),
        InstructionPlan::MessagePacker(packer) => {
            let mut cursor = packer.cursor();
            let mut message = message;
            while !cursor.done() {
                let before = message.instructions().len();
                message = cursor.pack(message)?;
                if message.instructions().len() == before {
                    return Err(PlanningError::MessageCannotAccommodatePlan {
                        num_bytes_required: message.transaction_size()? + 1,
                        num_bytes_available: TRANSACTION_SIZE_LIMIT,
                    });
                }
            }
            Ok(message)
        }
    }
}

fn ensure_fits(message: &TransactionMessage) -> Result<(), PlanningError> {
    let size = message.transaction_size()?;
    if size > TRANSACTION_SIZE_LIMIT {
        return Err(PlanningError::MessageCannotAccommodatePlan {
            num_bytes_required: size,
            num_bytes_available: TRANSACTION_SIZE_LIMIT,
        });
    }
    Ok(())
}

fn collapse(
    mut plans: Vec<TransactionPlan>,
    wrap: impl FnOnce(Vec<TransactionPlan>) -> TransactionPlan,
) -> Option<TransactionPlan> {
    match plans.len() {
        0 => None,
        1 => plans.pop(),
        _ => Some(wrap(plans)),
    }
}
