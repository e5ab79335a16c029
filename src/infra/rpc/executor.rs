//! Per-transaction execution over JSON-RPC.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{signature::Signature, transaction::VersionedTransaction};
use tracing::{debug, info, instrument, warn};

use super::compute_units::estimate_and_update_compute_unit_limit;
use crate::domain::{
    ComputeUnitEstimate, Error, ExecutionContext, RpcTransport, SingleTransactionPlanResult,
    TransactionExecutor, TransactionMessage,
};

/// Sends planned messages through an [`RpcTransport`]
#[derive(Clone)]
pub struct RpcTransactionExecutor {
    rpc: Arc<dyn RpcTransport>,
    skip_preflight: bool,
}

/// What was prepared so far, reported even when a later step fails
struct Progress {
    message: TransactionMessage,
    estimate: Option<ComputeUnitEstimate>,
    transaction: Option<VersionedTransaction>,
}

impl RpcTransactionExecutor {
    #[must_use]
    pub fn new(rpc: Arc<dyn RpcTransport>, skip_preflight: bool) -> Self {
        Self {
            rpc,
            skip_preflight,
        }
    }

    async fn send(
        &self,
        progress: &mut Progress,
    ) -> Result<(VersionedTransaction, Signature), Error> {
        let blockhash = self.rpc.get_latest_blockhash().await?;
        progress.message = std::mem::take(&mut progress.message).with_lifetime(blockhash);

        if progress.message.compute_unit_limit().needs_estimation() {
            let (message, estimate) = estimate_and_update_compute_unit_limit(
                self.rpc.as_ref(),
                progress.message.clone(),
                self.skip_preflight,
            )
            .await?;
            progress.message = message;
            progress.estimate = Some(estimate);
        }

        let transaction = progress.message.sign()?;
        progress.transaction = Some(transaction.clone());

        // A successful estimate already simulated the transaction.
        let skip_preflight = self.skip_preflight || progress.estimate.is_some();
        debug!(
            skip_preflight,
            compute_unit_limit = ?progress.estimate.map(|e| e.units()),
            "Sending transaction"
        );
        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction, skip_preflight)
            .await?;
        Ok((transaction, signature))
    }
}

#[async_trait]
impl TransactionExecutor for RpcTransactionExecutor {
    #[instrument(skip_all)]
    async fn execute_transaction(
        &self,
        message: TransactionMessage,
    ) -> SingleTransactionPlanResult {
        let mut progress = Progress {
            message,
            estimate: None,
            transaction: None,
        };

        match self.send(&mut progress).await {
            Ok((transaction, signature)) => {
                info!(signature = %signature, "Transaction executed");
                SingleTransactionPlanResult::successful(
                    progress.message,
                    transaction,
                    ExecutionContext::Rpc {
                        signature,
                        compute_unit_estimate: progress.estimate,
                    },
                )
            }
            Err(error) => {
                let error = error.unwrap_simulation_error();
                warn!(error = %error, "Transaction failed");
                let context = progress
                    .transaction
                    .as_ref()
                    .and_then(|transaction| transaction.signatures.first().copied())
                    .map(|signature| ExecutionContext::Rpc {
                        signature,
                        compute_unit_estimate: progress.estimate,
                    });
                SingleTransactionPlanResult::failed(
                    progress.message,
                    error,
                    progress.transaction,
                    context,
                )
            }
        }
    }
}
