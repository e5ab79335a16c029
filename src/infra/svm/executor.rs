//! Per-transaction execution against the local simulator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::errors::transaction_failure_from_svm;
use crate::domain::{
    Error, ExecutionContext, LocalSvm, SingleTransactionPlanResult, TransactionExecutor,
    TransactionMessage,
};

/// Sends planned messages to a [`LocalSvm`]. Compute units are not estimated.
#[derive(Clone)]
pub struct SvmTransactionExecutor {
    svm: Arc<dyn LocalSvm>,
}

impl SvmTransactionExecutor {
    #[must_use]
    pub fn new(svm: Arc<dyn LocalSvm>) -> Self {
        Self { svm }
    }
}

#[async_trait]
impl TransactionExecutor for SvmTransactionExecutor {
    #[instrument(skip_all)]
    async fn execute_transaction(
        &self,
        message: TransactionMessage,
    ) -> SingleTransactionPlanResult {
        let message = message.with_lifetime(self.svm.latest_blockhash());

        let transaction = match message.sign() {
            Ok(transaction) => transaction,
            Err(error) => {
                warn!(error = %error, "Failed to sign transaction");
                return SingleTransactionPlanResult::failed(message, error, None, None);
            }
        };

        match self.svm.send_transaction(transaction.clone()) {
            Ok(metadata) => {
                info!(
                    signature = %metadata.signature,
                    compute_units = metadata.compute_units_consumed,
                    "Transaction executed"
                );
                SingleTransactionPlanResult::successful(
                    message,
                    transaction,
                    ExecutionContext::Svm(metadata),
                )
            }
            Err(failed) => {
                let error = match transaction_failure_from_svm(&failed.err) {
                    Ok(failure) => Error::Transaction(failure),
                    Err(e) => Error::Normalization(e),
                };
                warn!(error = %error, logs = failed.meta.logs.len(), "Transaction failed");
                SingleTransactionPlanResult::failed(
                    message,
                    error,
                    Some(transaction),
                    Some(ExecutionContext::Svm(failed.meta)),
                )
            }
        }
    }
}
