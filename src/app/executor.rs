//! Transaction plan execution.
//!
//! Walks a [`TransactionPlan`] tree and hands every message to a backend
//! [`TransactionExecutor`], bounded by a [`ConcurrencyLimiter`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, join_all};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::limiter::ConcurrencyLimiter;
use crate::domain::{
    Error, SingleTransactionPlanResult, TransactionExecutor, TransactionMessage,
    TransactionPlan, TransactionPlanExecutor, TransactionPlanResult,
};

/// Plan executor shared by every backend
#[derive(Clone)]
pub struct PlanExecutor {
    executor: Arc<dyn TransactionExecutor>,
    limiter: ConcurrencyLimiter,
}

impl PlanExecutor {
    #[must_use]
    pub fn new(executor: Arc<dyn TransactionExecutor>, limiter: ConcurrencyLimiter) -> Self {
        Self { executor, limiter }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    fn traverse<'a>(
        &'a self,
        plan: &'a TransactionPlan,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<TransactionPlanResult, Error>> {
        Box::pin(async move {
            match plan {
                TransactionPlan::Single(message) => self
                    .execute_single(message, cancel)
                    .await
                    .map(TransactionPlanResult::Single),
                TransactionPlan::Sequential { plans, divisible } => {
                    let mut results = Vec::with_capacity(plans.len());
                    let mut failed = false;
                    for child in plans {
                        if failed {
                            results.push(TransactionPlanResult::canceled(child));
                            continue;
                        }
                        let result = self.traverse(child, cancel).await?;
                        failed = result.has_failures();
                        results.push(result);
                    }
                    Ok(TransactionPlanResult::Sequential {
                        results,
                        divisible: *divisible,
                    })
                }
                TransactionPlan::Parallel(plans) => {
                    let results =
                        join_all(plans.iter().map(|child| self.traverse(child, cancel))).await;
                    Ok(TransactionPlanResult::Parallel(
                        results.into_iter().collect::<Result<Vec<_>, _>>()?,
                    ))
                }
            }
        })
    }

    async fn execute_single(
        &self,
        message: &TransactionMessage,
        cancel: &CancellationToken,
    ) -> Result<SingleTransactionPlanResult, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let execution = self.limiter.run(async {
            // Cancellation may have happened while waiting for a slot.
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            Ok(self.executor.execute_transaction(message.clone()).await)
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = execution => result,
        }
    }
}

#[async_trait]
impl TransactionPlanExecutor for PlanExecutor {
    #[instrument(skip_all, fields(transactions = plan.len(), kind = plan.kind()))]
    async fn execute(
        &self,
        plan: &TransactionPlan,
        cancel: &CancellationToken,
    ) -> Result<TransactionPlanResult, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!(
            max_concurrency = self.limiter.max_concurrency(),
            "Executing transaction plan"
        );

        let result = self.traverse(plan, cancel).await?;

        if let Some(cause) = result.first_error().cloned() {
            warn!(error = %cause, "Transaction plan failed");
            return Err(Error::FailedToExecuteTransactionPlan {
                result: Box::new(result),
                cause: Box::new(cause),
            });
        }

        info!("Transaction plan executed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionContext, PlanShape, TransactionStatus};
    use solana_sdk::{
        hash::Hash, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails every message whose fee payer is listed, records execution order
    struct ScriptedExecutor {
        failing: Vec<Pubkey>,
        executed: Mutex<Vec<Pubkey>>,
        current: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedExecutor {
        fn new(failing: Vec<Pubkey>) -> Self {
            Self {
                failing,
                executed: Mutex::new(Vec::new()),
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay: Duration::from_millis(5),
            }
        }
    }

    #[async_trait]
    impl TransactionExecutor for ScriptedExecutor {
        async fn execute_transaction(
            &self,
            message: TransactionMessage,
        ) -> SingleTransactionPlanResult {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            let payer = message.fee_payer().unwrap();
            self.executed.lock().unwrap().push(payer);
            if self.failing.contains(&payer) {
                return SingleTransactionPlanResult::failed(
                    message,
                    Error::Signing("scripted failure".to_string()),
                    None,
                    None,
                );
            }
            let transaction = VersionedTransaction {
                signatures: vec![Signature::default()],
                message: message.compile().unwrap(),
            };
            SingleTransactionPlanResult::successful(
                message,
                transaction,
                ExecutionContext::Rpc {
                    signature: Signature::default(),
                    compute_unit_estimate: None,
                },
            )
        }
    }

    fn message(payer: Pubkey) -> TransactionMessage {
        TransactionMessage::new()
            .with_fee_payer(payer)
            .with_lifetime(Hash::default())
    }

    fn executor(scripted: Arc<ScriptedExecutor>, max_concurrency: usize) -> PlanExecutor {
        PlanExecutor::new(scripted, ConcurrencyLimiter::new(max_concurrency).unwrap())
    }

    #[tokio::test]
    async fn test_sequential_failure_cancels_rest() {
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let scripted = Arc::new(ScriptedExecutor::new(vec![b]));
        let plan = TransactionPlan::sequential([
            TransactionPlan::single(message(a)),
            TransactionPlan::single(message(b)),
            TransactionPlan::single(message(c)),
        ]);

        let err = executor(scripted.clone(), 4)
            .execute(&plan, &CancellationToken::new())
            .await
            .unwrap_err();

        let result = err.transaction_plan_result().unwrap();
        assert_eq!(result.shape(), plan.shape());
        let statuses: Vec<&str> = result.results().iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["successful", "failed", "canceled"]);
        assert!(matches!(err.cause(), Some(Error::Signing(_))));
        assert_eq!(*scripted.executed.lock().unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_parallel_results_keep_plan_order() {
        let payers: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let scripted = Arc::new(ScriptedExecutor::new(vec![]));
        let plan =
            TransactionPlan::parallel(payers.iter().map(|p| TransactionPlan::single(message(*p))));

        let result = executor(scripted, 4)
            .execute(&plan, &CancellationToken::new())
            .await
            .unwrap();

        let order: Vec<Pubkey> = result
            .results()
            .iter()
            .map(|r| r.message.fee_payer().unwrap())
            .collect();
        assert_eq!(order, payers);
        assert!(result.is_successful());
    }

    #[tokio::test]
    async fn test_parallel_failure_does_not_cancel_siblings() {
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let scripted = Arc::new(ScriptedExecutor::new(vec![a]));
        let plan = TransactionPlan::parallel([
            TransactionPlan::single(message(a)),
            TransactionPlan::single(message(b)),
            TransactionPlan::single(message(c)),
        ]);

        let err = executor(scripted, 4)
            .execute(&plan, &CancellationToken::new())
            .await
            .unwrap_err();

        let result = err.transaction_plan_result().unwrap();
        let statuses: Vec<&str> = result.results().iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["failed", "successful", "successful"]);
    }

    #[tokio::test]
    async fn test_nested_failure_cancels_following_branch() {
        let payers: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let scripted = Arc::new(ScriptedExecutor::new(vec![payers[1]]));
        let plan = TransactionPlan::sequential([
            TransactionPlan::parallel([
                TransactionPlan::single(message(payers[0])),
                TransactionPlan::single(message(payers[1])),
            ]),
            TransactionPlan::parallel([
                TransactionPlan::single(message(payers[2])),
                TransactionPlan::single(message(payers[3])),
            ]),
        ]);

        let err = executor(scripted, 4)
            .execute(&plan, &CancellationToken::new())
            .await
            .unwrap_err();

        let result = err.transaction_plan_result().unwrap();
        assert_eq!(
            result.shape(),
            PlanShape::Sequential(vec![
                PlanShape::Parallel(vec![PlanShape::Single; 2]),
                PlanShape::Parallel(vec![PlanShape::Single; 2]),
            ])
        );
        let statuses: Vec<&str> = result.results().iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["successful", "failed", "canceled", "canceled"]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let scripted = Arc::new(ScriptedExecutor::new(vec![]));
        let plan = TransactionPlan::parallel(
            (0..8).map(|_| TransactionPlan::single(message(Pubkey::new_unique()))),
        );

        executor(scripted.clone(), 3)
            .execute(&plan, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(scripted.peak.load(Ordering::SeqCst), 3);
        assert_eq!(scripted.executed.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let scripted = Arc::new(ScriptedExecutor::new(vec![]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor(scripted.clone(), 1)
            .execute(&TransactionPlan::single(message(Pubkey::new_unique())), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(scripted.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_slot() {
        let scripted = Arc::new(ScriptedExecutor {
            delay: Duration::from_millis(200),
            ..ScriptedExecutor::new(vec![])
        });
        let cancel = CancellationToken::new();
        let plan = TransactionPlan::parallel(
            (0..3).map(|_| TransactionPlan::single(message(Pubkey::new_unique()))),
        );

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = executor(scripted, 1).execute(&plan, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_canceled_status_is_not_failure() {
        let result = TransactionPlanResult::Single(SingleTransactionPlanResult::canceled(
            message(Pubkey::new_unique()),
        ));
        assert!(matches!(
            result.results()[0].status,
            TransactionStatus::Canceled
        ));
        assert!(!result.has_failures());
    }
}
