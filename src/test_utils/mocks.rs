//! Mock implementations for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use solana_sdk::{
    hash::Hash, instruction::Instruction, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use tokio::sync::Semaphore;

use crate::domain::{
    Error, LocalSvm, RpcFailure, RpcSimulation, RpcTransport, SvmFailedTransaction,
    SvmTransactionError, SvmTransactionMetadata, TransactionFailure, compute_unit_limit_of,
};

/// Compute units reported by mock simulations unless queued otherwise
pub const MOCK_UNITS_CONSUMED: u64 = 5_000;

/// Call recorded by [`MockRpcTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRpcCall {
    GetLatestBlockhash,
    Simulate {
        compute_unit_limit: Option<u32>,
    },
    Send {
        skip_preflight: bool,
        compute_unit_limit: Option<u32>,
        signature: Signature,
    },
}

/// Decode the compute-unit limit of a compiled transaction
pub fn transaction_compute_unit_limit(transaction: &VersionedTransaction) -> Option<u32> {
    let keys = transaction.message.static_account_keys();
    transaction
        .message
        .instructions()
        .iter()
        .find_map(|compiled| {
            let program_id = *keys.get(usize::from(compiled.program_id_index))?;
            compute_unit_limit_of(&Instruction {
                program_id,
                accounts: vec![],
                data: compiled.data.clone(),
            })
        })
}

/// Mock RPC transport with scripted responses.
///
/// Simulations and sends pop queued results; when the queue is empty they
/// succeed. An optional gate holds every send until permits are added.
pub struct MockRpcTransport {
    blockhash: Hash,
    simulations: Mutex<VecDeque<Result<RpcSimulation, Error>>>,
    sends: Mutex<VecDeque<Result<(), Error>>>,
    calls: Mutex<Vec<MockRpcCall>>,
    send_gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockRpcTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_from_array([7u8; 32]),
            simulations: Mutex::new(VecDeque::new()),
            sends: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            send_gate: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sends wait on `gate` until a permit is available
    #[must_use]
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            send_gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn queue_simulation(&self, result: Result<RpcSimulation, Error>) {
        self.simulations.lock().unwrap().push_back(result);
    }

    /// Queue a failed simulation that consumed `units_consumed` units
    pub fn queue_failed_simulation(
        &self,
        failure: TransactionFailure,
        units_consumed: Option<u64>,
    ) {
        self.queue_simulation(Ok(RpcSimulation {
            err: Some(failure),
            units_consumed,
            logs: vec!["Program log: failed".to_string()],
        }));
    }

    pub fn queue_send(&self, result: Result<(), Error>) {
        self.sends.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<MockRpcCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<MockRpcCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, MockRpcCall::Send { .. }))
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: MockRpcCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockRpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcTransport for MockRpcTransport {
    async fn get_latest_blockhash(&self) -> Result<Hash, Error> {
        self.record(MockRpcCall::GetLatestBlockhash);
        Ok(self.blockhash)
    }

    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<RpcSimulation, Error> {
        self.record(MockRpcCall::Simulate {
            compute_unit_limit: transaction_compute_unit_limit(transaction),
        });
        let queued = self.simulations.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(RpcSimulation {
                err: None,
                units_consumed: Some(MOCK_UNITS_CONSUMED),
                logs: vec![],
            })
        })
    }

    async fn send_and_confirm_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> Result<Signature, Error> {
        let signature = transaction.signatures[0];
        self.record(MockRpcCall::Send {
            skip_preflight,
            compute_unit_limit: transaction_compute_unit_limit(transaction),
            signature,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(gate) = &self.send_gate {
            let permit = gate.acquire().await;
            if let Ok(permit) = permit {
                permit.forget();
            }
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let queued = self.sends.lock().unwrap().pop_front();
        match queued {
            Some(Err(e)) => Err(e),
            _ => Ok(signature),
        }
    }
}

/// Mock RPC transport that fails every call with a connection error
pub struct FailingRpcTransport;

#[async_trait]
impl RpcTransport for FailingRpcTransport {
    async fn get_latest_blockhash(&self) -> Result<Hash, Error> {
        Err(RpcFailure::Connection("mock connection refused".to_string()).into())
    }

    async fn simulate_transaction(
        &self,
        _transaction: &VersionedTransaction,
    ) -> Result<RpcSimulation, Error> {
        Err(RpcFailure::Connection("mock connection refused".to_string()).into())
    }

    async fn send_and_confirm_transaction(
        &self,
        _transaction: &VersionedTransaction,
        _skip_preflight: bool,
    ) -> Result<Signature, Error> {
        Err(RpcFailure::Connection("mock connection refused".to_string()).into())
    }
}

/// Mock local simulator with scripted failures
pub struct MockSvm {
    blockhash: Hash,
    failures: Mutex<VecDeque<Option<SvmTransactionError>>>,
    processed: Mutex<Vec<VersionedTransaction>>,
    compute_units: u64,
}

impl MockSvm {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_from_array([9u8; 32]),
            failures: Mutex::new(VecDeque::new()),
            processed: Mutex::new(Vec::new()),
            compute_units: 150,
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    /// Script the next transaction: `None` succeeds, `Some` fails
    pub fn queue(&self, outcome: Option<SvmTransactionError>) {
        self.failures.lock().unwrap().push_back(outcome);
    }

    pub fn queue_failure(&self, err: SvmTransactionError) {
        self.queue(Some(err));
    }

    pub fn processed(&self) -> Vec<VersionedTransaction> {
        self.processed.lock().unwrap().clone()
    }

    fn metadata(&self, signature: Signature) -> SvmTransactionMetadata {
        SvmTransactionMetadata {
            signature,
            logs: vec![format!("Program {} invoke [1]", Pubkey::default())],
            compute_units_consumed: self.compute_units,
            return_data: None,
        }
    }
}

impl Default for MockSvm {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSvm for MockSvm {
    fn latest_blockhash(&self) -> Hash {
        self.blockhash
    }

    fn send_transaction(
        &self,
        transaction: VersionedTransaction,
    ) -> Result<SvmTransactionMetadata, SvmFailedTransaction> {
        let signature = transaction.signatures[0];
        self.processed.lock().unwrap().push(transaction);

        match self.failures.lock().unwrap().pop_front().flatten() {
            Some(err) => Err(SvmFailedTransaction {
                err,
                meta: self.metadata(signature),
            }),
            None => Ok(self.metadata(signature)),
        }
    }
}
