//! Integration tests for planning and executing transactions over RPC.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signer::Signer};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use solana_client_plugins::app::plugins::{payer, rpc, rpc_transaction_planning};
use solana_client_plugins::domain::{
    ComputeUnitEstimate, Error, ExecutionContext, InstructionFailure, InstructionPlan,
    MAX_COMPUTE_UNIT_LIMIT, PlanShape, RpcFailure, SharedSigner, TransactionErrorCode,
    TransactionFailure, TransactionMessage, TransactionStatus,
};
use solana_client_plugins::test_utils::{
    MockRpcCall, MockRpcTransport, instruction_with_data, new_signer, noop_instruction,
};
use solana_client_plugins::{Client, TransactionPlanningConfig};

fn create_client(
    rpc_transport: Arc<MockRpcTransport>,
    config: TransactionPlanningConfig,
) -> (Client, SharedSigner) {
    let signer = new_signer();
    let client = Client::new()
        .plugin(rpc(rpc_transport))
        .unwrap()
        .plugin(payer(signer.clone()))
        .unwrap()
        .plugin(rpc_transaction_planning(config))
        .unwrap();
    (client, signer)
}

#[tokio::test]
async fn test_send_instruction_estimates_compute_units() {
    let transport = Arc::new(MockRpcTransport::new());
    let (client, signer) = create_client(transport.clone(), TransactionPlanningConfig::default());

    let result = client
        .send_transaction(
            noop_instruction(Pubkey::new_unique(), signer.as_ref()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.is_successful());
    match result.context() {
        Some(ExecutionContext::Rpc {
            signature,
            compute_unit_estimate,
        }) => {
            assert_eq!(Some(*signature), result.transaction().map(|tx| tx.signatures[0]));
            assert_eq!(*compute_unit_estimate, Some(ComputeUnitEstimate::Estimated(5_500)));
        }
        other => panic!("unexpected context: {:?}", other),
    }
    assert_eq!(result.message.lifetime(), Some(transport.blockhash()));

    let calls = transport.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], MockRpcCall::GetLatestBlockhash);
    assert_eq!(
        calls[1],
        MockRpcCall::Simulate {
            compute_unit_limit: Some(MAX_COMPUTE_UNIT_LIMIT)
        }
    );
    assert!(matches!(
        calls[2],
        MockRpcCall::Send {
            skip_preflight: true,
            compute_unit_limit: Some(5_500),
            ..
        }
    ));
}

#[tokio::test]
async fn test_explicit_limit_skips_estimation() {
    let transport = Arc::new(MockRpcTransport::new());
    let (client, signer) = create_client(transport.clone(), TransactionPlanningConfig::default());

    let message = TransactionMessage::new()
        .with_fee_payer_signer(signer.clone())
        .with_compute_unit_limit(300_000)
        .with_instruction(noop_instruction(Pubkey::new_unique(), signer.as_ref()));

    let result = client
        .send_transaction(message, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_successful());
    let calls = transport.calls();
    assert!(!calls.iter().any(|c| matches!(c, MockRpcCall::Simulate { .. })));
    assert!(matches!(
        calls.last(),
        Some(MockRpcCall::Send {
            skip_preflight: false,
            compute_unit_limit: Some(300_000),
            ..
        })
    ));
}

#[tokio::test]
async fn test_explicit_limit_keeps_configured_skip_preflight() {
    let transport = Arc::new(MockRpcTransport::new());
    let (client, signer) = create_client(
        transport.clone(),
        TransactionPlanningConfig::default().with_skip_preflight(true),
    );

    let message = TransactionMessage::new()
        .with_fee_payer_signer(signer.clone())
        .with_compute_unit_limit(300_000)
        .with_instruction(noop_instruction(Pubkey::new_unique(), signer.as_ref()));

    let result = client
        .send_transaction(message, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        result.context(),
        Some(ExecutionContext::Rpc {
            compute_unit_estimate: None,
            ..
        })
    ));
    let calls = transport.calls();
    assert!(!calls.iter().any(|c| matches!(c, MockRpcCall::Simulate { .. })));
    assert!(matches!(
        calls.last(),
        Some(MockRpcCall::Send {
            skip_preflight: true,
            compute_unit_limit: Some(300_000),
            ..
        })
    ));
}

#[tokio::test]
async fn test_maximum_limit_is_estimated_over_rpc() {
    let transport = Arc::new(MockRpcTransport::new());
    let (client, signer) = create_client(transport.clone(), TransactionPlanningConfig::default());

    let message = TransactionMessage::new()
        .with_fee_payer_signer(signer.clone())
        .with_compute_unit_limit(MAX_COMPUTE_UNIT_LIMIT)
        .with_instruction(noop_instruction(Pubkey::new_unique(), signer.as_ref()));

    client
        .send_transaction(message, &CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        transport.sends()[0],
        MockRpcCall::Send {
            compute_unit_limit: Some(5_500),
            ..
        }
    ));
}

#[tokio::test]
async fn test_failed_simulation_stops_before_send() {
    let transport = Arc::new(MockRpcTransport::new());
    transport.queue_failed_simulation(
        TransactionFailure::InstructionError {
            index: 1,
            error: InstructionFailure::Custom(6000),
        },
        Some(4_200),
    );
    let (client, signer) = create_client(transport.clone(), TransactionPlanningConfig::default());

    let err = client
        .send_transaction(
            noop_instruction(Pubkey::new_unique(), signer.as_ref()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    // The simulation wrapper is removed before the failure is reported.
    assert!(matches!(
        err.cause(),
        Some(Error::Transaction(TransactionFailure::InstructionError { index: 1, .. }))
    ));
    assert_eq!(err.transaction_failure().and_then(|f| f.custom_program_error()), Some(6000));
    assert!(transport.sends().is_empty());

    let result = err.transaction_plan_result().unwrap();
    let single = result.results()[0];
    assert!(single.transaction().is_none());
    assert_eq!(single.message.lifetime(), Some(transport.blockhash()));
}

#[tokio::test]
async fn test_failed_simulation_recovered_when_skipping_preflight() {
    let transport = Arc::new(MockRpcTransport::new());
    transport.queue_failed_simulation(
        TransactionFailure::Fieldless(TransactionErrorCode::AccountNotFound),
        Some(4_200),
    );
    let (client, signer) = create_client(
        transport.clone(),
        TransactionPlanningConfig::default().with_skip_preflight(true),
    );

    let result = client
        .send_transaction(
            noop_instruction(Pubkey::new_unique(), signer.as_ref()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(
        result.context(),
        Some(ExecutionContext::Rpc {
            compute_unit_estimate: Some(ComputeUnitEstimate::RecoveredFromFailure(4_620)),
            ..
        })
    ));
    assert!(matches!(
        transport.sends()[0],
        MockRpcCall::Send {
            skip_preflight: true,
            compute_unit_limit: Some(4_620),
            ..
        }
    ));
}

#[tokio::test]
async fn test_send_failure_keeps_signed_transaction() {
    let transport = Arc::new(MockRpcTransport::new());
    transport.queue_send(Err(TransactionFailure::Fieldless(
        TransactionErrorCode::BlockhashNotFound,
    )
    .into()));
    let (client, signer) = create_client(transport.clone(), TransactionPlanningConfig::default());

    let err = client
        .send_transaction(
            noop_instruction(Pubkey::new_unique(), signer.as_ref()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.is_transaction_error(TransactionErrorCode::BlockhashNotFound));
    let result = err.transaction_plan_result().unwrap();
    let single = result.results()[0];
    match &single.status {
        TransactionStatus::Failed {
            transaction: Some(transaction),
            context: Some(context),
            ..
        } => assert_eq!(context.signature(), transaction.signatures[0]),
        other => panic!("unexpected status: {:?}", other),
    }
}

#[tokio::test]
async fn test_sequential_failure_cancels_remaining_transactions() {
    let transport = Arc::new(MockRpcTransport::new());
    transport.queue_send(Ok(()));
    transport.queue_send(Err(RpcFailure::Timeout("slow node".to_string()).into()));
    let (client, signer) = create_client(transport.clone(), TransactionPlanningConfig::default());

    let plan = InstructionPlan::sequential(
        (0..3).map(|_| InstructionPlan::single(instruction_with_data(&signer.pubkey(), 700))),
    );
    let err = client
        .send_transactions(plan, &CancellationToken::new())
        .await
        .unwrap_err();

    let result = err.transaction_plan_result().unwrap();
    assert_eq!(
        result.shape(),
        PlanShape::Sequential(vec![PlanShape::Single; 3])
    );
    let statuses: Vec<&str> = result.results().iter().map(|r| r.status.as_str()).collect();
    assert_eq!(statuses, vec!["successful", "failed", "canceled"]);
    assert!(matches!(err.cause(), Some(Error::Rpc(RpcFailure::Timeout(_)))));
    assert_eq!(transport.sends().len(), 2);
}

/// Wait until the transport has recorded `count` sends
async fn wait_for_sends(transport: &MockRpcTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while transport.sends().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_parallel_sends_respect_max_concurrency() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockRpcTransport::gated(gate.clone()));
    let (client, signer) = create_client(
        transport.clone(),
        TransactionPlanningConfig::default().with_max_concurrency(2),
    );

    let mut messages = Vec::new();
    for _ in 0..4 {
        let message = client
            .plan_transaction(
                noop_instruction(Pubkey::new_unique(), signer.as_ref()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        messages.push(message);
    }

    let task = tokio::spawn(async move {
        client
            .send_transactions(messages, &CancellationToken::new())
            .await
    });

    // Two sends start, the other two wait for a slot.
    wait_for_sends(&transport, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.sends().len(), 2);
    assert_eq!(transport.in_flight(), 2);

    // Each finished send lets exactly one more start.
    for expected in [3, 4] {
        gate.add_permits(1);
        wait_for_sends(&transport, expected).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.sends().len(), expected);
        assert!(transport.in_flight() <= 2);
    }

    gate.add_permits(2);
    let result = task.await.unwrap().unwrap();

    assert_eq!(result.shape(), PlanShape::Parallel(vec![PlanShape::Single; 4]));
    assert!(result.is_successful());
    assert_eq!(transport.peak_in_flight(), 2);
}

#[tokio::test]
async fn test_cancel_while_sending() {
    let gate = Arc::new(Semaphore::new(0));
    let transport = Arc::new(MockRpcTransport::gated(gate));
    let (client, signer) = create_client(transport.clone(), TransactionPlanningConfig::default());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = client
        .send_transaction(noop_instruction(Pubkey::new_unique(), signer.as_ref()), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_priority_fees_are_added() {
    let transport = Arc::new(MockRpcTransport::new());
    let (client, signer) = create_client(
        transport,
        TransactionPlanningConfig::default().with_priority_fees(1_000),
    );

    let message = client
        .plan_transaction(
            noop_instruction(Pubkey::new_unique(), signer.as_ref()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let compute_budget = solana_compute_budget_interface::id();
    let budget_instructions = message
        .instructions()
        .iter()
        .filter(|ix| ix.program_id == compute_budget)
        .count();
    assert_eq!(budget_instructions, 2);
}
