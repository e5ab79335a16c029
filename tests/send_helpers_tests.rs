//! Integration tests for the plan and send helpers on `Client`.

use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signer::Signer};
use tokio_util::sync::CancellationToken;

use solana_client_plugins::app::plugins::{payer, rpc, svm, transaction_planning};
use solana_client_plugins::domain::{
    ConfigError, Error, PlanShape, PlanningError, TransactionMessage, TransactionPlan,
};
use solana_client_plugins::test_utils::{
    FailingRpcTransport, MockRpcTransport, MockSvm, instruction_with_data, new_signer,
    noop_instruction,
};
use solana_client_plugins::{Client, TransactionPlanningConfig};

fn svm_client() -> Client {
    Client::new()
        .plugin(svm(Arc::new(MockSvm::new())))
        .unwrap()
        .plugin(transaction_planning(
            TransactionPlanningConfig::default().with_payer(new_signer()),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_plan_transaction_rejects_fan_out() {
    let client = svm_client();
    assert!(client.payer().is_none());
    let fee_payer = client
        .transaction_planner()
        .unwrap()
        .create_message()
        .fee_payer()
        .unwrap();
    let instructions = vec![
        instruction_with_data(&fee_payer, 800),
        instruction_with_data(&fee_payer, 800),
    ];

    let err = client
        .plan_transaction(instructions, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Planning(PlanningError::ExpectedSingleTransactionPlan { count: 2 })
    ));
}

#[tokio::test]
async fn test_transaction_plans_pass_through_planning() {
    let client = svm_client();
    let signer = new_signer();
    let messages: Vec<TransactionMessage> = (0..3)
        .map(|_| {
            TransactionMessage::new()
                .with_fee_payer_signer(signer.clone())
                .with_instruction(noop_instruction(Pubkey::new_unique(), signer.as_ref()))
        })
        .collect();
    let plan = TransactionPlan::sequential(messages.into_iter().map(TransactionPlan::Single));

    let planned = client
        .plan_transactions(plan.clone(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(planned.shape(), plan.shape());
    assert_eq!(planned.len(), 3);
    for message in planned.messages() {
        assert_eq!(message.fee_payer(), Some(signer.pubkey()));
    }
}

#[tokio::test]
async fn test_send_transactions_keeps_plan_shape() {
    let client = svm_client();
    let fee_payer = client
        .transaction_planner()
        .unwrap()
        .create_message()
        .fee_payer()
        .unwrap();

    let result = client
        .send_transactions(
            vec![
                instruction_with_data(&fee_payer, 900),
                instruction_with_data(&fee_payer, 900),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        result.shape(),
        PlanShape::Sequential(vec![PlanShape::Single; 2])
    );
    assert!(result.is_successful());
}

#[tokio::test]
async fn test_send_without_planning_plugin() {
    let client = Client::new()
        .plugin(rpc(Arc::new(MockRpcTransport::new())))
        .unwrap()
        .plugin(payer(new_signer()))
        .unwrap();

    let err = client
        .send_transaction(
            noop_instruction(Pubkey::new_unique(), new_signer().as_ref()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::MissingCapability(_))));
}

#[tokio::test]
async fn test_planning_plugin_requires_backend() {
    let err = Client::new()
        .plugin(payer(new_signer()))
        .unwrap()
        .plugin(transaction_planning(TransactionPlanningConfig::default()))
        .unwrap_err();

    assert!(matches!(err, ConfigError::MissingBackend(_)));
}

#[tokio::test]
async fn test_planning_plugin_requires_payer() {
    let err = Client::new()
        .plugin(rpc(Arc::new(MockRpcTransport::new())))
        .unwrap()
        .plugin(transaction_planning(TransactionPlanningConfig::default()))
        .unwrap_err();

    assert_eq!(err, ConfigError::MissingPayer);
}

#[tokio::test]
async fn test_unreachable_node_fails_the_plan() {
    let signer = new_signer();
    let client = Client::new()
        .plugin(rpc(Arc::new(FailingRpcTransport)))
        .unwrap()
        .plugin(payer(signer.clone()))
        .unwrap()
        .plugin(transaction_planning(TransactionPlanningConfig::default()))
        .unwrap();

    let err = client
        .send_transaction(
            noop_instruction(Pubkey::new_unique(), signer.as_ref()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.transaction_plan_result().is_some());
    assert!(matches!(
        err.cause(),
        Some(Error::Rpc(solana_client_plugins::domain::RpcFailure::Connection(_)))
    ));
}
