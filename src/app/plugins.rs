//! Plugins installing backends, the payer and transaction planning.

use std::sync::Arc;

use solana_sdk::signer::Signer;
use tracing::info;

use super::client::{Backend, Client, Plugin};
use super::config::TransactionPlanningConfig;
use super::executor::PlanExecutor;
use super::limiter::ConcurrencyLimiter;
use super::planner::{ComputeUnitLimitPolicy, TransactionPlanner};
use crate::domain::{ConfigError, LocalSvm, RpcTransport, SharedSigner};
use crate::infra::{RpcTransactionExecutor, SvmTransactionExecutor};

/// Use a JSON-RPC node as backend
pub fn rpc(transport: Arc<dyn RpcTransport>) -> impl Plugin {
    move |client: Client| -> Result<Client, ConfigError> {
        Ok(Client {
            backend: Some(Backend::Rpc(transport)),
            ..client
        })
    }
}

/// Use a local simulator as backend
pub fn svm(svm: Arc<dyn LocalSvm>) -> impl Plugin {
    move |client: Client| -> Result<Client, ConfigError> {
        Ok(Client {
            backend: Some(Backend::Svm(svm)),
            ..client
        })
    }
}

/// Default fee payer for planned transactions
pub fn payer(signer: SharedSigner) -> impl Plugin {
    move |client: Client| -> Result<Client, ConfigError> {
        Ok(Client {
            payer: Some(signer),
            ..client
        })
    }
}

/// Install planning and execution for whichever backend is installed
pub fn transaction_planning(config: TransactionPlanningConfig) -> impl Plugin {
    move |client: Client| -> Result<Client, ConfigError> {
        if client.rpc().is_some() {
            rpc_transaction_planning(config).install(client)
        } else if client.svm().is_some() {
            svm_transaction_planning(config).install(client)
        } else {
            Err(ConfigError::MissingBackend("RPC or SVM"))
        }
    }
}

/// Planning with provisory compute-unit limits, executed over RPC
/// with compute-unit estimation.
pub fn rpc_transaction_planning(config: TransactionPlanningConfig) -> impl Plugin {
    move |client: Client| -> Result<Client, ConfigError> {
        let rpc = client
            .rpc()
            .cloned()
            .ok_or(ConfigError::MissingBackend("RPC"))?;
        let payer = resolve_payer(&config, &client)?;
        let limiter = ConcurrencyLimiter::new(config.max_concurrency)?;

        info!(
            payer = %payer.pubkey(),
            max_concurrency = config.max_concurrency,
            priority_fees = ?config.priority_fees,
            skip_preflight = config.skip_preflight,
            "Installing RPC transaction planning"
        );

        let planner = TransactionPlanner::new(
            payer,
            config.priority_fees,
            ComputeUnitLimitPolicy::Provisory,
        );
        let executor = PlanExecutor::new(
            Arc::new(RpcTransactionExecutor::new(rpc, config.skip_preflight)),
            limiter,
        );

        Ok(Client {
            transaction_planner: Some(Arc::new(planner)),
            transaction_plan_executor: Some(Arc::new(executor)),
            ..client
        })
    }
}

/// Planning without compute-unit limits, executed against the simulator
pub fn svm_transaction_planning(config: TransactionPlanningConfig) -> impl Plugin {
    move |client: Client| -> Result<Client, ConfigError> {
        let svm = client
            .svm()
            .cloned()
            .ok_or(ConfigError::MissingBackend("SVM"))?;
        let payer = resolve_payer(&config, &client)?;
        let limiter = ConcurrencyLimiter::new(config.max_concurrency)?;

        info!(
            payer = %payer.pubkey(),
            max_concurrency = config.max_concurrency,
            "Installing SVM transaction planning"
        );

        let planner =
            TransactionPlanner::new(payer, config.priority_fees, ComputeUnitLimitPolicy::Omit);
        let executor = PlanExecutor::new(Arc::new(SvmTransactionExecutor::new(svm)), limiter);

        Ok(Client {
            transaction_planner: Some(Arc::new(planner)),
            transaction_plan_executor: Some(Arc::new(executor)),
            ..client
        })
    }
}

fn resolve_payer(
    config: &TransactionPlanningConfig,
    client: &Client,
) -> Result<SharedSigner, ConfigError> {
    config
        .payer
        .clone()
        .or_else(|| client.payer().cloned())
        .ok_or(ConfigError::MissingPayer)
}
