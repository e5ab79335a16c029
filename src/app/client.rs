//! Immutable client assembled from plugins.

use std::fmt;
use std::sync::Arc;

use solana_sdk::signer::Signer;

use super::planner::TransactionPlanner;
use crate::domain::{ConfigError, LocalSvm, RpcTransport, SharedSigner, TransactionPlanExecutor};

/// Backend the client talks to
#[derive(Clone)]
pub enum Backend {
    Rpc(Arc<dyn RpcTransport>),
    Svm(Arc<dyn LocalSvm>),
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpc(_) => "rpc",
            Self::Svm(_) => "svm",
        }
    }
}

/// Extends a client with new capabilities.
///
/// Installing a plugin returns a new client. Any closure taking and
/// returning a [`Client`] is a plugin.
pub trait Plugin {
    fn install(self, client: Client) -> Result<Client, ConfigError>;
}

impl<F> Plugin for F
where
    F: FnOnce(Client) -> Result<Client, ConfigError>,
{
    fn install(self, client: Client) -> Result<Client, ConfigError> {
        self(client)
    }
}

/// Bundle of capabilities installed by plugins
#[derive(Clone, Default)]
pub struct Client {
    pub(crate) backend: Option<Backend>,
    pub(crate) payer: Option<SharedSigner>,
    pub(crate) transaction_planner: Option<Arc<TransactionPlanner>>,
    pub(crate) transaction_plan_executor: Option<Arc<dyn TransactionPlanExecutor>>,
}

impl Client {
    /// A client with no capabilities
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a plugin, returning the extended client
    pub fn plugin(self, plugin: impl Plugin) -> Result<Self, ConfigError> {
        plugin.install(self)
    }

    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    pub fn rpc(&self) -> Option<&Arc<dyn RpcTransport>> {
        match &self.backend {
            Some(Backend::Rpc(rpc)) => Some(rpc),
            _ => None,
        }
    }

    pub fn svm(&self) -> Option<&Arc<dyn LocalSvm>> {
        match &self.backend {
            Some(Backend::Svm(svm)) => Some(svm),
            _ => None,
        }
    }

    pub fn payer(&self) -> Option<&SharedSigner> {
        self.payer.as_ref()
    }

    pub fn transaction_planner(&self) -> Result<&TransactionPlanner, ConfigError> {
        self.transaction_planner
            .as_deref()
            .ok_or(ConfigError::MissingCapability("transaction planner"))
    }

    pub fn transaction_plan_executor(&self) -> Result<&dyn TransactionPlanExecutor, ConfigError> {
        self.transaction_plan_executor
            .as_deref()
            .ok_or(ConfigError::MissingCapability("transaction plan executor"))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("backend", &self.backend.as_ref().map(Backend::as_str))
            .field("payer", &self.payer.as_ref().map(|payer| payer.pubkey()))
            .field("transaction_planner", &self.transaction_planner)
            .field(
                "transaction_plan_executor",
                &self.transaction_plan_executor.is_some(),
            )
            .finish()
    }
}
