//! Transaction planning configuration.

use std::env;
use std::fmt;

use solana_sdk::signer::Signer;

use crate::domain::SharedSigner;

/// Default number of transactions executed at the same time
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Configuration shared by the planning plugins
#[derive(Clone)]
pub struct TransactionPlanningConfig {
    /// Fee payer. Falls back to the payer installed on the client.
    pub payer: Option<SharedSigner>,
    /// Compute-unit price in micro-lamports, added to every planned message
    pub priority_fees: Option<u64>,
    /// Maximum number of transactions in flight
    pub max_concurrency: usize,
    /// Skip preflight checks when sending over RPC
    pub skip_preflight: bool,
}

impl Default for TransactionPlanningConfig {
    fn default() -> Self {
        Self {
            payer: None,
            priority_fees: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            skip_preflight: false,
        }
    }
}

impl TransactionPlanningConfig {
    /// Load the optional knobs from the environment:
    /// `PRIORITY_FEES`, `MAX_CONCURRENCY` and `SKIP_PREFLIGHT`.
    #[must_use]
    pub fn from_env() -> Self {
        let priority_fees = env::var("PRIORITY_FEES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|fees| *fees > 0);

        let max_concurrency = env::var("MAX_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_CONCURRENCY);

        let skip_preflight = env::var("SKIP_PREFLIGHT")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            payer: None,
            priority_fees,
            max_concurrency,
            skip_preflight,
        }
    }

    #[must_use]
    pub fn with_payer(mut self, payer: SharedSigner) -> Self {
        self.payer = Some(payer);
        self
    }

    #[must_use]
    pub fn with_priority_fees(mut self, micro_lamports: u64) -> Self {
        self.priority_fees = Some(micro_lamports);
        self
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    #[must_use]
    pub fn with_skip_preflight(mut self, skip_preflight: bool) -> Self {
        self.skip_preflight = skip_preflight;
        self
    }
}

impl fmt::Debug for TransactionPlanningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionPlanningConfig")
            .field("payer", &self.payer.as_ref().map(|payer| payer.pubkey()))
            .field("priority_fees", &self.priority_fees)
            .field("max_concurrency", &self.max_concurrency)
            .field("skip_preflight", &self.skip_preflight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransactionPlanningConfig::default();
        assert!(config.payer.is_none());
        assert_eq!(config.priority_fees, None);
        assert_eq!(config.max_concurrency, 10);
        assert!(!config.skip_preflight);
    }

    #[test]
    fn test_builder_methods() {
        let config = TransactionPlanningConfig::default()
            .with_priority_fees(5_000)
            .with_max_concurrency(3)
            .with_skip_preflight(true);
        assert_eq!(config.priority_fees, Some(5_000));
        assert_eq!(config.max_concurrency, 3);
        assert!(config.skip_preflight);
    }
}
