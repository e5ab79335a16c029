//! JSON-RPC transport backed by the Solana nonblocking client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use secrecy::{ExposeSecret, SecretString};
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig};
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    hash::Hash, signature::Signature, signer::keypair::Keypair, transaction::VersionedTransaction,
};
use tracing::{debug, info, instrument, warn};

use super::errors::{map_solana_client_error, transaction_failure_from_serializable};
use crate::domain::{ConfigError, Error, RpcFailure, RpcSimulation, RpcTransport};

/// Configuration for the RPC transport
#[derive(Debug, Clone)]
pub struct RpcTransportConfig {
    pub timeout: Duration,
    /// Retries after the first attempt, for idempotent reads that fail on
    /// connection or timeout
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub commitment: CommitmentConfig,
}

impl Default for RpcTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            commitment: CommitmentConfig::confirmed(),
        }
    }
}

/// [`RpcTransport`] over HTTP JSON-RPC
pub struct SolanaRpcTransport {
    client: SolanaRpcClient,
    config: RpcTransportConfig,
}

impl SolanaRpcTransport {
    #[must_use]
    pub fn new(rpc_url: &str, config: RpcTransportConfig) -> Self {
        let client = SolanaRpcClient::new_with_timeout_and_commitment(
            rpc_url.to_string(),
            config.timeout,
            config.commitment,
        );
        Self { client, config }
    }

    #[must_use]
    pub fn with_defaults(rpc_url: &str) -> Self {
        Self::new(rpc_url, RpcTransportConfig::default())
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    /// Retry connection failures and timeouts with a fixed delay
    async fn with_retries<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(Error::Rpc(RpcFailure::Connection(msg) | RpcFailure::Timeout(msg)))
                    if attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    warn!(operation, attempt, error = %msg, "RPC call failed, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    /// Poll signature statuses until the commitment is reached or time runs out
    async fn wait_for_confirmation(&self, signature: &Signature) -> Result<(), Error> {
        let start = Instant::now();

        while start.elapsed() < self.config.confirmation_timeout {
            match self
                .client
                .get_signature_status_with_commitment(signature, self.config.commitment)
                .await
            {
                Ok(Some(Ok(()))) => {
                    info!(signature = %signature, "Transaction confirmed");
                    return Ok(());
                }
                Ok(Some(Err(transaction_error))) => {
                    return Err(transaction_failure_from_serializable(&transaction_error)?.into());
                }
                Ok(None) => {
                    debug!(signature = %signature, "Transaction not yet confirmed");
                }
                Err(e) => {
                    warn!(signature = %signature, error = %e, "Error checking transaction status");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(Error::Rpc(RpcFailure::Timeout(format!(
            "Transaction {} not confirmed within {}s",
            signature,
            self.config.confirmation_timeout.as_secs()
        ))))
    }
}

#[async_trait]
impl RpcTransport for SolanaRpcTransport {
    #[instrument(skip(self))]
    async fn get_latest_blockhash(&self) -> Result<Hash, Error> {
        self.with_retries("getLatestBlockhash", || async {
            self.client
                .get_latest_blockhash()
                .await
                .map_err(map_solana_client_error)
        })
        .await
    }

    #[instrument(skip_all)]
    async fn simulate_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<RpcSimulation, Error> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(self.config.commitment),
            ..Default::default()
        };

        let response = self
            .with_retries("simulateTransaction", || async {
                self.client
                    .simulate_transaction_with_config(transaction, config.clone())
                    .await
                    .map_err(map_solana_client_error)
            })
            .await?;

        let result = response.value;
        let err = result
            .err
            .as_ref()
            .map(transaction_failure_from_serializable)
            .transpose()?;

        Ok(RpcSimulation {
            err,
            units_consumed: result.units_consumed,
            logs: result.logs.unwrap_or_default(),
        })
    }

    #[instrument(skip_all, fields(skip_preflight = skip_preflight))]
    async fn send_and_confirm_transaction(
        &self,
        transaction: &VersionedTransaction,
        skip_preflight: bool,
    ) -> Result<Signature, Error> {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            preflight_commitment: Some(self.config.commitment.commitment),
            ..Default::default()
        };

        let signature = self
            .client
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(map_solana_client_error)?;
        debug!(signature = %signature, "Transaction sent");

        self.wait_for_confirmation(&signature).await?;
        Ok(signature)
    }
}

/// Parse a base58-encoded private key into a keypair.
/// Accepts a 32-byte seed or a 64-byte keypair.
pub fn keypair_from_base58(secret: &SecretString) -> Result<Keypair, ConfigError> {
    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| ConfigError::InvalidPayerKey(e.to_string()))?;

    let seed: [u8; 32] = match key_bytes.len() {
        // Solana keypair format: first 32 bytes are the secret key
        32 | 64 => key_bytes[..32]
            .try_into()
            .map_err(|_| ConfigError::InvalidPayerKey("Invalid keypair format".to_string()))?,
        len => {
            return Err(ConfigError::InvalidPayerKey(format!(
                "Key must be 32 or 64 bytes, got {}",
                len
            )));
        }
    };

    let signing_key = SigningKey::from_bytes(&seed);
    Keypair::try_from(signing_key.to_keypair_bytes().as_slice())
        .map_err(|e| ConfigError::InvalidPayerKey(e.to_string()))
}
