//! Command-line entry point: sends a self-transfer through the plugin client.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::SecretString;
use solana_sdk::signer::Signer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use solana_client_plugins::app::plugins::{payer, rpc, transaction_planning};
use solana_client_plugins::domain::SharedSigner;
use solana_client_plugins::infra::rpc::{
    RpcTransportConfig, SolanaRpcTransport, keypair_from_base58,
};
use solana_client_plugins::{Client, TransactionPlanningConfig};

/// Application configuration
struct Config {
    rpc_url: String,
    payer: SharedSigner,
    lamports: u64,
}

impl Config {
    fn from_env() -> Result<Self> {
        let rpc_url = env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string());
        let lamports = env::var("TRANSFER_LAMPORTS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1);

        Ok(Self {
            rpc_url,
            payer: Self::load_payer()?,
            lamports,
        })
    }

    fn load_payer() -> Result<SharedSigner> {
        let key_str = env::var("PAYER_PRIVATE_KEY").map_err(|_| {
            anyhow::anyhow!(
                "PAYER_PRIVATE_KEY environment variable is not set.\n\
                 Please set it to a Base58-encoded Solana private key."
            )
        })?;

        if key_str.is_empty() {
            anyhow::bail!("PAYER_PRIVATE_KEY environment variable is empty.");
        }

        let secret = SecretString::from(key_str);
        let keypair = keypair_from_base58(&secret)
            .context("Failed to parse PAYER_PRIVATE_KEY as Base58")?;
        Ok(Arc::new(keypair))
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,solana_client=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("Solana client plugins v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let payer_pubkey = config.payer.pubkey();
    info!(payer = %payer_pubkey, rpc_url = %config.rpc_url, "Configuration loaded");

    let transport = SolanaRpcTransport::new(&config.rpc_url, RpcTransportConfig::default());
    let client = Client::new()
        .plugin(rpc(Arc::new(transport)))?
        .plugin(payer(config.payer))?
        .plugin(transaction_planning(TransactionPlanningConfig::from_env()))?;

    let cancel = CancellationToken::new();
    let on_shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_shutdown.cancel();
    });

    let transfer = solana_system_interface::instruction::transfer(
        &payer_pubkey,
        &payer_pubkey,
        config.lamports,
    );
    let result = client
        .send_transaction(transfer, &cancel)
        .await
        .context("Self-transfer failed")?;

    match result.signature() {
        Some(signature) => info!(signature = %signature, "Self-transfer confirmed"),
        None => warn!(status = %result.status, "Self-transfer finished without a signature"),
    }
    Ok(())
}
