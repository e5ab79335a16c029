//! JSON-RPC backend: transport, error normalization and per-transaction executor.

pub mod compute_units;
pub mod errors;
pub mod executor;
pub mod solana;

pub use compute_units::{
    estimate_and_update_compute_unit_limit, estimate_compute_units, with_buffer,
};
pub use errors::{
    RpcErrorCode, map_solana_client_error, transaction_failure_from_json,
    transaction_failure_from_serializable,
};
pub use executor::RpcTransactionExecutor;
pub use solana::{RpcTransportConfig, SolanaRpcTransport, keypair_from_base58};
