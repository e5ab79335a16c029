//! Infrastructure layer implementations.

pub mod rpc;
pub mod svm;

pub use rpc::{
    RpcTransactionExecutor, RpcTransportConfig, SolanaRpcTransport, keypair_from_base58,
};
pub use svm::SvmTransactionExecutor;
