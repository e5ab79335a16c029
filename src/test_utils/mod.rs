//! Test utilities: mock backends and message builders.

pub mod mocks;

pub use mocks::{
    FailingRpcTransport, MOCK_UNITS_CONSUMED, MockRpcCall, MockRpcTransport, MockSvm,
    transaction_compute_unit_limit,
};

use std::sync::Arc;

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signer::{Signer, keypair::Keypair},
};

use crate::domain::SharedSigner;

/// A fresh random signer
pub fn new_signer() -> SharedSigner {
    Arc::new(Keypair::new())
}

/// Instruction with `len` bytes of data for a random program, signed by `signer`
pub fn instruction_with_data(signer: &Pubkey, len: usize) -> Instruction {
    Instruction::new_with_bytes(
        Pubkey::new_unique(),
        &vec![1u8; len],
        vec![AccountMeta::new(*signer, true)],
    )
}

/// Small instruction for `program`, signed by `signer`
pub fn noop_instruction(program: Pubkey, signer: &dyn Signer) -> Instruction {
    Instruction::new_with_bytes(program, &[0u8; 8], vec![AccountMeta::new(signer.pubkey(), true)])
}
