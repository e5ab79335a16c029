//! Transaction messages and their pure transformations.
//!
//! A [`TransactionMessage`] is never mutated in place: every `with_*` method
//! consumes the message and returns the transformed copy.

use std::fmt;
use std::sync::Arc;

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{VersionedMessage, v0},
    pubkey::Pubkey,
    signature::Signature,
    signer::Signer,
    transaction::VersionedTransaction,
};

use super::error::{Error, PlanningError};

/// Maximum size of a serialized transaction, in bytes
pub const TRANSACTION_SIZE_LIMIT: usize = 1232;

/// Placeholder compute-unit limit that must be replaced by an estimate
pub const PROVISORY_COMPUTE_UNIT_LIMIT: u32 = 0;

/// Highest compute-unit limit a transaction may request
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

const SET_COMPUTE_UNIT_LIMIT_DISCRIMINATOR: u8 = 2;

/// A signer that can be shared across concurrently executing transactions
pub type SharedSigner = Arc<dyn Signer + Send + Sync>;

/// Compute-unit limit found on a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeUnitLimit {
    /// No limit instruction
    Missing,
    /// The provisory sentinel
    Provisory,
    /// The maximum sentinel
    Maximum,
    /// A caller-supplied value
    Explicit(u32),
}

impl ComputeUnitLimit {
    pub fn from_units(units: u32) -> Self {
        match units {
            PROVISORY_COMPUTE_UNIT_LIMIT => Self::Provisory,
            MAX_COMPUTE_UNIT_LIMIT => Self::Maximum,
            units => Self::Explicit(units),
        }
    }

    /// Only explicit limits are trusted as-is
    pub fn needs_estimation(&self) -> bool {
        !matches!(self, Self::Explicit(_))
    }
}

/// Decode a `SetComputeUnitLimit` instruction
pub fn compute_unit_limit_of(instruction: &Instruction) -> Option<u32> {
    if instruction.program_id != solana_compute_budget_interface::id() {
        return None;
    }
    match instruction.data.as_slice() {
        [SET_COMPUTE_UNIT_LIMIT_DISCRIMINATOR, a, b, c, d] => {
            Some(u32::from_le_bytes([*a, *b, *c, *d]))
        }
        _ => None,
    }
}

/// An unsigned transaction message: fee payer, instructions and lifetime
#[derive(Clone, Default)]
pub struct TransactionMessage {
    fee_payer: Option<Pubkey>,
    instructions: Vec<Instruction>,
    lifetime: Option<Hash>,
    signers: Vec<SharedSigner>,
}

impl TransactionMessage {
    /// Create an empty message
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.fee_payer
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn lifetime(&self) -> Option<Hash> {
        self.lifetime
    }

    pub fn signers(&self) -> &[SharedSigner] {
        &self.signers
    }

    #[must_use]
    pub fn with_fee_payer(mut self, fee_payer: Pubkey) -> Self {
        self.fee_payer = Some(fee_payer);
        self
    }

    /// Set the fee payer and attach it as a signer
    #[must_use]
    pub fn with_fee_payer_signer(self, signer: SharedSigner) -> Self {
        let fee_payer = signer.pubkey();
        self.with_fee_payer(fee_payer).with_signer(signer)
    }

    /// Attach a signer. Signers whose key is already attached are ignored.
    #[must_use]
    pub fn with_signer(mut self, signer: SharedSigner) -> Self {
        let key = signer.pubkey();
        if !self.signers.iter().any(|existing| existing.pubkey() == key) {
            self.signers.push(signer);
        }
        self
    }

    #[must_use]
    pub fn with_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    #[must_use]
    pub fn with_instructions(
        mut self,
        instructions: impl IntoIterator<Item = Instruction>,
    ) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Bind the message to a recent blockhash
    #[must_use]
    pub fn with_lifetime(mut self, blockhash: Hash) -> Self {
        self.lifetime = Some(blockhash);
        self
    }

    /// Rewrite the compute-unit limit instruction, or append one if missing
    #[must_use]
    pub fn with_compute_unit_limit(mut self, units: u32) -> Self {
        let instruction = ComputeBudgetInstruction::set_compute_unit_limit(units);
        match self
            .instructions
            .iter()
            .position(|ix| compute_unit_limit_of(ix).is_some())
        {
            Some(index) => self.instructions[index] = instruction,
            None => self.instructions.push(instruction),
        }
        self
    }

    /// Append a priority fee, in micro-lamports per compute unit
    #[must_use]
    pub fn with_compute_unit_price(self, micro_lamports: u64) -> Self {
        self.with_instruction(ComputeBudgetInstruction::set_compute_unit_price(
            micro_lamports,
        ))
    }

    pub fn compute_unit_limit(&self) -> ComputeUnitLimit {
        self.instructions
            .iter()
            .find_map(compute_unit_limit_of)
            .map(ComputeUnitLimit::from_units)
            .unwrap_or(ComputeUnitLimit::Missing)
    }

    /// Compile to a v0 message. A missing lifetime compiles with the default hash.
    pub fn compile(&self) -> Result<VersionedMessage, PlanningError> {
        let fee_payer = self
            .fee_payer
            .ok_or_else(|| PlanningError::InvalidMessage("message has no fee payer".to_string()))?;
        let blockhash = self.lifetime.unwrap_or_default();
        let message = v0::Message::try_compile(&fee_payer, &self.instructions, &[], blockhash)
            .map_err(|e| PlanningError::InvalidMessage(e.to_string()))?;
        Ok(VersionedMessage::V0(message))
    }

    /// Transaction with placeholder signatures, used for sizing and simulation
    pub fn to_unsigned_transaction(&self) -> Result<VersionedTransaction, PlanningError> {
        let message = self.compile()?;
        let num_signatures = message.header().num_required_signatures as usize;
        Ok(VersionedTransaction {
            signatures: vec![Signature::default(); num_signatures],
            message,
        })
    }

    /// Size of the serialized transaction, signatures included
    pub fn transaction_size(&self) -> Result<usize, PlanningError> {
        let transaction = self.to_unsigned_transaction()?;
        bincode::serialized_size(&transaction)
            .map(|size| size as usize)
            .map_err(|e| PlanningError::InvalidMessage(e.to_string()))
    }

    pub fn fits_in_transaction(&self) -> Result<bool, PlanningError> {
        Ok(self.transaction_size()? <= TRANSACTION_SIZE_LIMIT)
    }

    /// Sign with the attached signers, which must cover every required signature
    pub fn sign(&self) -> Result<VersionedTransaction, Error> {
        if self.lifetime.is_none() {
            return Err(PlanningError::InvalidMessage("message has no lifetime".to_string()).into());
        }
        let message = self.compile()?;
        let num_required = message.header().num_required_signatures as usize;

        let mut signers: Vec<&dyn Signer> = Vec::with_capacity(num_required);
        for key in message.static_account_keys().iter().take(num_required) {
            let signer = self
                .signers
                .iter()
                .find(|signer| signer.pubkey() == *key)
                .ok_or_else(|| Error::Signing(format!("Missing signer for {}", key)))?;
            signers.push(signer.as_ref());
        }

        VersionedTransaction::try_new(message, &signers).map_err(|e| Error::Signing(e.to_string()))
    }
}

impl fmt::Debug for TransactionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signers: Vec<Pubkey> = self.signers.iter().map(|signer| signer.pubkey()).collect();
        f.debug_struct("TransactionMessage")
            .field("fee_payer", &self.fee_payer)
            .field("instructions", &self.instructions)
            .field("lifetime", &self.lifetime)
            .field("signers", &signers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{instruction::AccountMeta, signer::keypair::Keypair};

    fn payer() -> SharedSigner {
        Arc::new(Keypair::new())
    }

    fn memo(payer: &Pubkey, len: usize) -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &vec![1u8; len],
            vec![AccountMeta::new(*payer, true)],
        )
    }

    #[test]
    fn test_compute_unit_limit_classes() {
        assert_eq!(ComputeUnitLimit::from_units(0), ComputeUnitLimit::Provisory);
        assert_eq!(
            ComputeUnitLimit::from_units(MAX_COMPUTE_UNIT_LIMIT),
            ComputeUnitLimit::Maximum
        );
        assert_eq!(
            ComputeUnitLimit::from_units(200_000),
            ComputeUnitLimit::Explicit(200_000)
        );
        assert!(ComputeUnitLimit::Missing.needs_estimation());
        assert!(ComputeUnitLimit::Maximum.needs_estimation());
        assert!(!ComputeUnitLimit::Explicit(1).needs_estimation());
    }

    #[test]
    fn test_with_compute_unit_limit_rewrites_existing() {
        let signer = payer();
        let message = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_compute_unit_limit(PROVISORY_COMPUTE_UNIT_LIMIT)
            .with_instruction(memo(&signer.pubkey(), 10));
        assert_eq!(message.compute_unit_limit(), ComputeUnitLimit::Provisory);

        let patched = message.with_compute_unit_limit(5_500);
        assert_eq!(patched.instructions().len(), 2);
        assert_eq!(patched.compute_unit_limit(), ComputeUnitLimit::Explicit(5_500));
        assert_eq!(compute_unit_limit_of(&patched.instructions()[0]), Some(5_500));
    }

    #[test]
    fn test_with_compute_unit_limit_appends_when_missing() {
        let signer = payer();
        let message = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_instruction(memo(&signer.pubkey(), 10))
            .with_compute_unit_limit(42_000);
        assert_eq!(message.instructions().len(), 2);
        assert_eq!(compute_unit_limit_of(&message.instructions()[1]), Some(42_000));
    }

    #[test]
    fn test_price_instruction_is_not_a_limit() {
        let price = ComputeBudgetInstruction::set_compute_unit_price(1_000);
        assert_eq!(compute_unit_limit_of(&price), None);
    }

    #[test]
    fn test_transaction_size_grows_with_data() {
        let signer = payer();
        let small = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_instruction(memo(&signer.pubkey(), 10));
        let large = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_instruction(memo(&signer.pubkey(), 110));
        let small_size = small.transaction_size().unwrap();
        let large_size = large.transaction_size().unwrap();
        assert!(large_size > small_size + 99);
        assert!(small.fits_in_transaction().unwrap());
    }

    #[test]
    fn test_oversized_message_does_not_fit() {
        let signer = payer();
        let message = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_instruction(memo(&signer.pubkey(), TRANSACTION_SIZE_LIMIT));
        assert!(!message.fits_in_transaction().unwrap());
    }

    #[test]
    fn test_compile_requires_fee_payer() {
        let message = TransactionMessage::new();
        assert!(matches!(
            message.compile(),
            Err(PlanningError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_sign_requires_lifetime() {
        let signer = payer();
        let message = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_instruction(memo(&signer.pubkey(), 4));
        assert!(matches!(message.sign(), Err(Error::Planning(_))));
    }

    #[test]
    fn test_sign_with_fee_payer() {
        let signer = payer();
        let message = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_instruction(memo(&signer.pubkey(), 4))
            .with_lifetime(Hash::new_from_array([3u8; 32]));
        let transaction = message.sign().unwrap();
        assert_eq!(transaction.signatures.len(), 1);
        assert_ne!(transaction.signatures[0], Signature::default());
    }

    #[test]
    fn test_sign_missing_signer() {
        let signer = payer();
        let other = Pubkey::new_unique();
        let message = TransactionMessage::new()
            .with_fee_payer_signer(signer)
            .with_instruction(memo(&other, 4))
            .with_lifetime(Hash::new_from_array([3u8; 32]));
        assert!(matches!(message.sign(), Err(Error::Signing(_))));
    }

    #[test]
    fn test_duplicate_signer_ignored() {
        let signer = payer();
        let message = TransactionMessage::new()
            .with_fee_payer_signer(signer.clone())
            .with_signer(signer);
        assert_eq!(message.signers().len(), 1);
    }
}
