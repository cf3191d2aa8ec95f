use crate::tx::model::content_id;
use crate::tx::{Address, Amount, OutPoint, Transaction, TransactionValidator, TxOutput, ValidationError};
use rand::Rng;
use thiserror::Error;

/// Errors that can occur when building a transaction
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Missing outputs: at least one output is required")]
    MissingOutputs,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Builder for assembling transactions with a content-derived id
pub struct TransactionBuilder {
    inputs: Vec<OutPoint>,
    outputs: Vec<TxOutput>,
    fee: Amount,
    nonce: Option<u64>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            fee: Amount::ZERO,
            nonce: None,
        }
    }

    /// Start a coinbase paying `amount` to `address`
    pub fn coinbase(address: Address, amount: Amount) -> Self {
        Self::new().input(OutPoint::null()).output(address, amount)
    }

    /// Spend a prior output
    pub fn input(mut self, outpoint: OutPoint) -> Self {
        self.inputs.push(outpoint);
        self
    }

    /// Pay `amount` to `address`
    pub fn output(mut self, address: Address, amount: Amount) -> Self {
        self.outputs.push(TxOutput::new(address, amount));
        self
    }

    /// Set the fee as a balance delta (must be `<= 0`)
    pub fn fee(mut self, fee: Amount) -> Self {
        self.fee = fee;
        self
    }

    /// Set the nonce (optional - random if not provided)
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Validate and assemble the transaction
    pub fn build(self) -> Result<Transaction, BuilderError> {
        if self.outputs.is_empty() {
            return Err(BuilderError::MissingOutputs);
        }

        let nonce = self.nonce.unwrap_or_else(|| rand::thread_rng().gen::<u64>());
        let id = content_id(&self.inputs, &self.outputs, self.fee, nonce);
        let tx = Transaction::with_nonce(id, self.inputs, self.outputs, self.fee, nonce);

        TransactionValidator::validate(&tx)?;
        Ok(tx)
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
