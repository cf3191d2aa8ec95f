use crate::tx::{Amount, OutPoint, Transaction};
use std::collections::HashSet;
use thiserror::Error;

/// Structural problems that make a transaction unacceptable at ingestion
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Transaction references no inputs")]
    NoInputs,

    #[error("Output {index} has negative amount {amount}")]
    NegativeAmount { index: usize, amount: Amount },

    #[error("Fee {0} is positive; fees are non-positive balance deltas")]
    PositiveFee(Amount),

    #[error("Input {0} is listed more than once")]
    DuplicateInput(OutPoint),

    #[error("Outputs total more than the coin supply")]
    OutputsOutOfRange,

    #[error("Fee {0} exceeds the coin supply")]
    FeeOutOfRange(Amount),
}

/// Validator for ingested transactions
///
/// Only shape is checked here. Signatures and scripts belong to the signer.
pub struct TransactionValidator;

impl TransactionValidator {
    pub fn validate(tx: &Transaction) -> Result<(), ValidationError> {
        if tx.inputs().is_empty() {
            return Err(ValidationError::NoInputs);
        }

        if let Some((index, output)) = tx
            .outputs()
            .iter()
            .enumerate()
            .find(|(_, o)| o.amount().is_negative())
        {
            return Err(ValidationError::NegativeAmount {
                index,
                amount: output.amount(),
            });
        }

        let mut inputs = HashSet::with_capacity(tx.inputs().len());
        if let Some(duplicate) = tx.inputs().iter().find(|op| !inputs.insert(**op)) {
            return Err(ValidationError::DuplicateInput(*duplicate));
        }

        let total = tx
            .outputs()
            .iter()
            .try_fold(Amount::ZERO, |acc, o| acc.checked_add(o.amount()));
        if !total.is_some_and(Amount::is_money_range) {
            return Err(ValidationError::OutputsOutOfRange);
        }

        if tx.fee().is_positive() {
            return Err(ValidationError::PositiveFee(tx.fee()));
        }
        if !tx.fee().is_money_range() {
            return Err(ValidationError::FeeOutOfRange(tx.fee()));
        }

        Ok(())
    }
}
