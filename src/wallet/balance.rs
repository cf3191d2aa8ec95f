// Balance accounting - read-only views over ledger, conflict and chain state

use crate::ledger::{ChainView, ConflictTracker, LedgerEntry, LedgerError, TransactionLedger};
use crate::tx::{Address, Amount, OutPoint, TxId, TxOutput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Balance split by confirmation state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    /// From transactions at depth >= 1
    pub confirmed: Amount,
    /// Unconfirmed self-spends of counted outputs
    pub trusted_pending: Amount,
    /// Other unconfirmed transactions
    pub untrusted_pending: Amount,
}

impl BalanceBreakdown {
    pub fn total(&self) -> Amount {
        self.confirmed + self.trusted_pending + self.untrusted_pending
    }
}

/// The query view of one transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub id: TxId,
    pub confirmations: i64,
    pub fee: Amount,
    /// Payer's net movement excluding fee; total output for coinbase or unknown payer
    pub amount: Amount,
    pub outputs: Vec<TxOutput>,
    pub block_height: Option<u64>,
    /// Other transactions claiming any of this one's inputs
    pub conflicts: Vec<TxId>,
    pub received_at: DateTime<Utc>,
}

/// Derives balances on demand; never mutates anything
pub struct BalanceEngine<'a> {
    ledger: &'a TransactionLedger,
    tracker: &'a ConflictTracker,
    chain: &'a ChainView,
    trust_own_unconfirmed: bool,
}

impl<'a> BalanceEngine<'a> {
    pub fn new(ledger: &'a TransactionLedger, tracker: &'a ConflictTracker, chain: &'a ChainView) -> Self {
        Self {
            ledger,
            tracker,
            chain,
            trust_own_unconfirmed: true,
        }
    }

    /// Count unconfirmed self-spends even when unconfirmed funds are excluded
    pub fn with_trust_own_unconfirmed(mut self, trust: bool) -> Self {
        self.trust_own_unconfirmed = trust;
        self
    }

    // ========================================================================
    // BALANCE QUERIES
    // ========================================================================

    /// Spendable balance of `owner`.
    ///
    /// Conflict losers (negative depth) never count.
    pub fn balance(&self, owner: &Address, include_unconfirmed: bool) -> Amount {
        let breakdown = self.breakdown(owner);
        let mut total = breakdown.confirmed;
        if include_unconfirmed || self.trust_own_unconfirmed {
            total += breakdown.trusted_pending;
        }
        if include_unconfirmed {
            total += breakdown.untrusted_pending;
        }
        total
    }

    pub fn breakdown(&self, owner: &Address) -> BalanceBreakdown {
        let mut breakdown = BalanceBreakdown::default();
        let mut trusted = HashMap::new();

        for entry in self.ledger.iter() {
            let depth = entry.confirmations();
            if depth < 0 {
                continue;
            }
            let delta = self.net_effect(entry, owner);
            if delta.is_zero() {
                continue;
            }
            if depth >= 1 {
                breakdown.confirmed += delta;
            } else if self.is_trusted(entry.id(), owner, &mut trusted) {
                breakdown.trusted_pending += delta;
            } else {
                breakdown.untrusted_pending += delta;
            }
        }

        breakdown
    }

    /// Outputs paid to `owner` minus inputs spending outputs `owner` held
    pub fn net_effect(&self, entry: &LedgerEntry, owner: &Address) -> Amount {
        let tx = entry.transaction();
        let received: Amount = tx
            .outputs()
            .iter()
            .filter(|o| o.address() == owner)
            .map(|o| o.amount())
            .sum();
        let spent: Amount = tx
            .spent_outpoints()
            .filter_map(|op| self.ledger.output(op))
            .filter(|o| o.address() == owner)
            .map(|o| o.amount())
            .sum();
        received - spent
    }

    /// Unconfirmed but funded entirely from `owner`'s own counted outputs
    fn is_trusted(&self, id: &TxId, owner: &Address, memo: &mut HashMap<TxId, bool>) -> bool {
        if let Some(known) = memo.get(id) {
            return *known;
        }
        let Ok(entry) = self.ledger.get(id) else {
            return false;
        };
        let depth = entry.confirmations();
        if depth != 0 {
            return depth > 0;
        }
        if entry.transaction().is_coinbase() {
            return false;
        }

        memo.insert(*id, false);
        let trusted = entry.transaction().spent_outpoints().all(|op| {
            self.ledger
                .output(op)
                .map(|o| o.address() == owner)
                .unwrap_or(false)
                && self.is_trusted(op.txid(), owner, memo)
        });
        memo.insert(*id, trusted);
        trusted
    }

    // ========================================================================
    // TRANSACTION QUERIES
    // ========================================================================

    /// Owner of the first input whose prior output is known
    pub fn payer(&self, id: &TxId) -> Option<Address> {
        let entry = self.ledger.get(id).ok()?;
        entry
            .transaction()
            .spent_outpoints()
            .find_map(|op| self.ledger.output(op))
            .map(|o| o.address().clone())
    }

    pub fn details(&self, id: &TxId) -> Result<TransactionDetails, LedgerError> {
        let entry = self.ledger.get(id)?;
        let tx = entry.transaction();

        let amount = match self.payer(id) {
            Some(payer) => -tx
                .outputs()
                .iter()
                .filter(|o| *o.address() != payer)
                .map(|o| o.amount())
                .sum::<Amount>(),
            None => tx.total_output(),
        };

        Ok(TransactionDetails {
            id: *id,
            confirmations: entry.confirmations(),
            fee: tx.fee(),
            amount,
            outputs: tx.outputs().to_vec(),
            block_height: self.chain.confirming_height(id),
            conflicts: self.tracker.conflicts_of(id),
            received_at: entry.received_at(),
        })
    }

    /// First output of `txid` paying exactly `amount`
    pub fn find_output(&self, txid: &TxId, amount: Amount) -> Option<OutPoint> {
        let entry = self.ledger.get(txid).ok()?;
        entry
            .transaction()
            .outputs()
            .iter()
            .position(|o| o.amount() == amount)
            .map(|vout| OutPoint::new(*txid, vout as u32))
    }
}
