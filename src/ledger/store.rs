// Transaction Ledger - every transaction this node has observed, never pruned

use crate::tx::{OutPoint, Transaction, TransactionValidator, TxId, TxOutput, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors from ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Transaction {0} not found")]
    NotFound(TxId),

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(#[from] ValidationError),
}

/// Whether `register` stored something new
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Inserted,
    AlreadyKnown,
}

/// A stored transaction plus its local bookkeeping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    tx: Transaction,
    /// 0 = unconfirmed, >0 = depth on best chain, <0 = conflict loser
    confirmations: i64,
    /// Arrival order on this node
    sequence: u64,
    received_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn id(&self) -> &TxId {
        self.tx.id()
    }

    pub fn confirmations(&self) -> i64 {
        self.confirmations
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmations > 0
    }

    pub fn is_conflicted(&self) -> bool {
        self.confirmations < 0
    }
}

/// Counts by confirmation state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerStatistics {
    pub total: usize,
    pub confirmed: usize,
    pub unconfirmed: usize,
    pub conflicted: usize,
}

/// Authoritative store of observed transactions keyed by id
#[derive(Clone, Debug, Default)]
pub struct TransactionLedger {
    entries: HashMap<TxId, LedgerEntry>,
    next_sequence: u64,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert an unseen transaction with zero confirmations.
    ///
    /// Re-registering a known id is a no-op: depth, fee and arrival order
    /// stay as they were and no validation is repeated.
    pub fn register(&mut self, tx: Transaction) -> Result<RegisterOutcome, LedgerError> {
        if self.entries.contains_key(tx.id()) {
            debug!(txid = %tx.id(), "transaction already known");
            return Ok(RegisterOutcome::AlreadyKnown);
        }

        TransactionValidator::validate(&tx)?;

        let id = *tx.id();
        let entry = LedgerEntry {
            tx,
            confirmations: 0,
            sequence: self.next_sequence,
            received_at: Utc::now(),
        };
        self.next_sequence += 1;
        self.entries.insert(id, entry);

        debug!(txid = %id, "transaction registered");
        Ok(RegisterOutcome::Inserted)
    }

    pub fn get(&self, id: &TxId) -> Result<&LedgerEntry, LedgerError> {
        self.entries.get(id).ok_or(LedgerError::NotFound(*id))
    }

    pub fn confirmations(&self, id: &TxId) -> Result<i64, LedgerError> {
        self.get(id).map(|e| e.confirmations)
    }

    /// Only the node's chain/conflict refresh writes depths
    pub(crate) fn set_confirmations(&mut self, id: &TxId, depth: i64) -> Result<(), LedgerError> {
        let entry = self.entries.get_mut(id).ok_or(LedgerError::NotFound(*id))?;
        entry.confirmations = depth;
        Ok(())
    }

    /// Look up the output an outpoint names, if its transaction is known
    pub fn output(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        if outpoint.is_null() {
            return None;
        }
        self.entries
            .get(outpoint.txid())
            .and_then(|e| e.tx.output(outpoint.vout()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &TxId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Entries in arrival order
    pub fn ordered(&self) -> Vec<&LedgerEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.sequence);
        entries
    }

    pub fn statistics(&self) -> LedgerStatistics {
        let mut stats = LedgerStatistics {
            total: self.entries.len(),
            ..Default::default()
        };
        for entry in self.entries.values() {
            match entry.confirmations {
                d if d > 0 => stats.confirmed += 1,
                0 => stats.unconfirmed += 1,
                _ => stats.conflicted += 1,
            }
        }
        stats
    }
}
