use crate::ledger::{Block, RegisterOutcome, ReorgSummary};
use crate::node::{Node, NodeError};
use crate::tx::{Address, Amount, Transaction, TxId};
use crate::wallet::TransactionDetails;
use parking_lot::RwLock;
use std::sync::Arc;

/// A node shared between threads: one writer at a time, concurrent readers
#[derive(Clone, Debug)]
pub struct SharedNode {
    inner: Arc<RwLock<Node>>,
}

impl SharedNode {
    pub fn new(node: Node) -> Self {
        Self {
            inner: Arc::new(RwLock::new(node)),
        }
    }

    pub fn register(&self, tx: Transaction) -> Result<RegisterOutcome, NodeError> {
        self.inner.write().register(tx)
    }

    pub fn apply_block(&self, block: &Block) -> Result<(), NodeError> {
        self.inner.write().apply_block(block)
    }

    pub fn reorganize(&self, branch: &[Block]) -> Result<ReorgSummary, NodeError> {
        self.inner.write().reorganize(branch)
    }

    /// Rebuild the chain view after a fatal reorganization
    pub fn resync(&self, chain: &[Block]) -> Result<(), NodeError> {
        self.inner.write().resync(chain)
    }

    pub fn get_balance(&self, owner: &Address, include_unconfirmed: bool) -> Amount {
        self.inner.read().get_balance(owner, include_unconfirmed)
    }

    pub fn get_transaction(&self, id: &TxId) -> Result<TransactionDetails, NodeError> {
        self.inner.read().get_transaction(id)
    }

    /// Run a read-only closure under the read lock
    pub fn read<R>(&self, f: impl FnOnce(&Node) -> R) -> R {
        f(&self.inner.read())
    }
}
