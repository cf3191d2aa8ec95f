// Node - one wallet's ledger, conflict tracker and chain view behind typed operations
//
// Every public mutation finishes its conflict evaluation and depth refresh
// before returning, so queries never observe a half-applied event.

use crate::ledger::{
    Block, ChainError, ChainView, ConflictTracker, LedgerError, RegisterOutcome, ReorgSummary,
    TransactionLedger,
};
use crate::node::NodeConfig;
use crate::tx::{Address, Amount, OutPoint, Transaction, TxId};
use crate::wallet::{BalanceBreakdown, BalanceEngine, TransactionDetails};
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors surfaced by node operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Chain data is inconsistent; a full resync is required")]
    ResyncRequired,
}

/// A single node's wallet-side state machine
#[derive(Clone, Debug)]
pub struct Node {
    config: NodeConfig,
    ledger: TransactionLedger,
    tracker: ConflictTracker,
    chain: ChainView,
    resync_required: bool,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        let chain = ChainView::new(config.max_reorg_depth);
        Self {
            config,
            ledger: TransactionLedger::new(),
            tracker: ConflictTracker::new(),
            chain,
            resync_required: false,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn tracker(&self) -> &ConflictTracker {
        &self.tracker
    }

    pub fn chain(&self) -> &ChainView {
        &self.chain
    }

    pub fn best_height(&self) -> u64 {
        self.chain.best_height()
    }

    pub fn resync_required(&self) -> bool {
        self.resync_required
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    /// Ingest a transaction from the signer or a peer
    pub fn register(&mut self, tx: Transaction) -> Result<RegisterOutcome, NodeError> {
        let id = *tx.id();
        let outcome = self.ledger.register(tx)?;
        if outcome == RegisterOutcome::AlreadyKnown {
            return Ok(outcome);
        }

        let tracked = {
            let entry = self.ledger.get(&id)?;
            self.tracker.track(entry.transaction())
        };
        if tracked.conflicted {
            info!(
                node = %self.config.label,
                txid = %id,
                contested = tracked.contested.len(),
                "transaction joined a conflict set"
            );
        }

        self.refresh_set(&id)?;
        Ok(outcome)
    }

    /// A block at `height` confirmed `block.tx_ids()`
    pub fn apply_block(&mut self, block: &Block) -> Result<(), NodeError> {
        self.ensure_consistent()?;
        let update = self.chain.apply_block(block);
        debug!(
            node = %self.config.label,
            height = block.height(),
            newly_confirmed = update.newly_confirmed.len(),
            "applying block"
        );
        self.refresh_all()
    }

    /// Switch the best chain to `branch`
    pub fn reorganize(&mut self, branch: &[Block]) -> Result<ReorgSummary, NodeError> {
        self.ensure_consistent()?;
        let ledger = &self.ledger;
        let summary = match self.chain.reorganize(branch, |id| ledger.contains(id)) {
            Ok(summary) => summary,
            Err(err) => {
                if err.is_fatal() {
                    error!(node = %self.config.label, error = %err, "reorganization rejected, resync required");
                    self.resync_required = true;
                }
                return Err(err.into());
            }
        };
        self.refresh_all()?;
        Ok(summary)
    }

    /// Rebuild the chain view from a full active chain
    pub fn resync(&mut self, chain: &[Block]) -> Result<(), NodeError> {
        self.chain.rebuild(chain);
        self.resync_required = false;
        info!(node = %self.config.label, best = self.chain.best_height(), "chain view rebuilt");
        self.refresh_all()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn get_balance(&self, owner: &Address, include_unconfirmed: bool) -> Amount {
        self.balances().balance(owner, include_unconfirmed)
    }

    pub fn balance_breakdown(&self, owner: &Address) -> BalanceBreakdown {
        self.balances().breakdown(owner)
    }

    pub fn get_transaction(&self, id: &TxId) -> Result<TransactionDetails, NodeError> {
        Ok(self.balances().details(id)?)
    }

    pub fn confirmations(&self, id: &TxId) -> Result<i64, NodeError> {
        Ok(self.ledger.confirmations(id)?)
    }

    pub fn find_output(&self, txid: &TxId, amount: Amount) -> Option<OutPoint> {
        self.balances().find_output(txid, amount)
    }

    /// Depth-0 transactions in arrival order
    pub fn mempool(&self) -> Vec<&Transaction> {
        self.ledger
            .ordered()
            .into_iter()
            .filter(|e| e.confirmations() == 0)
            .map(|e| e.transaction())
            .collect()
    }

    fn balances(&self) -> BalanceEngine<'_> {
        BalanceEngine::new(&self.ledger, &self.tracker, &self.chain)
            .with_trust_own_unconfirmed(self.config.trust_own_unconfirmed)
    }

    // ========================================================================
    // DEPTH REFRESH
    // ========================================================================

    fn ensure_consistent(&self) -> Result<(), NodeError> {
        if self.resync_required {
            return Err(NodeError::ResyncRequired);
        }
        Ok(())
    }

    /// Recompute every depth from the chain, then re-resolve every conflict set
    fn refresh_all(&mut self) -> Result<(), NodeError> {
        let ids: Vec<TxId> = self.ledger.ids().copied().collect();
        for id in &ids {
            self.ledger.set_confirmations(id, self.chain.depth(id))?;
        }
        for set in self.tracker.conflict_sets() {
            if let Some(member) = set.first() {
                self.apply_resolution(member)?;
            }
        }
        Ok(())
    }

    /// Refresh the depth of `id` and of its conflict set
    fn refresh_set(&mut self, id: &TxId) -> Result<(), NodeError> {
        self.ledger.set_confirmations(id, self.chain.depth(id))?;
        if self.tracker.is_conflicted(id) {
            self.apply_resolution(id)?;
        }
        Ok(())
    }

    fn apply_resolution(&mut self, member: &TxId) -> Result<(), NodeError> {
        let chain = &self.chain;
        let resolution = self.tracker.resolve(member, |id| chain.depth(id));

        for loser in &resolution.losers {
            debug!(node = %self.config.label, txid = %loser, depth = resolution.depths[loser], "conflict loser");
        }
        for (id, depth) in &resolution.depths {
            if self.ledger.contains(id) {
                self.ledger.set_confirmations(id, *depth)?;
            }
        }
        Ok(())
    }
}
