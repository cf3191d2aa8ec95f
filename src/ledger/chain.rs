// Chain View - best-chain height and where each transaction was confirmed
//
// Depth is always derived as 1 + (best - confirming height); nothing is
// adjusted incrementally.

use crate::tx::TxId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from chain events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Reorganization inconsistent with known history: {0}")]
    ReorgInconsistency(String),

    #[error("Reorganization of {depth} blocks exceeds limit of {max}")]
    ReorgTooDeep { depth: u64, max: u64 },
}

impl ChainError {
    /// Fatal errors leave the chain data untrustworthy until a resync
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::ReorgInconsistency(_))
    }
}

/// A block as seen by the ledger: a height and the ids it confirms
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    height: u64,
    tx_ids: Vec<TxId>,
}

impl Block {
    pub fn new(height: u64, tx_ids: Vec<TxId>) -> Self {
        Self { height, tx_ids }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn tx_ids(&self) -> &[TxId] {
        &self.tx_ids
    }
}

/// What applying a block changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockUpdate {
    pub newly_confirmed: Vec<TxId>,
    pub best_height: u64,
    pub height_changed: bool,
}

/// What a reorganization changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReorgSummary {
    pub fork_height: u64,
    pub disconnected_blocks: u64,
    /// Confirmed only on the abandoned branch
    pub unconfirmed: Vec<TxId>,
    /// Confirmed on the new branch
    pub confirmed: Vec<TxId>,
    pub best_height: u64,
}

/// The node's view of its current best chain
#[derive(Clone, Debug)]
pub struct ChainView {
    best_height: u64,
    /// Active chain: height -> ids confirmed there
    blocks: BTreeMap<u64, Vec<TxId>>,
    confirmed_at: HashMap<TxId, u64>,
    /// Ids that appeared in any block on any branch
    ever_confirmed: HashSet<TxId>,
    max_reorg_depth: u64,
}

impl Default for ChainView {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

impl ChainView {
    pub fn new(max_reorg_depth: u64) -> Self {
        Self {
            best_height: 0,
            blocks: BTreeMap::new(),
            confirmed_at: HashMap::new(),
            ever_confirmed: HashSet::new(),
            max_reorg_depth,
        }
    }

    pub fn best_height(&self) -> u64 {
        self.best_height
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn confirming_height(&self, id: &TxId) -> Option<u64> {
        self.confirmed_at.get(id).copied()
    }

    /// Signed depth on the best chain: 0 if not in any active block
    pub fn depth(&self, id: &TxId) -> i64 {
        match self.confirmed_at.get(id) {
            Some(height) => 1 + (self.best_height - height) as i64,
            None => 0,
        }
    }

    pub fn has_seen(&self, id: &TxId) -> bool {
        self.ever_confirmed.contains(id)
    }

    /// Ids currently confirmed on the active chain
    pub fn confirmed_ids(&self) -> impl Iterator<Item = &TxId> {
        self.confirmed_at.keys()
    }

    /// Active chain blocks in height order
    pub fn active_blocks(&self) -> Vec<Block> {
        self.blocks
            .iter()
            .map(|(h, ids)| Block::new(*h, ids.clone()))
            .collect()
    }

    /// Confirm `block`'s transactions at its height.
    ///
    /// Ids need not be registered yet; their height is kept and applies once
    /// they arrive. A block at an already occupied height adds to it.
    pub fn apply_block(&mut self, block: &Block) -> BlockUpdate {
        let previous_best = self.best_height;
        self.best_height = self.best_height.max(block.height);

        let slot = self.blocks.entry(block.height).or_default();
        let mut newly_confirmed = Vec::new();
        for id in &block.tx_ids {
            self.ever_confirmed.insert(*id);
            match self.confirmed_at.get(id) {
                None => {
                    self.confirmed_at.insert(*id, block.height);
                    slot.push(*id);
                    newly_confirmed.push(*id);
                }
                Some(existing) if *existing != block.height => {
                    warn!(txid = %id, existing, height = block.height, "already confirmed at another height");
                }
                Some(_) => {}
            }
        }

        debug!(
            height = block.height,
            best = self.best_height,
            confirmed = newly_confirmed.len(),
            "block applied"
        );

        BlockUpdate {
            newly_confirmed,
            best_height: self.best_height,
            height_changed: self.best_height != previous_best,
        }
    }

    /// Switch to `branch`, which replaces every block from its first height up.
    ///
    /// `is_known` tells whether the ledger holds an id; ids neither known nor
    /// seen in any earlier block make the reorganization inconsistent. All
    /// checks happen before any state changes.
    pub fn reorganize<F>(&mut self, branch: &[Block], is_known: F) -> Result<ReorgSummary, ChainError>
    where
        F: Fn(&TxId) -> bool,
    {
        let first = branch
            .first()
            .ok_or_else(|| ChainError::ReorgInconsistency("empty branch".to_string()))?;
        let fork_height = first.height;

        if fork_height == 0 || fork_height > self.best_height + 1 {
            return Err(ChainError::ReorgInconsistency(format!(
                "fork height {} does not connect to best height {}",
                fork_height, self.best_height
            )));
        }

        for (offset, block) in branch.iter().enumerate() {
            if block.height != fork_height + offset as u64 {
                return Err(ChainError::ReorgInconsistency(format!(
                    "branch heights not contiguous at {}",
                    block.height
                )));
            }
            if let Some(unknown) = block
                .tx_ids
                .iter()
                .find(|id| !is_known(id) && !self.ever_confirmed.contains(id))
            {
                return Err(ChainError::ReorgInconsistency(format!(
                    "transaction {unknown} was never seen"
                )));
            }
        }

        let disconnected_blocks = (self.best_height + 1).saturating_sub(fork_height);
        if disconnected_blocks > self.max_reorg_depth {
            return Err(ChainError::ReorgTooDeep {
                depth: disconnected_blocks,
                max: self.max_reorg_depth,
            });
        }

        let abandoned: Vec<(u64, Vec<TxId>)> = self.blocks.split_off(&fork_height).into_iter().collect();
        let mut dropped = HashSet::new();
        for (_, ids) in &abandoned {
            for id in ids {
                self.confirmed_at.remove(id);
                dropped.insert(*id);
            }
        }

        self.best_height = fork_height - 1;
        let mut confirmed = Vec::new();
        for block in branch {
            let update = self.apply_block(block);
            confirmed.extend(update.newly_confirmed);
        }

        let mut unconfirmed: Vec<TxId> = dropped
            .into_iter()
            .filter(|id| !self.confirmed_at.contains_key(id))
            .collect();
        unconfirmed.sort();

        info!(
            fork_height,
            disconnected = disconnected_blocks,
            connected = branch.len(),
            unconfirmed = unconfirmed.len(),
            best = self.best_height,
            "chain reorganized"
        );

        Ok(ReorgSummary {
            fork_height,
            disconnected_blocks,
            unconfirmed,
            confirmed,
            best_height: self.best_height,
        })
    }

    /// Drop the active chain and rebuild it from `blocks`
    pub fn rebuild(&mut self, blocks: &[Block]) {
        self.best_height = 0;
        self.blocks.clear();
        self.confirmed_at.clear();
        for block in blocks {
            self.apply_block(block);
        }
    }
}
