// Block Tree - longest-chain selection over blocks received from peers
//
// Turns a stream of mined blocks into the ledger's chain events: extending
// the tip connects a block, a strictly longer side branch reorganizes.

use crate::ledger::Block;
use crate::sync::protocol::{BlockId, MinedBlock};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors from block acceptance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockTreeError {
    #[error("Block {id} at height {height} does not follow its parent at height {parent_height}")]
    InvalidHeight {
        id: BlockId,
        height: u64,
        parent_height: u64,
    },

    #[error("Block {0} has no parent but height is not 1")]
    InvalidGenesis(BlockId),
}

/// Chain event produced by accepting a block
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainEvent {
    Connected(MinedBlock),
    Reorganized(Vec<MinedBlock>),
}

impl ChainEvent {
    /// Active tip once this event is applied
    pub fn tip(&self) -> Option<&BlockId> {
        match self {
            ChainEvent::Connected(block) => Some(block.id()),
            ChainEvent::Reorganized(branch) => branch.last().map(MinedBlock::id),
        }
    }

    /// The blocks this event connects, as ledger blocks
    pub fn ledger_blocks(&self) -> Vec<Block> {
        match self {
            ChainEvent::Connected(block) => vec![block.to_block()],
            ChainEvent::Reorganized(branch) => branch.iter().map(MinedBlock::to_block).collect(),
        }
    }
}

/// All blocks a node has seen, plus which of them form the active chain
#[derive(Clone, Debug, Default)]
pub struct BlockTree {
    blocks: HashMap<BlockId, MinedBlock>,
    /// Active chain; index i holds height i + 1
    active: Vec<BlockId>,
    /// Parent id -> blocks waiting for it
    orphans: HashMap<BlockId, Vec<MinedBlock>>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height(&self) -> u64 {
        self.active.len() as u64
    }

    pub fn tip(&self) -> Option<&BlockId> {
        self.active.last()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn get(&self, id: &BlockId) -> Option<&MinedBlock> {
        self.blocks.get(id)
    }

    pub fn is_active(&self, id: &BlockId) -> bool {
        self.blocks
            .get(id)
            .map(|b| self.active_at(b.height()) == Some(id))
            .unwrap_or(false)
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.values().map(Vec::len).sum()
    }

    /// The active chain as ledger blocks
    pub fn active_blocks(&self) -> Vec<Block> {
        self.active
            .iter()
            .filter_map(|id| self.blocks.get(id))
            .map(MinedBlock::to_block)
            .collect()
    }

    /// Make the chain ending at `tip` active again.
    ///
    /// Used when the ledger refused an event this tree already applied. Blocks
    /// stay stored, so a later longer branch can still build on them.
    pub fn rewind(&mut self, tip: Option<BlockId>) {
        let mut chain = Vec::new();
        let mut cursor = tip;
        while let Some(id) = cursor {
            let Some(block) = self.blocks.get(&id) else {
                break;
            };
            chain.push(id);
            cursor = block.parent().copied();
        }
        chain.reverse();
        debug!(from = self.active.len(), to = chain.len(), "active chain rewound");
        self.active = chain;
    }

    /// Accept a block and any orphans it unlocks
    pub fn accept(&mut self, block: MinedBlock) -> Result<Vec<ChainEvent>, BlockTreeError> {
        let mut events = Vec::new();
        let mut pending = vec![block];

        while let Some(block) = pending.pop() {
            if self.blocks.contains_key(block.id()) {
                continue;
            }

            match block.parent() {
                Some(parent) if !self.blocks.contains_key(parent) => {
                    debug!(block = %block.id(), parent = %parent, "orphan block stored");
                    self.orphans.entry(*parent).or_default().push(block);
                    continue;
                }
                Some(parent) => {
                    let parent_height = self.blocks[parent].height();
                    if block.height() != parent_height + 1 {
                        return Err(BlockTreeError::InvalidHeight {
                            id: *block.id(),
                            height: block.height(),
                            parent_height,
                        });
                    }
                }
                None if block.height() != 1 => {
                    return Err(BlockTreeError::InvalidGenesis(*block.id()));
                }
                None => {}
            }

            let id = *block.id();
            self.blocks.insert(id, block);
            if let Some(event) = self.evaluate(&id) {
                events.push(event);
            }
            if let Some(children) = self.orphans.remove(&id) {
                pending.extend(children);
            }
        }

        Ok(events)
    }

    fn active_at(&self, height: u64) -> Option<&BlockId> {
        height
            .checked_sub(1)
            .and_then(|i| self.active.get(i as usize))
    }

    fn evaluate(&mut self, id: &BlockId) -> Option<ChainEvent> {
        let block = self.blocks.get(id)?;

        if block.parent() == self.active.last() {
            self.active.push(*id);
            return Some(ChainEvent::Connected(block.clone()));
        }

        if block.height() <= self.height() {
            debug!(block = %id, height = block.height(), "side branch block stored");
            return None;
        }

        // Walk back to the fork point on the active chain
        let mut branch = Vec::new();
        let mut cursor = Some(*id);
        while let Some(current) = cursor {
            let Some(b) = self.blocks.get(&current) else {
                break;
            };
            if self.active_at(b.height()) == Some(&current) {
                break;
            }
            branch.push(current);
            cursor = b.parent().copied();
        }
        branch.reverse();

        let fork_height = branch
            .first()
            .and_then(|first| self.blocks.get(first))
            .map(|b| b.height())?;
        self.active.truncate((fork_height - 1) as usize);
        self.active.extend(branch.iter().copied());

        Some(ChainEvent::Reorganized(
            branch
                .iter()
                .filter_map(|b| self.blocks.get(b))
                .cloned()
                .collect(),
        ))
    }
}
