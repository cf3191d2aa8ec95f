// Protocol - Message types relayed between simulated nodes
//
// Two payloads travel the wire:
// - Transaction: a signed transaction announced by its producer
// - Block: a mined block (id, parent link, height, confirmed ids)

use crate::ledger::Block;
use crate::tx::{Transaction, TxId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Upper bound on an encoded message
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Unique identifier for a message (for deduplication)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId([u8; 32]);

impl MessageId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

/// Identifier of a mined block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId([u8; 32]);

impl BlockId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

/// A block as produced by a miner, linked to its parent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinedBlock {
    id: BlockId,
    parent: Option<BlockId>,
    height: u64,
    tx_ids: Vec<TxId>,
    miner: String,
}

impl MinedBlock {
    pub fn new(parent: Option<BlockId>, height: u64, tx_ids: Vec<TxId>, miner: impl Into<String>) -> Self {
        let miner = miner.into();

        let mut hasher = Sha256::new();
        hasher.update(b"block:");
        if let Some(parent) = &parent {
            hasher.update(parent.as_bytes());
        }
        hasher.update(height.to_le_bytes());
        for id in &tx_ids {
            hasher.update(id.as_bytes());
        }
        hasher.update(miner.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());

        Self {
            id: BlockId(bytes),
            parent,
            height,
            tx_ids,
            miner,
        }
    }

    pub fn id(&self) -> &BlockId {
        &self.id
    }

    pub fn parent(&self) -> Option<&BlockId> {
        self.parent.as_ref()
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn tx_ids(&self) -> &[TxId] {
        &self.tx_ids
    }

    pub fn miner(&self) -> &str {
        &self.miner
    }

    /// The ledger-facing view of this block
    pub fn to_block(&self) -> Block {
        Block::new(self.height, self.tx_ids.clone())
    }
}

/// Types of messages in the protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Transaction,
    Block,
}

/// Protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Deserialization failed")]
    DeserializationFailed,

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Wrapper for all message types
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Transaction(Transaction),
    Block(MinedBlock),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Transaction(_) => MessageType::Transaction,
            Message::Block(_) => MessageType::Block,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let bytes = postcard::to_allocvec(self).map_err(|e| ProtocolError::EncodeFailed(e.to_string()))?;
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        postcard::from_bytes(bytes).map_err(|_| ProtocolError::DeserializationFailed)
    }
}

/// A message as it sits in the network log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Global production order
    sequence: u64,
    /// Index of the producing node
    origin: usize,
    id: MessageId,
    payload: Vec<u8>,
}

impl Envelope {
    pub fn seal(sequence: u64, origin: usize, message: &Message) -> Result<Self, ProtocolError> {
        let payload = message.to_bytes()?;
        let hash = Sha256::digest(&payload);
        let mut id = [0u8; 32];
        id.copy_from_slice(&hash);

        Ok(Self {
            sequence,
            origin,
            id: MessageId(id),
            payload,
        })
    }

    pub fn open(&self) -> Result<Message, ProtocolError> {
        Message::from_bytes(&self.payload)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
