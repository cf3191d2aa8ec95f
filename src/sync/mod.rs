// Sync module - HOW NODES TALK
// Message envelopes, longest-chain block tree, partitionable network and the
// double-spend scenario that drives it all

mod blocks;
mod network;
mod protocol;
pub mod scenario;

pub use blocks::{BlockTree, BlockTreeError, ChainEvent};
pub use network::{block_template, DeliveryReport, Network, NetworkConfig, NetworkError, Topology};
pub use protocol::{
    BlockId, Envelope, Message, MessageId, MessageType, MinedBlock, ProtocolError, MAX_MESSAGE_SIZE,
};
pub use scenario::{run_double_spend, NodeBalance, ScenarioError, ScenarioOptions, ScenarioReport};
