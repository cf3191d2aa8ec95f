// Node module - ONE WALLET'S STATE MACHINE
// Wires ledger, conflict tracker, chain view and balance queries together

mod config;
#[allow(clippy::module_inception)]
mod node;
mod shared;

pub use config::NodeConfig;
pub use node::{Node, NodeError};
pub use shared::SharedNode;
