use serde::{Deserialize, Serialize};

/// Configuration for a single ledger node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name used in logs
    pub label: String,
    /// Deepest reorganization accepted, in disconnected blocks
    pub max_reorg_depth: u64,
    /// Count unconfirmed self-spends in the confirmed-only balance
    pub trust_own_unconfirmed: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            label: "node".to_string(),
            max_reorg_depth: 100,
            trust_own_unconfirmed: true,
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_max_reorg_depth(mut self, depth: u64) -> Self {
        self.max_reorg_depth = depth;
        self
    }

    pub fn with_trust_own_unconfirmed(mut self, trust: bool) -> Self {
        self.trust_own_unconfirmed = trust;
        self
    }
}
