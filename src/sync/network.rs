// Network - in-process transport between independent ledger nodes
//
// Every produced message lands in one ordered log. A node receives a message
// when it sits in the producer's connected component, or later when a
// `connect` merges it with a component that already holds the message.
// Withheld messages are then delivered in their original production order
// before `connect` returns. Traffic on one side of a split never pulls the
// other side's backlog across.

use crate::ledger::RegisterOutcome;
use crate::node::{Node, NodeConfig, NodeError};
use crate::sync::blocks::{BlockTree, BlockTreeError, ChainEvent};
use crate::sync::protocol::{Envelope, Message, MessageId, MinedBlock, ProtocolError};
use crate::tx::{Address, Amount, BuilderError, OutPoint, Transaction, TransactionBuilder, TxId};
use std::collections::{BTreeSet, HashSet, VecDeque};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Unknown node index {0}")]
    UnknownNode(usize),

    #[error("Cannot link node {0} to itself")]
    SelfLink(usize),

    #[error("Node {node} rejected event: {source}")]
    Node {
        node: usize,
        #[source]
        source: NodeError,
    },

    #[error("Node {node} rejected block: {source}")]
    Block {
        node: usize,
        #[source]
        source: BlockTreeError,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Builder(#[from] BuilderError),
}

/// Initial link layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// 0-1, 1-2, ... (n-2)-(n-1)
    Line,
    FullMesh,
    Isolated,
}

/// Configuration for the simulated network
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub nodes: usize,
    pub topology: Topology,
    /// Template for every node; labels get the node index appended
    pub node: NodeConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nodes: 4,
            topology: Topology::Line,
            node: NodeConfig::default(),
        }
    }
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_node_config(mut self, node: NodeConfig) -> Self {
        self.node = node;
        self
    }
}

/// Counters for one round of deliveries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub reorgs: usize,
}

impl DeliveryReport {
    fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
        self.reorgs += other.reorgs;
    }
}

struct Peer {
    node: Node,
    tree: BlockTree,
    seen: HashSet<MessageId>,
}

/// A set of nodes that share nothing except delivered messages
pub struct Network {
    peers: Vec<Peer>,
    links: BTreeSet<(usize, usize)>,
    log: Vec<Envelope>,
}

impl Network {
    pub fn new(config: NetworkConfig) -> Self {
        let peers = (0..config.nodes)
            .map(|i| {
                let label = format!("{}{}", config.node.label, i);
                Peer {
                    node: Node::new(config.node.clone().with_label(label)),
                    tree: BlockTree::new(),
                    seen: HashSet::new(),
                }
            })
            .collect();

        let mut links = BTreeSet::new();
        match config.topology {
            Topology::Line => {
                for i in 1..config.nodes {
                    links.insert((i - 1, i));
                }
            }
            Topology::FullMesh => {
                for a in 0..config.nodes {
                    for b in a + 1..config.nodes {
                        links.insert((a, b));
                    }
                }
            }
            Topology::Isolated => {}
        }

        Self {
            peers,
            links,
            log: Vec::new(),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn node(&self, index: usize) -> Result<&Node, NetworkError> {
        self.peers
            .get(index)
            .map(|p| &p.node)
            .ok_or(NetworkError::UnknownNode(index))
    }

    pub fn block_tree(&self, index: usize) -> Result<&BlockTree, NetworkError> {
        self.peers
            .get(index)
            .map(|p| &p.tree)
            .ok_or(NetworkError::UnknownNode(index))
    }

    // ========================================================================
    // LINKS
    // ========================================================================

    pub fn is_connected(&self, a: usize, b: usize) -> bool {
        self.links.contains(&Self::edge(a, b))
    }

    /// Nodes reachable from `index` over current links
    pub fn component(&self, index: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([index]);
        let mut queue = VecDeque::from([index]);
        while let Some(current) = queue.pop_front() {
            for (a, b) in &self.links {
                let next = match (*a == current, *b == current) {
                    (true, _) => *b,
                    (_, true) => *a,
                    _ => continue,
                };
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Link two nodes and deliver all backlog across the merged component
    pub fn connect(&mut self, a: usize, b: usize) -> Result<DeliveryReport, NetworkError> {
        self.check_pair(a, b)?;
        self.links.insert(Self::edge(a, b));
        info!(a, b, "nodes connected");
        Ok(self.propagate(a))
    }

    /// Stop delivery between two nodes; returns false if they were not linked
    pub fn disconnect(&mut self, a: usize, b: usize) -> Result<bool, NetworkError> {
        self.check_pair(a, b)?;
        let removed = self.links.remove(&Self::edge(a, b));
        info!(a, b, "nodes disconnected");
        Ok(removed)
    }

    // ========================================================================
    // PRODUCING EVENTS
    // ========================================================================

    /// Register `tx` on `origin` and relay it
    pub fn submit(&mut self, origin: usize, tx: Transaction) -> Result<TxId, NetworkError> {
        self.check_node(origin)?;
        let id = *tx.id();
        let message = Message::Transaction(tx.clone());
        let envelope = Envelope::seal(self.log.len() as u64, origin, &message)?;

        let peer = &mut self.peers[origin];
        peer.node
            .register(tx)
            .map_err(|source| NetworkError::Node { node: origin, source })?;
        peer.seen.insert(*envelope.id());

        self.log.push(envelope);
        self.propagate(origin);
        Ok(id)
    }

    /// Submit a coinbase paying `amount` to `address`
    pub fn fund(&mut self, origin: usize, address: Address, amount: Amount) -> Result<TxId, NetworkError> {
        let tx = TransactionBuilder::coinbase(address, amount).build()?;
        self.submit(origin, tx)
    }

    /// Mine the origin's eligible mempool onto its current tip
    pub fn mine(&mut self, origin: usize) -> Result<MinedBlock, NetworkError> {
        self.check_node(origin)?;
        let template = block_template(&self.peers[origin].node);
        self.mine_with(origin, template)
    }

    /// Mine a block containing exactly `tx_ids` onto the origin's tip
    pub fn mine_with(&mut self, origin: usize, tx_ids: Vec<TxId>) -> Result<MinedBlock, NetworkError> {
        self.check_node(origin)?;
        let peer = &self.peers[origin];
        let block = MinedBlock::new(
            peer.tree.tip().copied(),
            peer.tree.height() + 1,
            tx_ids,
            peer.node.label(),
        );
        let envelope = Envelope::seal(self.log.len() as u64, origin, &Message::Block(block.clone()))?;

        self.peers[origin].seen.insert(*envelope.id());
        self.accept_block(origin, block.clone())?;
        info!(node = origin, height = block.height(), txs = block.tx_ids().len(), "block mined");

        self.log.push(envelope);
        self.propagate(origin);
        Ok(block)
    }

    /// Rebuild a node's chain view from its block tree
    pub fn resync(&mut self, index: usize) -> Result<(), NetworkError> {
        self.check_node(index)?;
        let peer = &mut self.peers[index];
        let blocks = peer.tree.active_blocks();
        peer.node
            .resync(&blocks)
            .map_err(|source| NetworkError::Node { node: index, source })
    }

    // ========================================================================
    // DELIVERY
    // ========================================================================

    /// Flood the origin's component with every message it already knows
    fn propagate(&mut self, origin: usize) -> DeliveryReport {
        let members = self.component(origin);
        let mut report = DeliveryReport::default();
        for position in 0..self.log.len() {
            let envelope = &self.log[position];
            if !self.is_known_within(&members, envelope) {
                continue;
            }
            let envelope = envelope.clone();
            for &index in &members {
                if self.peers[index].seen.insert(*envelope.id()) {
                    report.merge(self.deliver(index, &envelope));
                }
            }
        }
        report
    }

    /// A message may cross links only inside the component that produced or received it
    fn is_known_within(&self, members: &BTreeSet<usize>, envelope: &Envelope) -> bool {
        members.contains(&envelope.origin())
            || members.iter().any(|&i| self.peers[i].seen.contains(envelope.id()))
    }

    fn deliver(&mut self, index: usize, envelope: &Envelope) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let message = match envelope.open() {
            Ok(message) => message,
            Err(err) => {
                warn!(node = index, error = %err, "undecodable message dropped");
                report.rejected += 1;
                return report;
            }
        };

        debug!(
            node = index,
            sequence = envelope.sequence(),
            origin = envelope.origin(),
            kind = ?message.message_type(),
            "delivering"
        );

        match message {
            Message::Transaction(tx) => match self.peers[index].node.register(tx) {
                Ok(RegisterOutcome::Inserted) => report.delivered += 1,
                Ok(RegisterOutcome::AlreadyKnown) => report.duplicates += 1,
                Err(err) => {
                    warn!(node = index, error = %err, "transaction rejected");
                    report.rejected += 1;
                }
            },
            Message::Block(block) => match self.accept_block(index, block) {
                Ok(reorgs) => {
                    report.delivered += 1;
                    report.reorgs += reorgs;
                }
                Err(err) => {
                    warn!(node = index, error = %err, "block rejected");
                    report.rejected += 1;
                }
            },
        }
        report
    }

    /// Feed a block to the node's tree and turn the outcome into ledger events.
    ///
    /// The tree keeps only the events the node accepted; on a refusal its
    /// active chain is rewound to the last tip the ledger applied.
    fn accept_block(&mut self, index: usize, block: MinedBlock) -> Result<usize, NetworkError> {
        let peer = &mut self.peers[index];
        let mut committed = peer.tree.tip().copied();
        let events = peer
            .tree
            .accept(block)
            .map_err(|source| NetworkError::Block { node: index, source })?;

        let mut reorgs = 0;
        for event in events {
            let result = match &event {
                ChainEvent::Connected(block) => peer.node.apply_block(&block.to_block()),
                ChainEvent::Reorganized(_) => peer.node.reorganize(&event.ledger_blocks()).map(|_| ()),
            };
            if let Err(source) = result {
                peer.tree.rewind(committed);
                return Err(NetworkError::Node { node: index, source });
            }
            if matches!(event, ChainEvent::Reorganized(_)) {
                reorgs += 1;
            }
            committed = event.tip().copied();
        }
        Ok(reorgs)
    }

    fn edge(a: usize, b: usize) -> (usize, usize) {
        (a.min(b), a.max(b))
    }

    fn check_node(&self, index: usize) -> Result<(), NetworkError> {
        if index >= self.peers.len() {
            return Err(NetworkError::UnknownNode(index));
        }
        Ok(())
    }

    fn check_pair(&self, a: usize, b: usize) -> Result<(), NetworkError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(NetworkError::SelfLink(a));
        }
        Ok(())
    }
}

/// Pick mempool transactions a miner could include on top of the node's chain.
///
/// Arrival order decides between competitors; a transaction is skipped when
/// one of its inputs is already spent by a confirmed or selected transaction,
/// or when a known parent is neither confirmed nor selected.
pub fn block_template(node: &Node) -> Vec<TxId> {
    let ledger = node.ledger();
    let mut claimed: HashSet<OutPoint> = ledger
        .iter()
        .filter(|e| e.confirmations() > 0)
        .flat_map(|e| e.transaction().spent_outpoints().copied())
        .collect();
    let mut selected = Vec::new();
    let mut included = HashSet::new();

    for tx in node.mempool() {
        if tx.spent_outpoints().any(|op| claimed.contains(op)) {
            continue;
        }
        let parents_ready = tx.spent_outpoints().all(|op| match ledger.get(op.txid()) {
            Ok(parent) => parent.confirmations() > 0 || included.contains(op.txid()),
            Err(_) => false,
        });
        if !parents_ready {
            continue;
        }

        claimed.extend(tx.spent_outpoints().copied());
        included.insert(*tx.id());
        selected.push(*tx.id());
    }

    selected
}
