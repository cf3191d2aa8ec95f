// Network Tests
// Delivery within connected components, backlog on reconnect, mining templates

use txledger::node::NodeConfig;
use txledger::sync::{block_template, Network, NetworkConfig, NetworkError, Topology};
use txledger::tx::{Address, Amount, OutPoint, TransactionBuilder, TxId};

fn line(nodes: usize) -> Network {
    Network::new(NetworkConfig::new().with_nodes(nodes).with_topology(Topology::Line))
}

fn coins(n: i64) -> Amount {
    Amount::from_coins(n)
}

// ============================================================================
// TOPOLOGY
// ============================================================================

#[test]
fn test_line_topology_links_neighbours() {
    let network = line(4);

    assert!(network.is_connected(0, 1));
    assert!(network.is_connected(2, 1));
    assert!(!network.is_connected(0, 2));
    assert_eq!(network.component(0).len(), 4);
    assert_eq!(network.node(3).unwrap().label(), "node3");
}

#[test]
fn test_isolated_and_mesh() {
    let isolated = Network::new(NetworkConfig::new().with_nodes(3).with_topology(Topology::Isolated));
    let mesh = Network::new(NetworkConfig::new().with_nodes(3).with_topology(Topology::FullMesh));

    assert_eq!(isolated.component(1).len(), 1);
    assert!(mesh.is_connected(0, 2));
}

#[test]
fn test_bad_indices() {
    let mut network = line(2);

    assert!(matches!(network.node(9), Err(NetworkError::UnknownNode(9))));
    assert!(matches!(network.connect(1, 1), Err(NetworkError::SelfLink(1))));
    assert!(matches!(network.disconnect(0, 7), Err(NetworkError::UnknownNode(7))));
}

// ============================================================================
// DELIVERY
// ============================================================================

#[test]
fn test_transaction_reaches_whole_component() {
    let mut network = line(3);

    let id = network.fund(0, Address::new("alice"), coins(5)).unwrap();

    for i in 0..3 {
        assert!(network.node(i).unwrap().ledger().contains(&id));
    }
    assert_eq!(network.log_len(), 1);
}

#[test]
fn test_partition_withholds_until_connect() {
    let mut network = line(4);
    assert!(network.disconnect(1, 2).unwrap());

    let left = network.fund(0, Address::new("alice"), coins(5)).unwrap();
    let right = network.fund(3, Address::new("bob"), coins(7)).unwrap();

    assert!(network.node(1).unwrap().ledger().contains(&left));
    assert!(!network.node(2).unwrap().ledger().contains(&left));
    assert!(!network.node(0).unwrap().ledger().contains(&right));

    let report = network.connect(1, 2).unwrap();

    assert_eq!(report.delivered, 4);
    assert_eq!(report.rejected, 0);
    assert!(network.node(3).unwrap().ledger().contains(&left));
    assert!(network.node(0).unwrap().ledger().contains(&right));
}

#[test]
fn test_traffic_on_one_side_keeps_backlog_withheld() {
    let mut network = line(4);
    network.disconnect(1, 2).unwrap();

    let left = network.fund(0, Address::new("alice"), coins(5)).unwrap();
    let right = network.fund(3, Address::new("bob"), coins(7)).unwrap();
    network.fund(2, Address::new("bob"), coins(1)).unwrap();
    let block = network.mine(2).unwrap();

    for i in [2, 3] {
        assert!(!network.node(i).unwrap().ledger().contains(&left));
    }
    assert!(!block.tx_ids().contains(&left));
    assert!(block.tx_ids().contains(&right));
    assert!(!network.node(1).unwrap().ledger().contains(&right));
    assert_eq!(network.node(1).unwrap().best_height(), 0);
}

#[test]
fn test_backlog_delivered_in_production_order() {
    let mut network = line(2);
    network.disconnect(0, 1).unwrap();

    let first = network.fund(0, Address::new("alice"), coins(1)).unwrap();
    let second = network.fund(0, Address::new("alice"), coins(2)).unwrap();
    let third = network.fund(0, Address::new("alice"), coins(3)).unwrap();
    network.connect(0, 1).unwrap();

    let arrival: Vec<_> = network
        .node(1)
        .unwrap()
        .ledger()
        .ordered()
        .iter()
        .map(|e| *e.id())
        .collect();
    assert_eq!(arrival, vec![first, second, third]);
}

#[test]
fn test_reconnect_reorganizes_shorter_side() {
    let mut network = line(2);
    network.disconnect(0, 1).unwrap();

    network.mine(0).unwrap();
    let short_tip = network.block_tree(0).unwrap().tip().copied().unwrap();
    network.mine(1).unwrap();
    network.mine(1).unwrap();

    let report = network.connect(0, 1).unwrap();

    assert_eq!(report.reorgs, 1);
    assert_eq!(network.node(0).unwrap().best_height(), 2);
    assert!(!network.block_tree(0).unwrap().is_active(&short_tip));
    assert_eq!(
        network.block_tree(0).unwrap().tip(),
        network.block_tree(1).unwrap().tip()
    );
}

#[test]
fn test_rejected_reorg_keeps_tree_on_applied_chain() {
    let config = NetworkConfig::new()
        .with_nodes(2)
        .with_topology(Topology::Line)
        .with_node_config(NodeConfig::new().with_max_reorg_depth(1));
    let mut network = Network::new(config);
    network.disconnect(0, 1).unwrap();

    network.mine(0).unwrap();
    let own_tip = network.mine(0).unwrap();
    for _ in 0..3 {
        network.mine(1).unwrap();
    }

    let report = network.connect(0, 1).unwrap();

    assert_eq!(report.rejected, 1);
    assert_eq!(report.reorgs, 0);
    let tree = network.block_tree(0).unwrap();
    assert_eq!(tree.tip(), Some(own_tip.id()));
    assert_eq!(tree.height(), 2);
    assert_eq!(network.node(0).unwrap().best_height(), 2);

    let next = network.mine(0).unwrap();

    assert_eq!(next.height(), 3);
    assert_eq!(next.parent(), Some(own_tip.id()));
    assert_eq!(network.node(0).unwrap().best_height(), 3);
    assert!(!network.node(0).unwrap().resync_required());
}

// ============================================================================
// MINING
// ============================================================================

#[test]
fn test_mined_block_confirms_everywhere() {
    let mut network = line(3);
    let id = network.fund(2, Address::new("alice"), coins(5)).unwrap();

    let block = network.mine(0).unwrap();

    assert_eq!(block.height(), 1);
    assert_eq!(block.tx_ids(), &[id]);
    for i in 0..3 {
        assert_eq!(network.node(i).unwrap().confirmations(&id).unwrap(), 1);
    }
}

#[test]
fn test_template_takes_first_of_competing_spends() {
    let mut network = line(1);
    let cb = network.fund(0, Address::new("alice"), coins(50)).unwrap();
    network.mine(0).unwrap();

    let spend = |to: &str| {
        TransactionBuilder::new()
            .input(OutPoint::new(cb, 0))
            .output(Address::new(to), coins(50))
            .build()
            .unwrap()
    };
    let first = network.submit(0, spend("bob")).unwrap();
    network.submit(0, spend("carol")).unwrap();

    assert_eq!(block_template(network.node(0).unwrap()), vec![first]);
}

#[test]
fn test_template_includes_child_after_parent() {
    let mut network = line(1);
    let cb = network.fund(0, Address::new("alice"), coins(50)).unwrap();
    network.mine(0).unwrap();

    let parent = TransactionBuilder::new()
        .input(OutPoint::new(cb, 0))
        .output(Address::new("bob"), coins(50))
        .build()
        .unwrap();
    let parent_id = *parent.id();
    let child = TransactionBuilder::new()
        .input(OutPoint::new(parent_id, 0))
        .output(Address::new("carol"), coins(50))
        .build()
        .unwrap();
    let orphan = TransactionBuilder::new()
        .input(OutPoint::new(TxId::from_label("unknown"), 0))
        .output(Address::new("dave"), coins(1))
        .build()
        .unwrap();
    network.submit(0, orphan).unwrap();
    network.submit(0, parent).unwrap();
    let child_id = network.submit(0, child).unwrap();

    assert_eq!(block_template(network.node(0).unwrap()), vec![parent_id, child_id]);
}

#[test]
fn test_resync_rebuilds_from_tree() {
    let mut network = line(2);
    network.mine(0).unwrap();
    network.mine(1).unwrap();

    network.resync(1).unwrap();

    let node = network.node(1).unwrap();
    assert_eq!(node.best_height(), 2);
    assert!(!node.resync_required());
}

#[test]
fn test_labels_follow_template() {
    let network = Network::new(NetworkConfig::new().with_nodes(2).with_node_config(NodeConfig::new().with_label("peer")));

    assert_eq!(network.node(1).unwrap().label(), "peer1");
}
