// Block Tree Tests
// Longest-chain selection over blocks arriving in any order

use txledger::sync::{BlockTree, BlockTreeError, ChainEvent, MinedBlock};
use txledger::tx::TxId;

fn genesis(miner: &str) -> MinedBlock {
    MinedBlock::new(None, 1, vec![], miner)
}

fn child(parent: &MinedBlock, ids: Vec<TxId>, miner: &str) -> MinedBlock {
    MinedBlock::new(Some(*parent.id()), parent.height() + 1, ids, miner)
}

// ============================================================================
// EXTENDING THE TIP
// ============================================================================

#[test]
fn test_chain_extends() {
    let mut tree = BlockTree::new();
    let b1 = genesis("a");
    let b2 = child(&b1, vec![TxId::from_label("x")], "a");

    tree.accept(b1).unwrap();
    let events = tree.accept(b2.clone()).unwrap();

    assert_eq!(events, vec![ChainEvent::Connected(b2.clone())]);
    assert_eq!(tree.tip(), Some(b2.id()));
    assert!(tree.is_active(b2.id()));
}

#[test]
fn test_duplicate_block_ignored() {
    let mut tree = BlockTree::new();
    let b1 = genesis("a");

    tree.accept(b1.clone()).unwrap();

    assert!(tree.accept(b1).unwrap().is_empty());
    assert_eq!(tree.height(), 1);
}

// ============================================================================
// FORKS
// ============================================================================

#[test]
fn test_equal_length_fork_keeps_first_seen() {
    let mut tree = BlockTree::new();
    let b1 = genesis("a");
    let ours = child(&b1, vec![], "a");
    let theirs = child(&b1, vec![], "b");

    tree.accept(b1).unwrap();
    tree.accept(ours.clone()).unwrap();
    let events = tree.accept(theirs.clone()).unwrap();

    assert!(events.is_empty());
    assert!(tree.is_active(ours.id()));
    assert!(tree.contains(theirs.id()));
    assert!(!tree.is_active(theirs.id()));
}

#[test]
fn test_longer_fork_reorganizes() {
    let mut tree = BlockTree::new();
    let b1 = genesis("a");
    let ours = child(&b1, vec![TxId::from_label("tx1")], "a");
    let theirs = child(&b1, vec![TxId::from_label("ds")], "b");
    let theirs_next = child(&theirs, vec![], "b");

    tree.accept(b1).unwrap();
    tree.accept(ours).unwrap();
    tree.accept(theirs.clone()).unwrap();
    let events = tree.accept(theirs_next.clone()).unwrap();

    assert_eq!(
        events,
        vec![ChainEvent::Reorganized(vec![theirs.clone(), theirs_next.clone()])]
    );
    assert_eq!(tree.height(), 3);
    assert_eq!(tree.active_blocks()[1].tx_ids(), &[TxId::from_label("ds")]);
}

// ============================================================================
// ORPHANS AND INVALID BLOCKS
// ============================================================================

#[test]
fn test_orphans_connect_in_order() {
    let mut tree = BlockTree::new();
    let b1 = genesis("a");
    let b2 = child(&b1, vec![], "a");
    let b3 = child(&b2, vec![], "a");

    assert!(tree.accept(b3.clone()).unwrap().is_empty());
    assert!(tree.accept(b2).unwrap().is_empty());
    assert_eq!(tree.orphan_count(), 2);

    let events = tree.accept(b1).unwrap();

    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| matches!(e, ChainEvent::Connected(_))));
    assert_eq!(tree.tip(), Some(b3.id()));
    assert_eq!(tree.orphan_count(), 0);
}

#[test]
fn test_wrong_height_rejected() {
    let mut tree = BlockTree::new();
    let b1 = genesis("a");
    let bad = MinedBlock::new(Some(*b1.id()), 5, vec![], "a");
    tree.accept(b1).unwrap();

    assert!(matches!(
        tree.accept(bad),
        Err(BlockTreeError::InvalidHeight { height: 5, parent_height: 1, .. })
    ));
}

#[test]
fn test_parentless_block_must_be_first() {
    let mut tree = BlockTree::new();
    let bad = MinedBlock::new(None, 2, vec![], "a");

    assert!(matches!(tree.accept(bad), Err(BlockTreeError::InvalidGenesis(_))));
}
