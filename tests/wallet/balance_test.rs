// Balance Tests
// Balances and transaction views derived from ledger, conflict and chain state

use txledger::ledger::{Block, LedgerError};
use txledger::node::{Node, NodeConfig, NodeError};
use txledger::tx::{Address, Amount, OutPoint, Transaction, TransactionBuilder, TxId};

fn alice() -> Address {
    Address::new("alice")
}

fn bob() -> Address {
    Address::new("bob")
}

fn coins(n: i64) -> Amount {
    Amount::from_coins(n)
}

fn sat(n: i64) -> Amount {
    Amount::from_sat(n)
}

/// A node holding a 750-coin coinbase for alice, confirmed at height 1
fn funded_node(config: NodeConfig) -> (Node, TxId) {
    let mut node = Node::new(config);
    let cb = TransactionBuilder::coinbase(alice(), coins(750)).nonce(1).build().unwrap();
    let cb_id = *cb.id();
    node.register(cb).unwrap();
    node.apply_block(&Block::new(1, vec![cb_id])).unwrap();
    (node, cb_id)
}

/// Alice splits her coinbase into foo (719) and bar (29)
fn fund_foo_and_bar(node: &mut Node, cb: TxId, f1: Amount, f2: Amount) -> (Transaction, Transaction) {
    let fund_foo = TransactionBuilder::new()
        .input(OutPoint::new(cb, 0))
        .output(alice(), coins(719))
        .output(alice(), coins(31) + f1)
        .fee(f1)
        .build()
        .unwrap();
    let fund_bar = TransactionBuilder::new()
        .input(OutPoint::new(*fund_foo.id(), 1))
        .output(alice(), coins(29))
        .output(alice(), coins(2) + f1 + f2)
        .fee(f2)
        .build()
        .unwrap();
    node.register(fund_foo.clone()).unwrap();
    node.register(fund_bar.clone()).unwrap();
    (fund_foo, fund_bar)
}

// ============================================================================
// SELF-FUNDED PENDING (SCENARIO A)
// ============================================================================

#[test]
fn test_funding_outputs_only_costs_fees() {
    let (mut node, cb) = funded_node(NodeConfig::new());
    let f1 = sat(-22_600);
    let f2 = sat(-18_000);

    fund_foo_and_bar(&mut node, cb, f1, f2);

    assert_eq!(node.get_balance(&alice(), false), coins(750) + f1 + f2);
    assert_eq!(node.get_balance(&alice(), true), coins(750) + f1 + f2);
}

#[test]
fn test_untrusted_mode_waits_for_confirmation() {
    let config = NodeConfig::new().with_trust_own_unconfirmed(false);
    let (mut node, cb) = funded_node(config);
    let f1 = sat(-22_600);
    let f2 = sat(-18_000);

    fund_foo_and_bar(&mut node, cb, f1, f2);

    assert_eq!(node.get_balance(&alice(), false), coins(750));
    assert_eq!(node.get_balance(&alice(), true), coins(750) + f1 + f2);
}

#[test]
fn test_breakdown_splits_pending() {
    let (mut node, cb) = funded_node(NodeConfig::new());
    let payment = TransactionBuilder::new()
        .input(OutPoint::new(cb, 0))
        .output(bob(), coins(40))
        .output(alice(), coins(710))
        .build()
        .unwrap();
    node.register(payment).unwrap();

    let alice_view = node.balance_breakdown(&alice());
    assert_eq!(alice_view.confirmed, coins(750));
    assert_eq!(alice_view.trusted_pending, coins(-40));
    assert_eq!(alice_view.untrusted_pending, Amount::ZERO);

    let bob_view = node.balance_breakdown(&bob());
    assert_eq!(bob_view.trusted_pending, Amount::ZERO);
    assert_eq!(bob_view.untrusted_pending, coins(40));
    assert_eq!(node.get_balance(&bob(), false), Amount::ZERO);
    assert_eq!(node.get_balance(&bob(), true), coins(40));
}

#[test]
fn test_unconfirmed_coinbase_is_not_trusted() {
    let mut node = Node::new(NodeConfig::new());
    let cb = TransactionBuilder::coinbase(alice(), coins(50)).build().unwrap();
    node.register(cb).unwrap();

    assert_eq!(node.get_balance(&alice(), false), Amount::ZERO);
    assert_eq!(node.get_balance(&alice(), true), coins(50));
}

// ============================================================================
// CONFLICT LOSERS (SCENARIO B)
// ============================================================================

#[test]
fn test_confirmed_doublespend_excludes_loser() {
    let (mut node, cb) = funded_node(NodeConfig::new());
    let (fund_foo, fund_bar) = fund_foo_and_bar(&mut node, cb, sat(-1_000), sat(-1_000));
    let foo = OutPoint::new(*fund_foo.id(), 0);
    let bar = OutPoint::new(*fund_bar.id(), 0);

    let tx1 = TransactionBuilder::new()
        .input(foo)
        .output(bob(), coins(40))
        .output(alice(), coins(679))
        .build()
        .unwrap();
    let doublespend = TransactionBuilder::new()
        .input(foo)
        .input(bar)
        .output(bob(), coins(740))
        .output(alice(), "7.98".parse().unwrap())
        .fee("-0.02".parse().unwrap())
        .build()
        .unwrap();
    let tx1_id = *tx1.id();
    let ds_id = *doublespend.id();
    node.register(tx1).unwrap();
    node.register(doublespend).unwrap();

    node.apply_block(&Block::new(2, vec![*fund_foo.id(), *fund_bar.id(), ds_id])).unwrap();

    assert_eq!(node.confirmations(&ds_id).unwrap(), 1);
    assert_eq!(node.confirmations(&tx1_id).unwrap(), -1);
    assert_eq!(node.get_balance(&bob(), false), coins(740));
    assert_eq!(node.get_balance(&bob(), true), coins(740));

    let details = node.get_transaction(&tx1_id).unwrap();
    assert_eq!(details.conflicts, vec![ds_id]);
    assert_eq!(details.block_height, None);
}

// ============================================================================
// REORG DEMOTION (SCENARIO C)
// ============================================================================

#[test]
fn test_reorg_demotion_drops_received_amount() {
    let (mut node, cb) = funded_node(NodeConfig::new());
    let payment = TransactionBuilder::new()
        .input(OutPoint::new(cb, 0))
        .output(bob(), coins(100))
        .output(alice(), coins(650))
        .build()
        .unwrap();
    let payment_id = *payment.id();
    node.register(payment).unwrap();
    node.apply_block(&Block::new(2, vec![payment_id])).unwrap();
    node.apply_block(&Block::new(3, vec![])).unwrap();
    assert_eq!(node.confirmations(&payment_id).unwrap(), 2);
    assert_eq!(node.get_balance(&bob(), false), coins(100));

    node.reorganize(&[Block::new(2, vec![]), Block::new(3, vec![]), Block::new(4, vec![])])
        .unwrap();

    assert_eq!(node.confirmations(&payment_id).unwrap(), 0);
    assert_eq!(node.get_balance(&bob(), false), Amount::ZERO);
    assert_eq!(node.get_balance(&bob(), true), coins(100));
}

// ============================================================================
// TRANSACTION DETAILS
// ============================================================================

#[test]
fn test_details_of_payment() {
    let (mut node, cb) = funded_node(NodeConfig::new());
    let payment = TransactionBuilder::new()
        .input(OutPoint::new(cb, 0))
        .output(bob(), coins(40))
        .output(alice(), coins(709))
        .fee(coins(-1))
        .build()
        .unwrap();
    let payment_id = *payment.id();
    node.register(payment).unwrap();
    node.apply_block(&Block::new(2, vec![payment_id])).unwrap();

    let details = node.get_transaction(&payment_id).unwrap();
    assert_eq!(details.amount, coins(-40));
    assert_eq!(details.fee, coins(-1));
    assert_eq!(details.confirmations, 1);
    assert_eq!(details.block_height, Some(2));
    assert_eq!(details.outputs.len(), 2);
    assert!(details.conflicts.is_empty());
}

#[test]
fn test_details_of_coinbase() {
    let (node, cb) = funded_node(NodeConfig::new());

    let details = node.get_transaction(&cb).unwrap();
    assert_eq!(details.amount, coins(750));
    assert_eq!(details.confirmations, 1);
}

#[test]
fn test_details_of_unknown_transaction() {
    let (node, _) = funded_node(NodeConfig::new());
    let missing = TxId::from_label("missing");

    assert_eq!(
        node.get_transaction(&missing).unwrap_err(),
        NodeError::Ledger(LedgerError::NotFound(missing))
    );
}

#[test]
fn test_find_output_by_amount() {
    let (mut node, cb) = funded_node(NodeConfig::new());
    let (fund_foo, _) = fund_foo_and_bar(&mut node, cb, sat(-1_000), sat(-1_000));

    assert_eq!(
        node.find_output(fund_foo.id(), coins(719)),
        Some(OutPoint::new(*fund_foo.id(), 0))
    );
    assert_eq!(node.find_output(fund_foo.id(), coins(1)), None);
}
