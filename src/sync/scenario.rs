// Double-spend scenario - a wallet double-spends itself across a network split
//
// Four nodes in a line, split between 1 and 2. Node 0 funds two outputs,
// spends each of them on its side of the split, while the miner on the other
// side confirms a raw transaction spending both. After the split heals the
// raw spend wins and node 0's two spends become conflicted.

use crate::node::{NodeConfig, NodeError};
use crate::sync::network::{Network, NetworkConfig, NetworkError, Topology};
use crate::tx::{Address, Amount, BuilderError, OutPoint, TransactionBuilder, TxId};
use std::fmt;
use thiserror::Error;
use tracing::info;

const FOO_AMOUNT: i64 = 719;
const BAR_AMOUNT: i64 = 29;
const DOUBLESPEND_PAYMENT: i64 = 740;
const TX1_PAYMENT: i64 = 40;
const TX2_PAYMENT: i64 = 20;
/// Fees the signer attached to the funding and spending transactions, in base units
const FUND_FOO_FEE_SAT: i64 = -22_600;
const FUND_BAR_FEE_SAT: i64 = -22_600;
const SPEND_FEE_SAT: i64 = -3_740;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error("No output of {txid} pays {amount}")]
    MissingOutput { txid: TxId, amount: Amount },

    #[error("Starting balance {0} cannot fund the scenario")]
    InsufficientStartingBalance(Amount),
}

/// Knobs for the double-spend run
#[derive(Clone, Debug)]
pub struct ScenarioOptions {
    /// Node 0 mines its two spends before the split heals
    pub mine_block: bool,
    pub starting_balance: Amount,
    /// Fee carried by the raw double-spend
    pub doublespend_fee: Amount,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            mine_block: false,
            starting_balance: Amount::from_coins(750),
            doublespend_fee: Amount::from_sat(-2_000_000),
        }
    }
}

impl ScenarioOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mine_block(mut self, mine_block: bool) -> Self {
        self.mine_block = mine_block;
        self
    }

    pub fn with_starting_balance(mut self, amount: Amount) -> Self {
        self.starting_balance = amount;
        self
    }

    pub fn with_doublespend_fee(mut self, fee: Amount) -> Self {
        self.doublespend_fee = fee;
        self
    }
}

/// Balance of one node's wallet address
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeBalance {
    pub label: String,
    pub address: Address,
    pub confirmed_only: Amount,
    pub with_unconfirmed: Amount,
}

/// What the scenario observed
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    /// Node 0 after funding foo and bar, before anything else
    pub funded_balance: Amount,
    pub expected_funded_balance: Amount,
    /// Confirmations of node 0's spends before the split heals
    pub tx1_confirmations_before: i64,
    pub tx2_confirmations_before: i64,
    pub doublespend: TxId,
    pub doublespend_confirmations: i64,
    pub tx1_confirmations: i64,
    pub tx2_confirmations: i64,
    pub balances: Vec<NodeBalance>,
    pub expected_node0_balance: Amount,
    pub expected_node1_balance: Amount,
}

impl ScenarioReport {
    /// True when every observed value matches the expected accounting
    pub fn is_consistent(&self) -> bool {
        self.funded_balance == self.expected_funded_balance
            && self.doublespend_confirmations == 2
            && self.tx1_confirmations == -2
            && self.tx2_confirmations == -2
            && self.balances.first().map(|b| b.confirmed_only) == Some(self.expected_node0_balance)
            && self.balances.get(1).map(|b| b.confirmed_only) == Some(self.expected_node1_balance)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "funded balance:      {} (expected {})", self.funded_balance, self.expected_funded_balance)?;
        writeln!(
            f,
            "before reconnect:    tx1={} tx2={}",
            self.tx1_confirmations_before, self.tx2_confirmations_before
        )?;
        writeln!(f, "doublespend {}: {} confirmations", self.doublespend, self.doublespend_confirmations)?;
        writeln!(f, "tx1: {} confirmations, tx2: {} confirmations", self.tx1_confirmations, self.tx2_confirmations)?;
        for balance in &self.balances {
            writeln!(
                f,
                "{:<8} {:<10} confirmed={} with-unconfirmed={}",
                balance.label, balance.address, balance.confirmed_only, balance.with_unconfirmed
            )?;
        }
        write!(
            f,
            "expected node0={} node1={} -> {}",
            self.expected_node0_balance,
            self.expected_node1_balance,
            if self.is_consistent() { "OK" } else { "MISMATCH" }
        )
    }
}

fn wallet(index: usize) -> Address {
    Address::new(format!("wallet{index}"))
}

fn find(network: &Network, node: usize, txid: &TxId, amount: Amount) -> Result<OutPoint, ScenarioError> {
    network
        .node(node)?
        .find_output(txid, amount)
        .ok_or(ScenarioError::MissingOutput { txid: *txid, amount })
}

/// Run the split-network double-spend and report what every node ended with
pub fn run_double_spend(options: &ScenarioOptions) -> Result<ScenarioReport, ScenarioError> {
    let start = options.starting_balance;
    let foo_amount = Amount::from_coins(FOO_AMOUNT);
    let bar_amount = Amount::from_coins(BAR_AMOUNT);
    let fund_foo_fee = Amount::from_sat(FUND_FOO_FEE_SAT);
    let fund_bar_fee = Amount::from_sat(FUND_BAR_FEE_SAT);
    let spend_fee = Amount::from_sat(SPEND_FEE_SAT);

    let foo_change = start - foo_amount + fund_foo_fee;
    let bar_change = foo_change - bar_amount + fund_bar_fee;
    if bar_change.is_negative() {
        return Err(ScenarioError::InsufficientStartingBalance(start));
    }

    let config = NetworkConfig::new()
        .with_nodes(4)
        .with_topology(Topology::Line)
        .with_node_config(NodeConfig::new().with_label("node"));
    let mut network = Network::new(config);

    // Everyone starts funded and connected
    let funding = network.fund(3, wallet(0), start)?;
    network.fund(3, wallet(1), start)?;
    network.mine(3)?;

    network.disconnect(1, 2)?;
    info!("network split between node 1 and node 2");

    // Node 0 moves its coins into foo and bar
    let coinbase = find(&network, 0, &funding, start)?;
    let fund_foo = TransactionBuilder::new()
        .input(coinbase)
        .output(wallet(0), foo_amount)
        .output(wallet(0), foo_change)
        .fee(fund_foo_fee)
        .build()?;
    let fund_foo_id = network.submit(0, fund_foo.clone())?;

    let foo_change_out = find(&network, 0, &fund_foo_id, foo_change)?;
    let fund_bar = TransactionBuilder::new()
        .input(foo_change_out)
        .output(wallet(0), bar_amount)
        .output(wallet(0), bar_change)
        .fee(fund_bar_fee)
        .build()?;
    let fund_bar_id = network.submit(0, fund_bar.clone())?;

    let funded_balance = network.node(0)?.get_balance(&wallet(0), false);
    let expected_funded_balance = start + fund_foo_fee + fund_bar_fee;

    // Raw double-spend of foo and bar, signed but held back
    let foo = find(&network, 0, &fund_foo_id, foo_amount)?;
    let bar = find(&network, 0, &fund_bar_id, bar_amount)?;
    let doublespend_payment = Amount::from_coins(DOUBLESPEND_PAYMENT);
    let doublespend = TransactionBuilder::new()
        .input(foo)
        .input(bar)
        .output(wallet(1), doublespend_payment)
        .output(wallet(0), foo_amount + bar_amount - doublespend_payment + options.doublespend_fee)
        .fee(options.doublespend_fee)
        .build()?;

    // Two ordinary spends of the same coins on node 0's side
    let tx1 = TransactionBuilder::new()
        .input(foo)
        .output(wallet(1), Amount::from_coins(TX1_PAYMENT))
        .output(wallet(0), foo_amount - Amount::from_coins(TX1_PAYMENT) + spend_fee)
        .fee(spend_fee)
        .build()?;
    let tx2 = TransactionBuilder::new()
        .input(bar)
        .output(wallet(1), Amount::from_coins(TX2_PAYMENT))
        .output(wallet(0), bar_amount - Amount::from_coins(TX2_PAYMENT) + spend_fee)
        .fee(spend_fee)
        .build()?;
    let tx1_id = network.submit(0, tx1)?;
    let tx2_id = network.submit(0, tx2)?;

    if options.mine_block {
        network.mine(0)?;
    }

    let node0 = network.node(0)?;
    let tx1_confirmations_before = node0.confirmations(&tx1_id)?;
    let tx2_confirmations_before = node0.confirmations(&tx2_id)?;

    // The miner on the far side learns the raw spend and its parents
    network.submit(2, fund_foo)?;
    network.submit(2, fund_bar)?;
    let doublespend_id = network.submit(2, doublespend)?;
    network.mine(2)?;

    network.connect(1, 2)?;
    info!("network healed");
    network.mine(2)?;

    let node0 = network.node(0)?;
    let doublespend_confirmations = node0.confirmations(&doublespend_id)?;
    let tx1_confirmations = node0.confirmations(&tx1_id)?;
    let tx2_confirmations = node0.confirmations(&tx2_id)?;

    let balances = (0..network.peer_count())
        .map(|i| -> Result<NodeBalance, ScenarioError> {
            let node = network.node(i)?;
            Ok(NodeBalance {
                label: node.label().to_string(),
                address: wallet(i),
                confirmed_only: node.get_balance(&wallet(i), false),
                with_unconfirmed: node.get_balance(&wallet(i), true),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ScenarioReport {
        funded_balance,
        expected_funded_balance,
        tx1_confirmations_before,
        tx2_confirmations_before,
        doublespend: doublespend_id,
        doublespend_confirmations,
        tx1_confirmations,
        tx2_confirmations,
        balances,
        expected_node0_balance: start - doublespend_payment
            + fund_foo_fee
            + fund_bar_fee
            + options.doublespend_fee,
        expected_node1_balance: start + doublespend_payment,
    })
}
