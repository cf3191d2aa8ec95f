// Wallet module - WHAT YOU OWN
// Balance derivation and transaction queries over the local ledger

mod balance;

pub use balance::{BalanceBreakdown, BalanceEngine, TransactionDetails};
