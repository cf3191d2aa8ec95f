//! Wallet-side transaction ledger: double-spend conflict tracking, signed
//! confirmation depths and balance accounting across network partitions.

pub mod ledger;
pub mod node;
pub mod sync;
pub mod tx;
pub mod wallet;
