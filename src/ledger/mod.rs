// Ledger module - THE LOCAL HISTORY
// Transaction store, double-spend conflict sets, and best-chain depth

mod chain;
mod conflict;
mod store;

pub use chain::{Block, BlockUpdate, ChainError, ChainView, ReorgSummary};
pub use conflict::{ConflictTracker, Resolution, TrackOutcome};
pub use store::{LedgerEntry, LedgerError, LedgerStatistics, RegisterOutcome, TransactionLedger};
