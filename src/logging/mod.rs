//! Run-scoped evidence logging.

pub mod ledger;
pub mod sink;

pub use ledger::{escape_csv, LEDGER_HEADER};
pub use sink::{EvidenceLog, LogListener};
