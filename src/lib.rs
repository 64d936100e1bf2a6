//! ProofSync: an append-only, proof-of-work sealed ledger of
//! user-submitted achievement claims.

pub mod block;
pub mod config;
pub mod digest;
pub mod error;
pub mod explorer;
pub mod http;
pub mod ledger;
pub mod pow;
pub mod queue;
pub mod store;
pub mod submission;
pub mod telemetry;

pub use block::Block;
pub use error::{LedgerError, RejectReason, StoreError};
pub use ledger::{verify_chain, Ledger, LedgerOptions, MineOutcome, MiningJob};
pub use store::{ChainStore, JsonFileStore, MemoryStore};
pub use submission::{Claim, Submission};
