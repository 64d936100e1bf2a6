use std::path::PathBuf;

use thiserror::Error;

use crate::ledger::ChainFault;

/// Failures reading or writing the persisted chain.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read chain store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write chain store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("chain store {path} is not a valid block list: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode chain: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a candidate block was refused by the chain extension protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("block index {found} is not the next index {expected}")]
    IndexMismatch { expected: u64, found: u64 },
    #[error("previous hash {found} does not match tail hash {expected}")]
    ParentMismatch { expected: String, found: String },
    #[error("hash {hash} does not start with {difficulty} zeros")]
    DifficultyNotMet { difficulty: usize, hash: String },
    #[error("claimed hash {claimed} does not match recomputed {computed}")]
    DigestMismatch { claimed: String, computed: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("chain extension rejected: {0}")]
    Rejected(#[from] RejectReason),
    #[error("pending queue is full ({capacity} submissions)")]
    QueueFull { capacity: usize },
    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),
    #[error("stored chain failed verification with {} fault(s)", .faults.len())]
    CorruptChain { faults: Vec<ChainFault> },
    #[error("difficulty {0} exceeds the 64 hex digits of a sha256 digest")]
    InvalidDifficulty(usize),
}
