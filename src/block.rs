use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::digest::digest_fields;
use crate::submission::{Score, Submission};

/// `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Represents one sealed entry of the ledger.
///
/// Field order here is the order of the persisted JSON records. The digest
/// does not depend on it, see [`Block::compute_hash`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Block {
    /// Position in the chain, 0 for genesis.
    pub index: u64,
    /// Seconds since the Unix epoch at seal time.
    pub timestamp: f64,
    pub proof_id: String,
    pub user_id: String,
    pub task_type: String,
    pub description: String,
    pub evidence_link: String,
    pub validator_note: String,
    pub score: Score,
    /// Hash of the tail block when this one was sealed.
    pub previous_hash: String,
    /// Proof-of-work solution.
    pub nonce: u64,
    /// Digest of every other field.
    pub hash: String,
}

impl Block {
    /// Build an unsealed candidate from a pending submission. `nonce` starts
    /// at 0 and `hash` is the digest for that nonce.
    pub fn candidate(index: u64, timestamp: f64, submission: &Submission, previous_hash: String) -> Self {
        let claim = &submission.claim;
        let mut block = Block {
            index,
            timestamp,
            proof_id: submission.proof_id.clone(),
            user_id: claim.user_id.clone(),
            task_type: claim.task_type.clone(),
            description: claim.description.clone(),
            evidence_link: claim.evidence_link.clone(),
            validator_note: claim.validator_note.clone(),
            score: claim.score.clone(),
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The fixed synthetic first block.
    pub fn genesis(timestamp: f64) -> Self {
        let mut block = Block {
            index: 0,
            timestamp,
            proof_id: "GENESIS".to_string(),
            user_id: "SYSTEM".to_string(),
            task_type: "init".to_string(),
            description: "Genesis Block".to_string(),
            evidence_link: "N/A".to_string(),
            validator_note: "System Init".to_string(),
            score: Score::from(10),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Every field except `hash`, as canonical digest input.
    fn hashed_fields(&self) -> [(&'static str, Value); 11] {
        [
            ("description", Value::from(self.description.as_str())),
            ("evidence_link", Value::from(self.evidence_link.as_str())),
            ("index", Value::from(self.index)),
            ("nonce", Value::from(self.nonce)),
            ("previous_hash", Value::from(self.previous_hash.as_str())),
            ("proof_id", Value::from(self.proof_id.as_str())),
            ("score", Value::Number(self.score.clone())),
            ("task_type", Value::from(self.task_type.as_str())),
            ("timestamp", Value::from(self.timestamp)),
            ("user_id", Value::from(self.user_id.as_str())),
            ("validator_note", Value::from(self.validator_note.as_str())),
        ]
    }

    /// Recompute the digest over the current field values, ignoring `hash`.
    pub fn compute_hash(&self) -> String {
        digest_fields(&self.hashed_fields())
    }
}
