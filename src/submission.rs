use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Opaque numeric value attached to a claim. Integers and floats are kept
/// exactly as submitted.
pub type Score = Number;

/// The payload of a proof-of-achievement claim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claim {
    /// Who performed the work.
    pub user_id: String,
    /// Free-form category of the work.
    pub task_type: String,
    pub description: String,
    /// Where the evidence can be inspected.
    pub evidence_link: String,
    /// Remark left by whoever validated the claim.
    pub validator_note: String,
    pub score: Score,
}

/// A claim waiting in the pending queue to be sealed into a block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Submission {
    /// Unique identifier assigned when the claim was queued.
    pub proof_id: String,
    #[serde(flatten)]
    pub claim: Claim,
}

impl Submission {
    /// Wrap a claim under a fresh random (v4) identifier.
    pub fn new(claim: Claim) -> Self {
        Self {
            proof_id: uuid::Uuid::new_v4().to_string(),
            claim,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_claim(user_id: &str, score: i64) -> Claim {
    Claim {
        user_id: user_id.to_string(),
        task_type: "code-review".to_string(),
        description: "Reviewed the storage refactor".to_string(),
        evidence_link: "https://example.org/pr/42".to_string(),
        validator_note: "looks good".to_string(),
        score: Number::from(score),
    }
}
