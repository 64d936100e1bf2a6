//! Proof-of-work nonce search.

use tracing::debug;

use crate::block::Block;
use crate::digest::meets_difficulty;

/// Find the smallest nonce, counting up from 0, whose digest starts with
/// `difficulty` zeros. Leaves that nonce in `block` and returns the digest.
///
/// The search has no upper bound and blocks the caller until it succeeds.
pub fn search(block: &mut Block, difficulty: usize) -> String {
    block.nonce = 0;
    let mut hashed = block.compute_hash();
    while !meets_difficulty(&hashed, difficulty) {
        block.nonce += 1;
        hashed = block.compute_hash();
    }
    debug!(index = block.index, nonce = block.nonce, difficulty, "nonce found");
    hashed
}
