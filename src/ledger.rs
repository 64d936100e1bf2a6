//! The ledger engine: owns the chain and the pending queue, seals claims
//! through proof-of-work and guards every append.

use std::fmt;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::digest::{meets_difficulty, DIGEST_HEX_LEN};
use crate::error::{LedgerError, RejectReason};
use crate::pow;
use crate::queue::PendingQueue;
use crate::store::ChainStore;
use crate::submission::{Claim, Submission};

pub const DEFAULT_DIFFICULTY: usize = 3;

#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// Leading zero hex digits required of every mined block.
    pub difficulty: usize,
    /// Upper bound on pending submissions, unbounded when `None`.
    pub max_pending: Option<usize>,
    /// Refuse to open a stored chain that fails [`verify_chain`].
    pub verify_on_load: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_pending: None,
            verify_on_load: false,
        }
    }
}

/// Result of one mining cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineOutcome {
    /// A block was sealed and appended at this index.
    Mined(u64),
    /// Nothing was pending.
    Empty,
}

/// One integrity problem found in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainFault {
    /// Position in the block list where the problem was found.
    pub position: usize,
    pub kind: FaultKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "fault")]
pub enum FaultKind {
    EmptyChain,
    IndexGap { found: u64 },
    GenesisParent { found: String },
    BrokenLink { expected: String, found: String },
    HashMismatch { stored: String, computed: String },
    DifficultyNotMet { hash: String },
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FaultKind::EmptyChain => write!(f, "chain has no genesis block"),
            FaultKind::IndexGap { found } => {
                write!(f, "block at position {} has index {}", self.position, found)
            }
            FaultKind::GenesisParent { found } => {
                write!(f, "genesis previous_hash is {found:?}, expected \"0\"")
            }
            FaultKind::BrokenLink { expected, found } => write!(
                f,
                "block {} previous_hash {} does not match {}",
                self.position, found, expected
            ),
            FaultKind::HashMismatch { stored, computed } => write!(
                f,
                "block {} stored hash {} differs from recomputed {}",
                self.position, stored, computed
            ),
            FaultKind::DifficultyNotMet { hash } => {
                write!(f, "block {} hash {} misses the difficulty target", self.position, hash)
            }
        }
    }
}

/// Check linkage, index contiguity, digests and proof-of-work of a whole
/// chain. An empty result means the chain is valid. Genesis is exempt from
/// the difficulty target.
pub fn verify_chain(blocks: &[Block], difficulty: usize) -> Vec<ChainFault> {
    let mut faults = Vec::new();
    let fault = |position: usize, kind: FaultKind| ChainFault { position, kind };

    if blocks.is_empty() {
        faults.push(fault(0, FaultKind::EmptyChain));
        return faults;
    }

    for (position, block) in blocks.iter().enumerate() {
        if block.index != position as u64 {
            faults.push(fault(position, FaultKind::IndexGap { found: block.index }));
        }

        if position == 0 {
            if block.previous_hash != GENESIS_PREVIOUS_HASH {
                faults.push(fault(
                    position,
                    FaultKind::GenesisParent {
                        found: block.previous_hash.clone(),
                    },
                ));
            }
        } else {
            let parent = &blocks[position - 1];
            if block.previous_hash != parent.hash {
                faults.push(fault(
                    position,
                    FaultKind::BrokenLink {
                        expected: parent.hash.clone(),
                        found: block.previous_hash.clone(),
                    },
                ));
            }
            if !meets_difficulty(&block.hash, difficulty) {
                faults.push(fault(
                    position,
                    FaultKind::DifficultyNotMet {
                        hash: block.hash.clone(),
                    },
                ));
            }
        }

        let computed = block.compute_hash();
        if computed != block.hash {
            faults.push(fault(
                position,
                FaultKind::HashMismatch {
                    stored: block.hash.clone(),
                    computed,
                },
            ));
        }
    }
    faults
}

fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// A dequeued claim and the block being sealed for it.
#[derive(Debug)]
pub struct MiningJob {
    submission: Submission,
    block: Block,
    proof: String,
}

impl MiningJob {
    /// Run the nonce search. CPU-bound and unbounded.
    pub fn seal(&mut self, difficulty: usize) {
        let started = Instant::now();
        self.proof = pow::search(&mut self.block, difficulty);
        self.block.hash = self.proof.clone();
        debug!(
            index = self.block.index,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "block sealed"
        );
    }

    pub fn proof_id(&self) -> &str {
        &self.submission.proof_id
    }
}

/// Owns the chain and the pending queue. Not internally synchronized:
/// callers sharing a ledger put it behind a single lock.
pub struct Ledger {
    chain: Vec<Block>,
    queue: PendingQueue,
    store: Box<dyn ChainStore>,
    difficulty: usize,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("length", &self.chain.len())
            .field("pending", &self.queue.len())
            .field("difficulty", &self.difficulty)
            .finish()
    }
}

impl Ledger {
    /// Load the chain from `store`, or start a new one from genesis and
    /// persist it right away.
    pub fn open(store: impl ChainStore + 'static, options: LedgerOptions) -> Result<Self, LedgerError> {
        if options.difficulty > DIGEST_HEX_LEN {
            return Err(LedgerError::InvalidDifficulty(options.difficulty));
        }
        let mut store: Box<dyn ChainStore> = Box::new(store);

        let chain = match store.load()? {
            Some(chain) if chain.is_empty() && options.verify_on_load => {
                return Err(LedgerError::CorruptChain {
                    faults: verify_chain(&chain, options.difficulty),
                });
            }
            Some(chain) if !chain.is_empty() => {
                let faults = verify_chain(&chain, options.difficulty);
                if !faults.is_empty() {
                    for f in &faults {
                        warn!(position = f.position, "stored chain fault: {}", f);
                    }
                    if options.verify_on_load {
                        return Err(LedgerError::CorruptChain { faults });
                    }
                }
                info!(length = chain.len(), "loaded chain");
                chain
            }
            // Nothing stored yet, or an empty block list.
            _ => {
                let chain = vec![Block::genesis(now_seconds())];
                store.save(&chain)?;
                info!(hash = %chain[0].hash, "initialized chain with genesis block");
                chain
            }
        };

        Ok(Self {
            chain,
            queue: PendingQueue::new(options.max_pending),
            store,
            difficulty: options.difficulty,
        })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Read-only view of the chain, genesis first.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.chain.get(i))
    }

    /// The current tail. A ledger always holds at least genesis.
    pub fn last_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Pending submissions, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Submission> {
        self.queue.iter()
    }

    /// Queue a claim for mining and return its proof id.
    pub fn submit(&mut self, claim: Claim) -> Result<String, LedgerError> {
        let proof_id = self.queue.enqueue(claim)?;
        info!(%proof_id, pending = self.queue.len(), "claim submitted");
        Ok(proof_id)
    }

    /// Seal the oldest pending claim into a new block.
    ///
    /// If the block is rejected or cannot be persisted, the claim goes back
    /// to the head of the queue and the error is returned.
    pub fn mine(&mut self) -> Result<MineOutcome, LedgerError> {
        let Some(mut job) = self.next_job() else {
            debug!("nothing to mine");
            return Ok(MineOutcome::Empty);
        };
        job.seal(self.difficulty);
        self.commit(job).map(MineOutcome::Mined)
    }

    /// Dequeue the oldest claim and build its unsealed block on top of the
    /// current tail. The job can be sealed without holding the ledger and
    /// must then be handed to [`Ledger::commit`].
    pub fn next_job(&mut self) -> Option<MiningJob> {
        let submission = self.queue.dequeue()?;
        let block = Block::candidate(
            self.chain.len() as u64,
            now_seconds(),
            &submission,
            self.last_block().hash.clone(),
        );
        Some(MiningJob {
            submission,
            block,
            proof: String::new(),
        })
    }

    /// Append a sealed job. On any failure its claim returns to the head of
    /// the queue.
    pub fn commit(&mut self, job: MiningJob) -> Result<u64, LedgerError> {
        let MiningJob {
            submission,
            block,
            proof,
        } = job;
        match self.append(block, &proof) {
            Ok(index) => {
                info!(index, proof_id = %submission.proof_id, "block mined");
                Ok(index)
            }
            Err(err) => {
                warn!(proof_id = %submission.proof_id, "mining failed, claim requeued: {}", err);
                self.queue.requeue_front(submission);
                Err(err)
            }
        }
    }

    /// Extend the chain with a sealed block whose digest is claimed to be
    /// `proof`. The block is persisted before this returns; on any failure
    /// the chain is left as it was.
    pub fn append(&mut self, block: Block, proof: &str) -> Result<u64, LedgerError> {
        let next_index = self.chain.len() as u64;
        if block.index != next_index {
            return Err(RejectReason::IndexMismatch {
                expected: next_index,
                found: block.index,
            }
            .into());
        }
        let tail_hash = &self.last_block().hash;
        if block.previous_hash != *tail_hash {
            return Err(RejectReason::ParentMismatch {
                expected: tail_hash.clone(),
                found: block.previous_hash,
            }
            .into());
        }
        if !meets_difficulty(proof, self.difficulty) {
            return Err(RejectReason::DifficultyNotMet {
                difficulty: self.difficulty,
                hash: proof.to_string(),
            }
            .into());
        }
        let computed = block.compute_hash();
        if proof != computed {
            return Err(RejectReason::DigestMismatch {
                claimed: proof.to_string(),
                computed,
            }
            .into());
        }

        let index = block.index;
        self.chain.push(block);
        if let Err(err) = self.store.save(&self.chain) {
            error!(index, "failed to persist chain: {}", err);
            self.chain.pop();
            return Err(err.into());
        }
        Ok(index)
    }

    /// Run [`verify_chain`] over the current chain.
    pub fn audit(&self) -> Vec<ChainFault> {
        verify_chain(&self.chain, self.difficulty)
    }
}
