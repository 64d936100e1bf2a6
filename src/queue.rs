use std::collections::VecDeque;

use crate::error::LedgerError;
use crate::submission::{Claim, Submission};

/// FIFO holding area for claims waiting to be mined.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<Submission>,
    capacity: Option<usize>,
}

impl PendingQueue {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Queue a claim under a fresh proof id and return that id. Only fails
    /// when a capacity was configured and is reached.
    pub fn enqueue(&mut self, claim: Claim) -> Result<String, LedgerError> {
        if let Some(capacity) = self.capacity {
            if self.items.len() >= capacity {
                return Err(LedgerError::QueueFull { capacity });
            }
        }
        let submission = Submission::new(claim);
        let proof_id = submission.proof_id.clone();
        self.items.push_back(submission);
        Ok(proof_id)
    }

    /// Remove the oldest submission, `None` when nothing is pending.
    pub fn dequeue(&mut self) -> Option<Submission> {
        self.items.pop_front()
    }

    /// Put a submission back at the head, ahead of everything queued after it.
    /// Ignores the capacity bound since the slot was already accounted for.
    pub fn requeue_front(&mut self, submission: Submission) {
        self.items.push_front(submission);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pending submissions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Submission> {
        self.items.iter()
    }
}
