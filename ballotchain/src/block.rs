use crate::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Poll id of block 0
pub const GENESIS_POLL_ID: &str = "genesis";

/// `previous_hash` of block 0
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Leading zero hex digits required of a block hash
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Hex digits in a SHA-256 digest; no hash can meet a higher difficulty
pub const MAX_DIFFICULTY: usize = 64;

// Nonces tried between checks of the cancellation flag
const MINING_BATCH: u64 = 4096;

/// A sealed batch of votes for one poll.
///
/// `hash` commits to every other field, `nonce` included.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub votes: Vec<VoteRecord>,
    pub previous_hash: String,
    pub poll_id: String,
    pub nonce: u64,
    pub hash: String,
}

/// Outcome of a bounded nonce search
#[derive(Debug, Clone, PartialEq)]
pub enum Search {
    Found { nonce: u64, hash: String },
    Exhausted { next_nonce: u64 },
}

impl Block {
    /// Create an unmined block with `nonce = 0`
    pub fn new(
        index: u64,
        timestamp: f64,
        votes: Vec<VoteRecord>,
        previous_hash: &str,
        poll_id: &str,
    ) -> Self {
        let mut block = Block {
            index,
            timestamp,
            votes,
            previous_hash: previous_hash.to_owned(),
            poll_id: poll_id.to_owned(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Create an unmined genesis block
    pub fn genesis(timestamp: f64) -> Self {
        Block::new(0, timestamp, vec![], GENESIS_PREVIOUS_HASH, GENESIS_POLL_ID)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Recompute the hash from the stored fields
    pub fn calculate_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    /// Hash of this block as if it carried `nonce`
    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        let payload = BlockPayload {
            index: self.index,
            nonce,
            poll_id: &self.poll_id,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            votes: self.votes.iter().map(VoteRecord::payload).collect(),
        };
        sha256_hex(&canonical_bytes(&payload))
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Search for a nonce meeting `difficulty`, starting from the current nonce.
    ///
    /// `limit` bounds the number of nonces tried; `cancel` is polled between batches.
    /// On error the block keeps the last nonce tried, so the search can be resumed.
    pub fn mine(
        &mut self,
        difficulty: usize,
        limit: Option<u64>,
        cancel: &AtomicBool,
    ) -> Result<(), Error> {
        let mut attempts: u64 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                self.hash = self.calculate_hash();
                return Err(Error::MiningCancelled);
            }

            let budget = match limit {
                Some(limit) if attempts >= limit => {
                    self.hash = self.calculate_hash();
                    return Err(Error::MiningExhausted { attempts });
                }
                Some(limit) => MINING_BATCH.min(limit - attempts),
                None => MINING_BATCH,
            };

            match find_nonce(self, self.nonce, difficulty, budget) {
                Search::Found { nonce, hash } => {
                    self.nonce = nonce;
                    self.hash = hash;
                    return Ok(());
                }
                Search::Exhausted { next_nonce } => {
                    self.nonce = next_nonce;
                    attempts += budget;
                }
            }
        }
    }
}

/// Reject mining parameters under which no block could ever be sealed
pub fn check_mining_params(difficulty: usize, limit: Option<u64>) -> Result<(), Error> {
    if difficulty > MAX_DIFFICULTY {
        return Err(Error::Config(format!(
            "difficulty must be at most {}, got {}",
            MAX_DIFFICULTY, difficulty
        )));
    }
    if limit == Some(0) {
        return Err(Error::Config("mining attempt limit must be positive".into()));
    }
    Ok(())
}

/// Whether `hash` starts with `difficulty` zero hex digits
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Try at most `budget` nonces from `start`, in order. Pure and restartable.
pub fn find_nonce(block: &Block, start: u64, difficulty: usize, budget: u64) -> Search {
    let mut nonce = start;
    for _ in 0..budget {
        let hash = block.hash_with_nonce(nonce);
        if meets_difficulty(&hash, difficulty) {
            return Search::Found { nonce, hash };
        }
        nonce = nonce.wrapping_add(1);
    }
    Search::Exhausted { next_nonce: nonce }
}

#[derive(Serialize)]
struct BlockPayload<'a> {
    index: u64,
    nonce: u64,
    poll_id: &'a str,
    previous_hash: &'a str,
    timestamp: f64,
    votes: Vec<RecordPayload<'a>>,
}
