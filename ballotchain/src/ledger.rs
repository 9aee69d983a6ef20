use crate::*;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Summary of the committed chain
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerStats {
    pub total_blocks: usize,
    pub total_votes: usize,
    pub total_polls: usize,
    pub is_valid: bool,
    pub tip_hash: String,
}

/// Append-only, hash-linked chain of vote blocks with a per-poll pending pool.
///
/// There is exactly one writer: seals are serialized, and each one persists the whole
/// chain through the store before the new block becomes visible.
pub struct Ledger<S: LedgerStore> {
    store: S,
    difficulty: usize,
    mining_limit: Option<u64>,
    chain: RwLock<Vec<Block>>,
    pending: Mutex<HashMap<String, Vec<VoteRecord>>>,
    sealing: Mutex<()>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Load the chain from `store`, bootstrapping a mined genesis block if there is none
    /// or the stored chain cannot be read.
    pub fn open(store: S, difficulty: usize) -> Result<Self, Error> {
        Self::open_with_limit(store, difficulty, None)
    }

    /// Like `open`, bounding every nonce search to `mining_limit` attempts.
    ///
    /// Fails with `Error::Config` for a difficulty above `MAX_DIFFICULTY` or a zero limit.
    pub fn open_with_limit(
        store: S,
        difficulty: usize,
        mining_limit: Option<u64>,
    ) -> Result<Self, Error> {
        check_mining_params(difficulty, mining_limit)?;

        let chain = match store.load() {
            Ok(Some(chain)) if !chain.is_empty() => {
                debug!("loaded ledger with {} blocks", chain.len());
                chain
            }
            Ok(_) => {
                info!("no ledger found, bootstrapping genesis block");
                bootstrap(&store, difficulty, mining_limit)?
            }
            Err(e) => {
                warn!("ledger unreadable ({}), bootstrapping genesis block", e);
                bootstrap(&store, difficulty, mining_limit)?
            }
        };

        Ok(Ledger {
            store,
            difficulty,
            mining_limit,
            chain: RwLock::new(chain),
            pending: Mutex::new(HashMap::new()),
            sealing: Mutex::new(()),
        })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queue a vote for the next block of its poll
    pub fn append_pending(&self, poll_id: &str, record: VoteRecord) {
        self.pending()
            .entry(poll_id.to_owned())
            .or_default()
            .push(record);
    }

    /// Number of votes waiting to be sealed for a poll
    pub fn pending_count(&self, poll_id: &str) -> usize {
        self.pending().get(poll_id).map_or(0, Vec::len)
    }

    /// Seal the poll's pending votes into a new mined block.
    ///
    /// Returns `None` when nothing is pending.
    pub fn seal(&self, poll_id: &str) -> Result<Option<Block>, Error> {
        self.seal_with_cancel(poll_id, &AtomicBool::new(false))
    }

    /// Seal, aborting the nonce search once `cancel` is set.
    ///
    /// If mining or persistence fails the pending votes are left untouched.
    pub fn seal_with_cancel(
        &self,
        poll_id: &str,
        cancel: &AtomicBool,
    ) -> Result<Option<Block>, Error> {
        let _sealing = self.sealing.lock().unwrap_or_else(PoisonError::into_inner);

        let votes = match self.pending().get(poll_id) {
            Some(votes) if !votes.is_empty() => votes.clone(),
            _ => return Ok(None),
        };
        let sealed_count = votes.len();

        let (index, previous_hash) = {
            let chain = self.chain();
            let previous_hash = chain
                .last()
                .map(|block| block.hash.clone())
                .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_owned());
            (chain.len() as u64, previous_hash)
        };

        let mut block = Block::new(index, timestamp(), votes, &previous_hash, poll_id);
        block.mine(self.difficulty, self.mining_limit, cancel)?;

        {
            let mut chain = self.chain_mut();
            chain.push(block.clone());
            if let Err(e) = self.store.save(&chain) {
                chain.pop();
                return Err(e);
            }

            // Votes appended while mining stay pending for the next block
            if let Some(pending) = self.pending().get_mut(poll_id) {
                pending.drain(..sealed_count);
            }
        }

        info!(
            "sealed block {} for poll {} with {} votes (nonce {})",
            block.index,
            poll_id,
            block.votes.len(),
            block.nonce
        );

        Ok(Some(block))
    }

    /// Committed votes for a poll, in chain order
    pub fn votes_for(&self, poll_id: &str) -> Vec<VoteRecord> {
        self.chain()
            .iter()
            .filter(|block| block.poll_id == poll_id)
            .flat_map(|block| block.votes.iter().cloned())
            .collect()
    }

    /// Check every block's hash, linkage and proof-of-work.
    ///
    /// The genesis block is held to the same hash and proof-of-work checks as every other
    /// block, so a chain whose genesis was mined at a lower difficulty is invalid here.
    pub fn validate(&self) -> bool {
        validate_chain(&self.chain(), self.difficulty)
    }

    pub fn stats(&self) -> LedgerStats {
        let chain = self.chain();
        let polls: HashSet<&str> = chain
            .iter()
            .map(|block| block.poll_id.as_str())
            .filter(|poll_id| *poll_id != GENESIS_POLL_ID)
            .collect();

        LedgerStats {
            total_blocks: chain.len(),
            total_votes: chain.iter().map(|block| block.votes.len()).sum(),
            total_polls: polls.len(),
            is_valid: validate_chain(&chain, self.difficulty),
            tip_hash: chain
                .last()
                .map(|block| block.hash.clone())
                .unwrap_or_default(),
        }
    }

    /// Snapshot of the whole chain
    pub fn blocks(&self) -> Vec<Block> {
        self.chain().clone()
    }

    pub fn len(&self) -> usize {
        self.chain().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain().is_empty()
    }

    /// The most recent block
    pub fn tip(&self) -> Option<Block> {
        self.chain().last().cloned()
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.chain().iter().find(|block| block.hash == hash).cloned()
    }

    fn chain(&self) -> RwLockReadGuard<'_, Vec<Block>> {
        self.chain.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn chain_mut(&self) -> RwLockWriteGuard<'_, Vec<Block>> {
        self.chain.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, Vec<VoteRecord>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn bootstrap<S: LedgerStore>(
    store: &S,
    difficulty: usize,
    mining_limit: Option<u64>,
) -> Result<Vec<Block>, Error> {
    let mut genesis = Block::genesis(timestamp());
    genesis.mine(difficulty, mining_limit, &AtomicBool::new(false))?;

    let chain = vec![genesis];
    store.save(&chain)?;
    Ok(chain)
}

/// Check a single block against its predecessor (`None` for genesis)
pub fn check_block(
    block: &Block,
    previous: Option<&Block>,
    difficulty: usize,
) -> Result<(), ValidationError> {
    let index = block.index;

    if block.hash != block.calculate_hash() {
        return Err(ValidationError::HashMismatch { index });
    }

    match previous {
        Some(previous) => {
            if previous.index.checked_add(1) != Some(index) {
                return Err(ValidationError::IndexGap { index });
            }
            if block.previous_hash != previous.hash {
                return Err(ValidationError::BrokenLink { index });
            }
        }
        None if index != 0 => return Err(ValidationError::IndexGap { index }),
        None => {}
    }

    if !block.meets_difficulty(difficulty) {
        return Err(ValidationError::InsufficientWork { index });
    }

    Ok(())
}

/// Whether every block of `chain` passes `check_block`
pub fn validate_chain(chain: &[Block], difficulty: usize) -> bool {
    chain.iter().enumerate().all(|(i, block)| {
        let previous = i.checked_sub(1).map(|p| &chain[p]);
        check_block(block, previous, difficulty).is_ok()
    })
}
