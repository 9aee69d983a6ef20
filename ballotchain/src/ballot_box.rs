use crate::*;
use indexmap::IndexMap;
use log::{debug, warn};
use std::sync::Arc;

/// What a voter gets back for an accepted vote
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CastVote {
    pub receipt: String,

    /// Short reference to the vote: the first 16 hex characters of its signature
    pub vote_hash: String,
}

/// Result of closing a poll
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tally {
    pub poll_id: String,

    /// Count per option, in the order the options were given
    pub results: IndexMap<String, u64>,
    pub total_votes: u64,

    /// Committed votes that could not be decrypted or named no known option
    pub rejected: u64,
}

/// Admits votes, seals them into the ledger and tallies closed polls.
///
/// Admission is atomic per voter: the registry check and insert happen together, so
/// concurrent casts for the same identifier admit exactly one vote.
pub struct BallotBox<S: LedgerStore + 'static> {
    sealer: Sealer,
    ledger: Arc<Ledger<S>>,
    registry: VoterRegistry,
    seal_threshold: usize,
}

impl<S: LedgerStore + 'static> BallotBox<S> {
    pub fn new(
        ledger: Ledger<S>,
        registry: VoterRegistry,
        seal_threshold: usize,
    ) -> Result<Self, Error> {
        let ledger = Arc::new(ledger);
        Ok(BallotBox {
            sealer: Sealer::spawn(ledger.clone())?,
            ledger,
            registry,
            seal_threshold: seal_threshold.max(1),
        })
    }

    /// Open the ledger in `store` with the configured difficulty and an empty registry
    pub fn open(store: S, config: &Config) -> Result<Self, Error> {
        let ledger = Ledger::open_with_limit(store, config.difficulty, config.max_mining_attempts)?;
        Self::new(ledger, VoterRegistry::new(), config.seal_threshold)
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn registry(&self) -> &VoterRegistry {
        &self.registry
    }

    /// Encrypt, sign and queue a vote, refusing a second vote from the same voter.
    ///
    /// Once the poll has `seal_threshold` pending votes a seal is queued on the sealer.
    pub fn cast_vote(
        &self,
        poll_id: &str,
        identifier: &str,
        choice: &str,
        public_key: &str,
    ) -> Result<CastVote, Error> {
        let token = derive_token(identifier, poll_id);
        let admission = match Admission::register(&self.registry, poll_id, &token) {
            Some(admission) => admission,
            None => {
                warn!("rejected double vote in poll {} ({})", poll_id, token.partial());
                return Err(Error::AlreadyVoted(poll_id.to_owned()));
            }
        };

        let envelope = encrypt_vote(choice, public_key);
        let record = UnsignedVote::new(poll_id, envelope, &token).sign(&token);

        let cast = CastVote {
            receipt: generate_receipt(&record),
            vote_hash: record.signature.chars().take(TOKEN_PARTIAL_LENGTH).collect(),
        };

        self.ledger.append_pending(poll_id, record);
        admission.commit();

        if self.ledger.pending_count(poll_id) >= self.seal_threshold {
            if let Err(e) = self.sealer.request(poll_id) {
                // The vote stays pending and is sealed on close
                warn!("could not queue seal for poll {}: {}", poll_id, e);
            }
        }

        Ok(cast)
    }

    /// Wait for queued seals, then seal whatever is still pending for the poll
    pub fn seal_pending(&self, poll_id: &str) -> Result<Option<Block>, Error> {
        self.sealer.flush()?;
        self.ledger.seal(poll_id)
    }

    /// Seal outstanding votes and count every committed vote for the poll.
    ///
    /// Votes that fail to decrypt or name an unknown option are skipped and counted as
    /// rejected. Options with no votes are kept with a zero count.
    pub fn close_poll<O: AsRef<str>>(
        &self,
        poll_id: &str,
        options: &[O],
        secret_key: &str,
    ) -> Result<Tally, Error> {
        self.seal_pending(poll_id)?;

        let mut tally = Tally {
            poll_id: poll_id.to_owned(),
            results: options
                .iter()
                .map(|option| (option.as_ref().to_owned(), 0))
                .collect(),
            total_votes: 0,
            rejected: 0,
        };

        for record in self.ledger.votes_for(poll_id) {
            let choice = match decrypt_vote(&record.encrypted_vote, secret_key) {
                Ok(choice) => choice,
                Err(e) => {
                    warn!("skipping vote {} in poll {}: {}", short(&record), poll_id, e);
                    tally.rejected += 1;
                    continue;
                }
            };

            match tally.results.get_mut(&choice) {
                Some(count) => {
                    *count += 1;
                    tally.total_votes += 1;
                }
                None => {
                    warn!("skipping vote {} in poll {}: unknown option", short(&record), poll_id);
                    tally.rejected += 1;
                }
            }
        }

        debug!(
            "closed poll {}: {} votes counted, {} rejected",
            poll_id, tally.total_votes, tally.rejected
        );

        Ok(tally)
    }

    /// Check a receipt against the poll's committed votes
    pub fn verify_receipt(&self, poll_id: &str, receipt: &str) -> bool {
        verify_receipt(receipt, &self.ledger.votes_for(poll_id))
    }
}

fn short(record: &VoteRecord) -> &str {
    record.signature.get(..TOKEN_PARTIAL_LENGTH).unwrap_or(&record.signature)
}

/// A registry entry that is withdrawn unless the vote it admits is recorded
struct Admission<'a> {
    registry: &'a VoterRegistry,
    poll_id: &'a str,
    token: &'a VoterToken,
    committed: bool,
}

impl<'a> Admission<'a> {
    fn register(
        registry: &'a VoterRegistry,
        poll_id: &'a str,
        token: &'a VoterToken,
    ) -> Option<Self> {
        if registry.register_if_absent(poll_id, token) {
            Some(Admission {
                registry,
                poll_id,
                token,
                committed: false,
            })
        } else {
            None
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.unregister(self.poll_id, self.token);
        }
    }
}
