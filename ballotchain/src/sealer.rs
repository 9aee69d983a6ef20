use crate::*;
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

enum Job {
    Seal(String),
    Flush(Sender<()>),
}

/// Background worker that mines blocks off the caller's thread.
///
/// Seal requests are processed in order. Dropping the sealer cancels any search in
/// progress and stops the worker; votes it had not sealed stay pending in the ledger.
pub struct Sealer {
    jobs: Mutex<Option<Sender<Job>>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Sealer {
    pub fn spawn<S: LedgerStore + 'static>(ledger: Arc<Ledger<S>>) -> Result<Self, Error> {
        let (jobs, queue) = channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = {
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("ballotchain-sealer".into())
                .spawn(move || run(ledger, queue, shutdown))?
        };

        Ok(Sealer {
            jobs: Mutex::new(Some(jobs)),
            shutdown,
            worker: Some(worker),
        })
    }

    /// Queue a seal of the poll's pending votes
    pub fn request(&self, poll_id: &str) -> Result<(), Error> {
        self.send(Job::Seal(poll_id.to_owned()))
    }

    /// Block until every request queued before this call has been processed
    pub fn flush(&self) -> Result<(), Error> {
        let (done, wait) = channel();
        self.send(Job::Flush(done))?;
        wait.recv().map_err(|_| Error::SealerStopped)
    }

    fn send(&self, job: Job) -> Result<(), Error> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        match jobs.as_ref() {
            Some(jobs) => jobs.send(job).map_err(|_| Error::SealerStopped),
            None => Err(Error::SealerStopped),
        }
    }
}

impl Drop for Sealer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("sealer worker panicked");
            }
        }
    }
}

fn run<S: LedgerStore>(ledger: Arc<Ledger<S>>, queue: Receiver<Job>, shutdown: Arc<AtomicBool>) {
    info!("sealer worker started");

    for job in queue.iter() {
        match job {
            Job::Seal(poll_id) => match ledger.seal_with_cancel(&poll_id, &shutdown) {
                Ok(Some(_)) => {}
                Ok(None) => debug!("nothing pending for poll {}", poll_id),
                Err(Error::MiningCancelled) => {
                    debug!("seal of poll {} cancelled by shutdown", poll_id)
                }
                Err(e) => error!("failed to seal poll {}: {}", poll_id, e),
            },
            Job::Flush(done) => {
                done.send(()).ok();
            }
        }
    }

    info!("sealer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(identifier: &str) -> VoteRecord {
        let token = derive_token(identifier, "p1");
        let envelope = Envelope {
            salt: vec![0; SALT_LENGTH],
            ciphertext: vec![42],
            length: 1,
        };
        UnsignedVote::new("p1", envelope, &token).sign(&token)
    }

    #[test]
    fn test_seal_in_background() {
        let ledger = Arc::new(Ledger::open(MemStore::default(), 2).unwrap());
        let sealer = Sealer::spawn(ledger.clone()).unwrap();

        ledger.append_pending("p1", record("alice"));
        ledger.append_pending("p1", record("bob"));
        sealer.request("p1").unwrap();
        sealer.request("p2").unwrap();
        sealer.flush().unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.votes_for("p1").len(), 2);
        assert_eq!(ledger.pending_count("p1"), 0);
        assert!(ledger.validate());
    }

    #[test]
    fn test_drop_stops_worker() {
        // Unreachable difficulty: the worker can only stop through cancellation
        let genesis = Ledger::open(MemStore::default(), 2).unwrap().blocks();
        let ledger = Arc::new(Ledger::open(MemStore::with_chain(genesis), 64).unwrap());

        let sealer = Sealer::spawn(ledger.clone()).unwrap();
        ledger.append_pending("p1", record("alice"));
        sealer.request("p1").unwrap();
        drop(sealer);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending_count("p1"), 1);
    }
}
