use super::*;
use std::fs;

#[test]
fn end_to_end_poll() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::from_vars(vec![
        (LEDGER_PATH_VAR, dir.path().join("blockchain.json").to_str().unwrap()),
        (DIFFICULTY_VAR, "2"),
        (SEAL_THRESHOLD_VAR, "3"),
    ])
    .unwrap();

    // Create the poll key pair; voters only ever see the public key
    let keys = PollKeyPair::generate();
    let poll_id = "favourite-colour";
    let options = ["Red", "Green", "Blue"];

    // Open a fresh ledger, which bootstraps a mined genesis block
    let ballot_box = BallotBox::open(FileStore::new(&config.ledger_path), &config).unwrap();
    assert_eq!(ballot_box.ledger().len(), 1);
    assert!(ballot_box.ledger().tip().unwrap().hash.starts_with("00"));

    // Cast votes
    let ballots = [
        ("alice@example.com", "Red"),
        ("bob@example.com", "Blue"),
        ("carol@example.com", "Red"),
        ("dave@example.com", "Green"),
        ("erin@example.com", "Red"),
    ];
    let mut receipts = Vec::new();
    for (voter, choice) in &ballots {
        let cast = ballot_box
            .cast_vote(poll_id, voter, choice, &keys.public_key)
            .unwrap();
        receipts.push(cast.receipt);
    }

    // Alice tries again
    assert!(matches!(
        ballot_box.cast_vote(poll_id, "alice@example.com", "Blue", &keys.public_key),
        Err(Error::AlreadyVoted(_))
    ));

    // Voting is over
    // ----------------

    let tally = ballot_box
        .close_poll(poll_id, &options, &keys.secret_key)
        .unwrap();
    assert_eq!(tally.results["Red"], 3);
    assert_eq!(tally.results["Green"], 1);
    assert_eq!(tally.results["Blue"], 1);
    assert_eq!(tally.total_votes, 5);
    assert_eq!(tally.rejected, 0);

    // Every voter can find their vote without revealing it
    for receipt in &receipts {
        assert!(ballot_box.verify_receipt(poll_id, receipt));
    }

    // The chain holds no voter identity
    let stats = ballot_box.ledger().stats();
    assert_eq!(stats.total_votes, 5);
    assert_eq!(stats.total_polls, 1);
    assert!(stats.is_valid);
    let file = fs::read_to_string(&config.ledger_path).unwrap();
    assert!(!file.contains("alice@example.com"));
    assert!(!file.contains(derive_token("alice@example.com", poll_id).as_str()));

    // Reopening sees the same chain
    drop(ballot_box);
    let reopened = Ledger::open(FileStore::new(&config.ledger_path), config.difficulty).unwrap();
    assert_eq!(reopened.stats(), stats);
    assert_eq!(reopened.votes_for(poll_id).len(), 5);
    for receipt in &receipts {
        assert!(verify_receipt(receipt, &reopened.votes_for(poll_id)));
    }
}

#[test]
fn tampered_ledger_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blockchain.json");
    let keys = PollKeyPair::from_secret("poll secret");

    let ledger = Ledger::open(FileStore::new(&path), 2).unwrap();
    let token = derive_token("alice", "p1");
    let envelope = encrypt_vote("Yes", &keys.public_key);
    let record = UnsignedVote::new("p1", envelope, &token).sign(&token);
    let receipt = generate_receipt(&record);
    ledger.append_pending("p1", record);
    ledger.seal("p1").unwrap().unwrap();
    drop(ledger);

    // Rewrite the stored vote's ciphertext
    let mut chain: Vec<Block> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    chain[1].votes[0].encrypted_vote.ciphertext[0] ^= 0x01;
    fs::write(&path, serde_json::to_vec(&chain).unwrap()).unwrap();

    let ledger = Ledger::open(FileStore::new(&path), 2).unwrap();
    assert!(!ledger.validate());
    assert!(!ledger.stats().is_valid);
    assert!(!verify_receipt(&receipt, &ledger.votes_for("p1")));

    // Diagnosis is left to the caller
    let blocks = ledger.blocks();
    assert_eq!(
        check_block(&blocks[1], Some(&blocks[0]), 2),
        Err(ValidationError::HashMismatch { index: 1 })
    );
}

#[test]
fn corrupt_ledger_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blockchain.json");
    fs::write(&path, "{ this is not a chain").unwrap();

    let ledger = Ledger::open(FileStore::new(&path), 2).unwrap();
    assert_eq!(ledger.len(), 1);
    assert!(ledger.tip().unwrap().is_genesis());
    assert!(ledger.validate());

    // The fresh genesis block replaced the corrupt file
    let stored: Vec<Block> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(stored, ledger.blocks());
}

#[test]
fn persisted_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blockchain.json.voters.json");

    let registry = VoterRegistry::new();
    registry.register("p1", &derive_token("alice", "p1"));
    write_json_atomic(&path, &registry.snapshot()).unwrap();

    let restored = VoterRegistry::restore(read_json(&path).unwrap().unwrap_or_default());
    assert!(restored.has_voted("p1", &derive_token("alice", "p1")));
    assert!(!restored.has_voted("p1", &derive_token("bob", "p1")));
}

#[test]
fn locked_writers_share_one_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("blockchain.json"));
    let voters = ["alice", "bob", "carol", "dave"];

    // Each thread stands in for a separate CLI process: open, append, seal, save
    let handles: Vec<_> = voters
        .iter()
        .map(|voter| {
            let (store, voter) = (store.clone(), voter.to_string());
            std::thread::spawn(move || {
                let _lock = store.lock().unwrap();
                let ledger = Ledger::open(store, 1).unwrap();
                let token = derive_token(&voter, "p1");
                let envelope = Envelope {
                    salt: vec![1; SALT_LENGTH],
                    ciphertext: voter.as_bytes().to_vec(),
                    length: voter.len(),
                };
                let record = UnsignedVote::new("p1", envelope, &token).sign(&token);
                ledger.append_pending("p1", record);
                ledger.seal("p1").unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let ledger = Ledger::open(store, 1).unwrap();
    assert!(ledger.validate());
    assert_eq!(ledger.len(), voters.len() + 1);
    assert_eq!(ledger.votes_for("p1").len(), voters.len());
}
