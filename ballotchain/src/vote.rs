use crate::*;
use std::fmt;

/// Number of token hex characters kept on a vote record for auditing
pub const TOKEN_PARTIAL_LENGTH: usize = 16;

/// One-way voter pseudonym: `hex(SHA-256(identifier ":" poll_id))`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct VoterToken(String);

impl VoterToken {
    pub fn derive(identifier: &str, poll_id: &str) -> Self {
        VoterToken(sha256_hex(format!("{}:{}", identifier, poll_id).as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated token stored on the vote record. Not enough to re-derive the token.
    pub fn partial(&self) -> String {
        self.0.chars().take(TOKEN_PARTIAL_LENGTH).collect()
    }
}

impl fmt::Display for VoterToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the voter token for an identifier in a poll
pub fn derive_token(identifier: &str, poll_id: &str) -> VoterToken {
    VoterToken::derive(identifier, poll_id)
}

/// A vote record before it has been signed
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UnsignedVote {
    pub poll_id: String,
    pub encrypted_vote: Envelope,
    pub timestamp: f64,
    pub voter_token_partial: String,
}

impl UnsignedVote {
    pub fn new(poll_id: &str, encrypted_vote: Envelope, token: &VoterToken) -> Self {
        UnsignedVote {
            poll_id: poll_id.to_owned(),
            encrypted_vote,
            timestamp: timestamp(),
            voter_token_partial: token.partial(),
        }
    }

    /// Bind the vote to a voter token, producing a VoteRecord
    pub fn sign(self, token: &VoterToken) -> VoteRecord {
        let signature = sign_vote(&self, token);
        VoteRecord {
            poll_id: self.poll_id,
            encrypted_vote: self.encrypted_vote,
            timestamp: self.timestamp,
            voter_token_partial: self.voter_token_partial,
            signature,
        }
    }

    fn as_bytes(&self) -> Vec<u8> {
        canonical_bytes(&UnsignedPayload {
            encrypted_vote: &self.encrypted_vote,
            poll_id: &self.poll_id,
            timestamp: self.timestamp,
            voter_token_partial: &self.voter_token_partial,
        })
    }
}

/// A signed, committed-or-pending vote
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoteRecord {
    pub poll_id: String,
    pub encrypted_vote: Envelope,
    pub timestamp: f64,
    pub voter_token_partial: String,
    pub signature: String,
}

impl VoteRecord {
    /// The record without its signature
    pub fn unsigned(&self) -> UnsignedVote {
        UnsignedVote {
            poll_id: self.poll_id.clone(),
            encrypted_vote: self.encrypted_vote.clone(),
            timestamp: self.timestamp,
            voter_token_partial: self.voter_token_partial.clone(),
        }
    }

    pub fn verify_signature(&self, token: &VoterToken) -> bool {
        verify_vote(&self.unsigned(), token, &self.signature)
    }

    /// Canonical bytes of the full record, signature included
    pub fn as_bytes(&self) -> Vec<u8> {
        canonical_bytes(&self.payload())
    }

    pub(crate) fn payload(&self) -> RecordPayload<'_> {
        RecordPayload {
            encrypted_vote: &self.encrypted_vote,
            poll_id: &self.poll_id,
            signature: &self.signature,
            timestamp: self.timestamp,
            voter_token_partial: &self.voter_token_partial,
        }
    }

    /// `hex(SHA-256(canonical record))`
    pub fn hash(&self) -> String {
        sha256_hex(&self.as_bytes())
    }
}

/// Sign an unsigned vote with a voter token: `hex(SHA-256(canonical(vote) ":" token))`
pub fn sign_vote(vote: &UnsignedVote, token: &VoterToken) -> String {
    let mut bytes = vote.as_bytes();
    bytes.push(b':');
    bytes.extend_from_slice(token.as_str().as_bytes());
    sha256_hex(&bytes)
}

/// Verify a vote signature
pub fn verify_vote(vote: &UnsignedVote, token: &VoterToken, signature: &str) -> bool {
    sign_vote(vote, token) == signature
}

#[derive(Serialize)]
struct UnsignedPayload<'a> {
    encrypted_vote: &'a Envelope,
    poll_id: &'a str,
    timestamp: f64,
    voter_token_partial: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RecordPayload<'a> {
    encrypted_vote: &'a Envelope,
    poll_id: &'a str,
    signature: &'a str,
    timestamp: f64,
    voter_token_partial: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unsigned_vote(token: &VoterToken) -> UnsignedVote {
        let envelope = Envelope {
            salt: vec![1; SALT_LENGTH],
            ciphertext: vec![9, 8, 7],
            length: 3,
        };
        UnsignedVote::new("p1", envelope, token)
    }

    #[test]
    fn test_token() {
        let token = derive_token("alice@example.com", "p1");
        assert_eq!(token.as_str().len(), 64);
        assert_eq!(token.as_str(), sha256_hex(b"alice@example.com:p1"));
        assert_eq!(token, derive_token("alice@example.com", "p1"));
        assert_ne!(token, derive_token("alice@example.com", "p2"));
        assert_ne!(token, derive_token("bob@example.com", "p1"));

        assert_eq!(token.partial().len(), TOKEN_PARTIAL_LENGTH);
        assert!(token.as_str().starts_with(&token.partial()));
    }

    #[test]
    fn test_sign_verify() {
        let token = derive_token("alice", "p1");
        let vote = unsigned_vote(&token);
        let signature = sign_vote(&vote, &token);

        assert!(verify_vote(&vote, &token, &signature));
        assert_eq!(sign_vote(&vote, &token), signature);

        let record = vote.clone().sign(&token);
        assert_eq!(record.signature, signature);
        assert_eq!(record.unsigned(), vote);
        assert!(record.verify_signature(&token));
        assert!(!record.verify_signature(&derive_token("bob", "p1")));
    }

    #[test]
    fn test_tamper_each_field() {
        let token = derive_token("alice", "p1");
        let vote = unsigned_vote(&token);
        let signature = sign_vote(&vote, &token);

        let mut tampered = vote.clone();
        tampered.poll_id = "p2".into();
        assert!(!verify_vote(&tampered, &token, &signature));

        let mut tampered = vote.clone();
        tampered.timestamp += 1.0;
        assert!(!verify_vote(&tampered, &token, &signature));

        let mut tampered = vote.clone();
        tampered.voter_token_partial = "0000000000000000".into();
        assert!(!verify_vote(&tampered, &token, &signature));

        let mut tampered = vote.clone();
        tampered.encrypted_vote.ciphertext[0] ^= 1;
        assert!(!verify_vote(&tampered, &token, &signature));

        let mut tampered = vote.clone();
        tampered.encrypted_vote.salt[0] ^= 1;
        assert!(!verify_vote(&tampered, &token, &signature));

        let mut tampered = vote;
        tampered.encrypted_vote.length = 2;
        assert!(!verify_vote(&tampered, &token, &signature));
    }

    #[test]
    fn test_record_hash() {
        let token = derive_token("alice", "p1");
        let record = unsigned_vote(&token).sign(&token);
        assert_eq!(record.hash(), record.clone().hash());

        let mut other = record.clone();
        other.signature = "00".into();
        assert_ne!(record.hash(), other.hash());
    }

    proptest! {
        #[test]
        fn prop_other_token_fails(identifier in "[a-z]{1,12}", other in "[a-z]{1,12}") {
            prop_assume!(identifier != other);
            let token = derive_token(&identifier, "p1");
            let vote = unsigned_vote(&token);
            let signature = sign_vote(&vote, &token);

            prop_assert!(verify_vote(&vote, &token, &signature));
            prop_assert!(!verify_vote(&vote, &derive_token(&other, "p1"), &signature));
        }

        #[test]
        fn prop_poll_id_change_fails(poll_id in "[a-z0-9-]{1,36}") {
            prop_assume!(poll_id != "p1");
            let token = derive_token("alice", "p1");
            let vote = unsigned_vote(&token);
            let signature = sign_vote(&vote, &token);

            let mut tampered = vote;
            tampered.poll_id = poll_id;
            prop_assert!(!verify_vote(&tampered, &token, &signature));
        }
    }
}
