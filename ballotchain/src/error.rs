use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("ballotchain: IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ballotchain: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ballotchain: CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("ballotchain: invalid configuration: {0}")]
    Config(String),

    #[error("ballotchain: voter has already voted in poll {0}")]
    AlreadyVoted(String),

    #[error("ballotchain: mining cancelled")]
    MiningCancelled,

    #[error("ballotchain: no valid nonce found after {attempts} attempts")]
    MiningExhausted { attempts: u64 },

    #[error("ballotchain: sealer worker is not running")]
    SealerStopped,

    #[error("ballotchain: {0}")]
    Decryption(#[from] DecryptionError),
}

/// Vote decryption errors
#[derive(Debug, Error, PartialEq)]
pub enum DecryptionError {
    #[error("ballotchain: malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("ballotchain: envelope length {length} exceeds ciphertext length {available}")]
    LengthOutOfRange { length: usize, available: usize },

    #[error("ballotchain: decrypted vote is not valid UTF-8")]
    InvalidUtf8,
}

/// Chain validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("ballotchain validation: stored hash of block {index} does not match its contents")]
    HashMismatch { index: u64 },

    #[error("ballotchain validation: block {index} does not link to the previous block")]
    BrokenLink { index: u64 },

    #[error("ballotchain validation: block {index} does not meet the proof-of-work difficulty")]
    InsufficientWork { index: u64 },

    #[error("ballotchain validation: block {index} is out of sequence")]
    IndexGap { index: u64 },
}
