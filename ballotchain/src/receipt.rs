use crate::*;

/// Decoded contents of a voter receipt
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Receipt {
    pub poll_id: String,
    pub timestamp: f64,

    /// `hex(SHA-256(canonical record))`
    pub vote_hash: String,
}

impl Receipt {
    pub fn for_record(record: &VoteRecord) -> Self {
        Receipt {
            poll_id: record.poll_id.clone(),
            timestamp: record.timestamp,
            vote_hash: record.hash(),
        }
    }

    /// Transport form: base64 of the JSON payload
    pub fn encode(&self) -> String {
        let json =
            serde_json::to_vec(self).expect("ballotchain: Unexpected error serializing receipt");
        base64::encode(&json)
    }

    /// Decode a receipt, `None` if it is not one
    pub fn decode(receipt: &str) -> Option<Self> {
        let json = base64::decode(receipt.trim()).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// Whether any of `records` is the exact record this receipt was issued for
    pub fn matches_any(&self, records: &[VoteRecord]) -> bool {
        records.iter().any(|record| record.hash() == self.vote_hash)
    }
}

/// Issue an opaque receipt for a vote record
pub fn generate_receipt(record: &VoteRecord) -> String {
    Receipt::for_record(record).encode()
}

/// Check a receipt against committed records. Undecodable receipts are not verified.
pub fn verify_receipt(receipt: &str, records: &[VoteRecord]) -> bool {
    match Receipt::decode(receipt) {
        Some(receipt) => receipt.matches_any(records),
        None => false,
    }
}
