pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;
pub mod shared;

use constants::GENESIS_PREVIOUS_HASH;
use error::SealError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use config::{LedgerConfig, MiningStrategy, PoolPolicy};
pub use error::{AdmissionError, LedgerError};
pub use ledger::Ledger;
pub use pow::CancelToken;
pub use shared::SharedLedger;

/// Seconds since the unix epoch; a clock set before 1970 reads as 0.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Lowercase hex SHA-256 digest of a block's content, or the genesis
/// sentinel `"0"` when used as a `previous_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn genesis_sentinel() -> Self {
        Self(GENESIS_PREVIOUS_HASH.to_string())
    }

    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of leading `'0'` characters.
    pub fn leading_zeros(&self) -> usize {
        self.0.chars().take_while(|c| *c == '0').count()
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.leading_zeros() >= difficulty
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Fingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An opaque transaction record. The ledger never looks inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction(pub Value);

impl Transaction {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn payload(&self) -> &Value {
        &self.0
    }

    /// Compact JSON with object keys sorted at every depth, independent of
    /// the order they were inserted in.
    pub fn canonical_json(&self) -> String {
        let mut out = String::new();
        write_canonical(&self.0, &mut out);
        out
    }
}

impl From<Value> for Transaction {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// A candidate block. It carries no hash until the ledger seals it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: u64,
    pub previous_hash: Fingerprint,
    pub nonce: u64,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        timestamp: u64,
        previous_hash: Fingerprint,
    ) -> Self {
        Self {
            index,
            transactions,
            timestamp,
            previous_hash,
            nonce: 0,
        }
    }

    /// Every hashed field except the nonce, in a fixed layout:
    /// `index | timestamp | len(previous_hash) previous_hash | tx count | (len(tx) tx)*`.
    /// Integers are little-endian u64; transactions are canonical JSON.
    pub fn hash_prefix(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 8 + 8 + self.previous_hash.0.len() + 8);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        push_len_prefixed(&mut bytes, self.previous_hash.as_str().as_bytes());
        bytes.extend_from_slice(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            push_len_prefixed(&mut bytes, tx.canonical_json().as_bytes());
        }
        bytes
    }

    /// The full hashed content: the prefix followed by the nonce.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = self.hash_prefix();
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    pub fn compute_hash(&self) -> Fingerprint {
        let digest = Sha256::digest(self.hash_bytes());
        Fingerprint::from_digest(&digest)
    }
}

fn push_len_prefixed(bytes: &mut Vec<u8>, field: &[u8]) {
    bytes.extend_from_slice(&(field.len() as u64).to_le_bytes());
    bytes.extend_from_slice(field);
}

/// A block admitted to a chain. The stored hash always equals
/// `compute_hash()` of the wrapped block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSealedBlock")]
pub struct SealedBlock {
    #[serde(flatten)]
    block: Block,
    hash: Fingerprint,
}

#[derive(Deserialize)]
struct RawSealedBlock {
    #[serde(flatten)]
    block: Block,
    hash: Fingerprint,
}

impl TryFrom<RawSealedBlock> for SealedBlock {
    type Error = SealError;

    fn try_from(raw: RawSealedBlock) -> Result<Self, Self::Error> {
        let computed = raw.block.compute_hash();
        if computed != raw.hash {
            return Err(SealError {
                stored: raw.hash,
                computed,
            });
        }
        Ok(Self {
            block: raw.block,
            hash: raw.hash,
        })
    }
}

impl SealedBlock {
    /// The self-sealed genesis block: no transactions, `"0"` as previous
    /// hash, hashed at nonce 0 without any proof-of-work.
    pub fn genesis(timestamp: u64) -> Self {
        let block = Block::new(0, Vec::new(), timestamp, Fingerprint::genesis_sentinel());
        let hash = block.compute_hash();
        Self { block, hash }
    }

    /// Caller must have checked `hash == block.compute_hash()`.
    pub(crate) fn seal(block: Block, hash: Fingerprint) -> Self {
        debug_assert_eq!(block.compute_hash(), hash);
        Self { block, hash }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn hash(&self) -> &Fingerprint {
        &self.hash
    }

    pub fn index(&self) -> u64 {
        self.block.index
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.block.transactions
    }

    pub fn timestamp(&self) -> u64 {
        self.block.timestamp
    }

    pub fn previous_hash(&self) -> &Fingerprint {
        &self.block.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.block.nonce
    }

    pub fn into_block(self) -> Block {
        self.block
    }
}

pub mod pow {
    use super::{Block, Fingerprint};
    use crate::constants::CANCEL_CHECK_INTERVAL;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tracing::debug;

    pub fn count_leading_zero_bits(hash: &[u8]) -> u32 {
        let zero_bytes = hash.iter().take_while(|b| **b == 0).count() as u32;
        let partial = hash.get(zero_bytes as usize).map_or(0, |b| b.leading_zeros());
        zero_bytes * 8 + partial
    }

    /// Leading `'0'` characters the digest will have once hex encoded.
    pub fn leading_zero_digits(hash: &[u8]) -> usize {
        (count_leading_zero_bits(hash) / 4) as usize
    }

    /// Cooperative stop signal for a nonce search: an external flag shared
    /// by every clone, plus an optional deadline.
    #[derive(Clone, Debug, Default)]
    pub struct CancelToken {
        flag: Arc<AtomicBool>,
        deadline: Option<Instant>,
    }

    impl CancelToken {
        /// A token that only fires when `cancel` is called.
        pub fn new() -> Self {
            Self::default()
        }

        /// A token that also fires once `budget` has elapsed.
        pub fn with_deadline(budget: Duration) -> Self {
            Self {
                flag: Arc::default(),
                deadline: Instant::now().checked_add(budget),
            }
        }

        pub fn cancel(&self) {
            self.flag.store(true, Ordering::Relaxed);
        }

        pub fn is_cancelled(&self) -> bool {
            self.flag.load(Ordering::Relaxed)
                || self.deadline.is_some_and(|d| Instant::now() >= d)
        }
    }

    /// Digest of `prefix` extended with `nonce`, without re-hashing the prefix.
    pub(crate) fn digest_with_nonce(prefix: &Sha256, nonce: u64) -> [u8; 32] {
        prefix.clone().chain_update(nonce.to_le_bytes()).finalize().into()
    }

    /// Reset the nonce to 0 and increment it until the block hash has at
    /// least `difficulty` leading zero hex digits. Leaves the winning nonce
    /// in `block`. Returns `None` if `cancel` fired first.
    pub fn search(block: &mut Block, difficulty: usize, cancel: &CancelToken) -> Option<Fingerprint> {
        block.nonce = 0;
        let prefix = Sha256::new().chain_update(block.hash_prefix());
        loop {
            let digest = digest_with_nonce(&prefix, block.nonce);
            if leading_zero_digits(&digest) >= difficulty {
                return Some(Fingerprint::from_digest(&digest));
            }
            block.nonce = block.nonce.wrapping_add(1);
            if block.nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                debug!(index = block.index, tried = block.nonce, "nonce search cancelled");
                return None;
            }
        }
    }
}
