use crate::Fingerprint;
use thiserror::Error;

/// Why a candidate block was turned away by the admission gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("stale tail: candidate links to {found}, current tail is {expected}")]
    StaleTail {
        expected: Fingerprint,
        found: Fingerprint,
    },
    #[error("index gap: expected block {expected}, candidate is block {found}")]
    IndexGap { expected: u64, found: u64 },
    #[error("only the genesis block may have no transactions")]
    EmptyBlock,
    #[error("insufficient work: {found} leading zero digits, {required} required")]
    InsufficientWork { required: usize, found: usize },
    #[error("proof {claimed} does not match block content hash {computed}")]
    HashMismatch {
        claimed: Fingerprint,
        computed: Fingerprint,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Only reachable if a ledger was built without its genesis block.
    #[error("ledger has no blocks; genesis was never created")]
    EmptyChain,
    #[error("proof-of-work search was cancelled")]
    Cancelled,
    #[error("block rejected: {0}")]
    Rejected(#[from] AdmissionError),
    #[error("chain broken at block {index}: {reason}")]
    BrokenChain { index: u64, reason: &'static str },
    #[error("difficulty {requested} exceeds the {max} hex digits of a fingerprint")]
    DifficultyTooHigh { requested: usize, max: usize },
}

/// A serialized sealed block whose stored hash disagrees with its content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stored hash {stored} does not match block content hash {computed}")]
pub struct SealError {
    pub stored: Fingerprint,
    pub computed: Fingerprint,
}
