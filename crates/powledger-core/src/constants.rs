pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const DEFAULT_DIFFICULTY: usize = 2;
/// Nonce attempts between two looks at a `CancelToken`.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;
/// Nonces handed to rayon per parallel round.
pub const PARALLEL_BATCH: u64 = 1 << 18;
