use crate::{
    constants::PARALLEL_BATCH,
    pow::{digest_with_nonce, leading_zero_digits, CancelToken},
    Block, Fingerprint,
};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::ops::RangeInclusive;
use tracing::debug;

/// Nonces of the batch starting at `start`; the last batch ends at `u64::MAX`.
fn batch_from(start: u64) -> RangeInclusive<u64> {
    start..=start.saturating_add(PARALLEL_BATCH - 1)
}

/// Searches nonces in parallel, one batch of `PARALLEL_BATCH` at a time,
/// until the block hash has at least `difficulty` leading zero hex digits.
///
/// Within a batch the lowest satisfying nonce wins, so the result is the
/// same nonce `pow::search` would find. The token is checked between batches.
pub fn search_parallel(
    block: &mut Block,
    difficulty: usize,
    cancel: &CancelToken,
) -> Option<Fingerprint> {
    block.nonce = 0;
    let prefix = Sha256::new().chain_update(block.hash_prefix());
    let mut start = 0u64;

    loop {
        if cancel.is_cancelled() {
            debug!(index = block.index, tried = start, "parallel nonce search cancelled");
            return None;
        }
        let batch = batch_from(start);
        let last = *batch.end();
        let found = batch
            .into_par_iter()
            .find_first(|nonce| leading_zero_digits(&digest_with_nonce(&prefix, *nonce)) >= difficulty);

        if let Some(nonce) = found {
            block.nonce = nonce;
            let digest = digest_with_nonce(&prefix, nonce);
            return Some(Fingerprint::from_digest(&digest));
        }
        if last == u64::MAX {
            debug!(index = block.index, "nonce space exhausted");
            return None;
        }
        start = last + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pow, Transaction};
    use serde_json::json;

    fn candidate() -> Block {
        Block::new(
            1,
            vec![Transaction::new(json!({ "id": "t1" }))],
            1_600_000_100,
            Fingerprint::from("4da0f7fa9ec07faf7869824bff6abfbb0c81355189a54a21fd6b4b1584021702"),
        )
    }

    #[test]
    fn parallel_matches_sequential() {
        for difficulty in [1, 2, 3] {
            let mut seq = candidate();
            let mut par = candidate();
            let seq_hash = pow::search(&mut seq, difficulty, &CancelToken::new()).unwrap();
            let par_hash = search_parallel(&mut par, difficulty, &CancelToken::new()).unwrap();
            assert_eq!(seq.nonce, par.nonce, "difficulty {difficulty}");
            assert_eq!(seq_hash, par_hash);
            assert_eq!(par.compute_hash(), par_hash);
        }
    }

    #[test]
    fn parallel_example() {
        let mut block = candidate();
        let hash = search_parallel(&mut block, 3, &CancelToken::new()).unwrap();
        assert_eq!(block.nonce, 10_202);
        assert_eq!(
            hash.as_str(),
            "000e58f465f222efea93fbbad3105a0da382885e3bb5ec326fe0f80a6afb4b29"
        );
    }

    #[test]
    fn batches_tile_the_whole_nonce_space() {
        let first = batch_from(0);
        assert_eq!(*first.end(), PARALLEL_BATCH - 1);
        assert_eq!(*batch_from(first.end() + 1).start(), PARALLEL_BATCH);

        let last = batch_from(u64::MAX - 3);
        assert_eq!(*last.end(), u64::MAX);
        assert!(last.contains(&u64::MAX));
        assert_eq!(last.count(), 4);
    }

    #[test]
    fn parallel_search_honours_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut block = candidate();
        assert!(search_parallel(&mut block, 64, &cancel).is_none());
    }
}
