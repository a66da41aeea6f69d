use crate::{
    config::{LedgerConfig, MiningStrategy, PoolPolicy},
    constants::GENESIS_PREVIOUS_HASH,
    error::{AdmissionError, LedgerError},
    mine, now_secs,
    pow::{self, CancelToken},
    Block, Fingerprint, SealedBlock, Transaction,
};
use std::time::Instant;
use tracing::{debug, info, warn};

/// An in-memory chain of sealed blocks plus the pool of transactions
/// waiting to be mined into the next one.
///
/// `chain` only grows through [`Ledger::try_add_block`], and always holds
/// at least the genesis block.
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Vec<SealedBlock>,
    unconfirmed_transactions: Vec<Transaction>,
    config: LedgerConfig,
}

impl Ledger {
    /// Build a ledger holding only a fresh genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let mut ledger = Self {
            chain: Vec::new(),
            unconfirmed_transactions: Vec::new(),
            config,
        };
        ledger.create_genesis_block();
        Ok(ledger)
    }

    pub fn with_difficulty(difficulty: usize) -> Result<Self, LedgerError> {
        Self::new(LedgerConfig::default().with_difficulty(difficulty))
    }

    /// Rebuild a ledger from an exported chain, re-checking every link and
    /// proof. The pool starts empty.
    pub fn from_chain(config: LedgerConfig, chain: Vec<SealedBlock>) -> Result<Self, LedgerError> {
        config.validate()?;
        let ledger = Self {
            chain,
            unconfirmed_transactions: Vec::new(),
            config,
        };
        ledger.verify_chain()?;
        Ok(ledger)
    }

    fn create_genesis_block(&mut self) {
        let genesis = SealedBlock::genesis(now_secs());
        info!(hash = %genesis.hash(), "created genesis block");
        self.chain.push(genesis);
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn chain(&self) -> &[SealedBlock] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false once constructed; genesis is never removed.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.unconfirmed_transactions
    }

    pub fn tail(&self) -> Result<&SealedBlock, LedgerError> {
        self.chain.last().ok_or(LedgerError::EmptyChain)
    }

    /// True iff `claimed` carries enough leading zeros and is the block's
    /// real content hash at its current nonce.
    pub fn is_valid_proof(&self, block: &Block, claimed: &Fingerprint) -> bool {
        self.check_proof(block, claimed).is_ok()
    }

    fn check_proof(&self, block: &Block, claimed: &Fingerprint) -> Result<(), AdmissionError> {
        let found = claimed.leading_zeros();
        if found < self.config.difficulty {
            return Err(AdmissionError::InsufficientWork {
                required: self.config.difficulty,
                found,
            });
        }
        let computed = block.compute_hash();
        if computed != *claimed {
            return Err(AdmissionError::HashMismatch {
                claimed: claimed.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// The admission gate. Seals `candidate` with `proof` and appends it, or
    /// leaves the ledger untouched and says why not. Returns the new index.
    pub fn try_add_block(&mut self, candidate: Block, proof: Fingerprint) -> Result<u64, LedgerError> {
        let tail = self.tail()?;
        if candidate.previous_hash != *tail.hash() {
            return Err(AdmissionError::StaleTail {
                expected: tail.hash().clone(),
                found: candidate.previous_hash,
            }
            .into());
        }
        if candidate.index != tail.index() + 1 {
            return Err(AdmissionError::IndexGap {
                expected: tail.index() + 1,
                found: candidate.index,
            }
            .into());
        }
        if candidate.transactions.is_empty() {
            return Err(AdmissionError::EmptyBlock.into());
        }
        self.check_proof(&candidate, &proof)?;

        let index = candidate.index;
        debug!(index, hash = %proof, "block admitted");
        self.chain.push(SealedBlock::seal(candidate, proof));
        Ok(index)
    }

    /// Boolean form of [`Ledger::try_add_block`].
    pub fn add_block(&mut self, candidate: Block, proof: Fingerprint) -> bool {
        match self.try_add_block(candidate, proof) {
            Ok(_) => true,
            Err(err) => {
                debug!(%err, "block rejected");
                false
            }
        }
    }

    /// Find a nonce for `block` that satisfies this ledger's difficulty.
    /// The nonce is reset to 0 first and left at the winning value.
    pub fn proof_of_work(&self, block: &mut Block, cancel: &CancelToken) -> Result<Fingerprint, LedgerError> {
        let difficulty = self.config.difficulty;
        let proof = match self.config.strategy {
            MiningStrategy::Sequential => pow::search(block, difficulty, cancel),
            MiningStrategy::Parallel => mine::search_parallel(block, difficulty, cancel),
        };
        proof.ok_or(LedgerError::Cancelled)
    }

    /// Queue a transaction for the next mined block. No validation.
    pub fn add_transaction(&mut self, tx: impl Into<Transaction>) {
        self.unconfirmed_transactions.push(tx.into());
    }

    /// Package pending transactions into a new block, search its proof and
    /// admit it. `Ok(None)` when nothing is pending.
    ///
    /// The pool is cleared only after admission. A cancelled search or a
    /// rejected candidate leaves every pending transaction in place.
    pub fn mine(&mut self, cancel: &CancelToken) -> Result<Option<u64>, LedgerError> {
        if self.unconfirmed_transactions.is_empty() {
            debug!("no pending transactions, nothing to mine");
            return Ok(None);
        }

        let tail = self.tail()?;
        let (index, previous_hash) = (tail.index() + 1, tail.hash().clone());
        let transactions = match self.config.pool_policy {
            PoolPolicy::WholePool => self.unconfirmed_transactions.clone(),
            PoolPolicy::FirstOnly => self.unconfirmed_transactions[..1].to_vec(),
        };
        let packaged = transactions.len();
        let mut candidate = Block::new(index, transactions, now_secs(), previous_hash);

        let started = Instant::now();
        let proof = self.proof_of_work(&mut candidate, cancel)?;
        let nonce = candidate.nonce;
        let index = self.try_add_block(candidate, proof)?;

        let dropped = self.unconfirmed_transactions.len() - packaged;
        if dropped > 0 {
            warn!(index, dropped, "pending transactions discarded without being mined");
        }
        self.unconfirmed_transactions.clear();

        info!(
            index,
            nonce,
            packaged,
            elapsed_ms = started.elapsed().as_millis() as u64,
            hash = %self.chain[self.chain.len() - 1].hash(),
            "mined block"
        );
        Ok(Some(index))
    }

    /// Re-check the whole chain: genesis shape, contiguous indices,
    /// hash links, and proof-of-work of every block after genesis.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        let genesis = self.chain.first().ok_or(LedgerError::EmptyChain)?;
        if genesis.index() != 0 {
            return Err(LedgerError::BrokenChain {
                index: genesis.index(),
                reason: "first block is not at index 0",
            });
        }
        if genesis.previous_hash().as_str() != GENESIS_PREVIOUS_HASH {
            return Err(LedgerError::BrokenChain {
                index: 0,
                reason: "genesis does not link to the sentinel hash",
            });
        }
        if !genesis.transactions().is_empty() || genesis.nonce() != 0 {
            return Err(LedgerError::BrokenChain {
                index: 0,
                reason: "genesis must be empty and sealed at nonce 0",
            });
        }

        for pair in self.chain.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);
            if block.index() != prev.index() + 1 {
                return Err(LedgerError::BrokenChain {
                    index: block.index(),
                    reason: "index does not follow its predecessor",
                });
            }
            if block.previous_hash() != prev.hash() {
                return Err(LedgerError::BrokenChain {
                    index: block.index(),
                    reason: "previous_hash does not match predecessor hash",
                });
            }
            if block.transactions().is_empty() {
                return Err(LedgerError::BrokenChain {
                    index: block.index(),
                    reason: "only genesis may be empty",
                });
            }
            if !self.is_valid_proof(block.block(), block.hash()) {
                return Err(LedgerError::BrokenChain {
                    index: block.index(),
                    reason: "proof of work does not meet difficulty",
                });
            }
        }
        Ok(())
    }
}
