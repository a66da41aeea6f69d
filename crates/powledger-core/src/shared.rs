use crate::{CancelToken, Ledger, LedgerError, SealedBlock, Transaction};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to one ledger shared between callers.
///
/// A single lock covers every operation. `mine` holds it from reading the
/// pool until the pool is cleared, so two miners can never build on the
/// same tail or package the same transactions. Mining blocks the calling
/// thread; async callers should run it on `spawn_blocking`.
#[derive(Clone, Debug)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn add_transaction(&self, tx: impl Into<Transaction>) {
        self.inner.lock().add_transaction(tx);
    }

    /// Queue `tx` unless `max_pending` transactions are already waiting.
    /// Returns the new pool size, or the current one when refused.
    pub fn try_add_transaction(&self, tx: impl Into<Transaction>, max_pending: usize) -> Result<usize, usize> {
        let mut ledger = self.inner.lock();
        let pending = ledger.pending().len();
        if pending >= max_pending {
            return Err(pending);
        }
        ledger.add_transaction(tx);
        Ok(pending + 1)
    }

    pub fn mine(&self, cancel: &CancelToken) -> Result<Option<u64>, LedgerError> {
        self.inner.lock().mine(cancel)
    }

    /// Like `mine`, also returning the chain length seen under the same lock.
    pub fn mine_with_len(&self, cancel: &CancelToken) -> Result<(Option<u64>, usize), LedgerError> {
        let mut ledger = self.inner.lock();
        let mined = ledger.mine(cancel)?;
        Ok((mined, ledger.len()))
    }

    /// Snapshot of the sealed blocks.
    pub fn chain(&self) -> Vec<SealedBlock> {
        self.inner.lock().chain().to_vec()
    }

    /// Snapshot of the pending pool.
    pub fn pending(&self) -> Vec<Transaction> {
        self.inner.lock().pending().to_vec()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending().len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn difficulty(&self) -> usize {
        self.inner.lock().difficulty()
    }

    /// Run `f` against the ledger under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        f(&self.inner.lock())
    }
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        Self::new(ledger)
    }
}
