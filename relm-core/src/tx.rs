use crate::{Connection, ErrorKind, Querier, Result, Transaction};
use std::{
    ops::Deref,
    sync::{
        Arc, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

pub(crate) struct TxHandle<T> {
    pub(crate) transaction: T,
    finished: AtomicBool,
}

impl<T: Transaction> TxHandle<T> {
    pub(crate) fn new(transaction: T) -> Self {
        Self {
            transaction,
            finished: AtomicBool::new(false),
        }
    }

    /// Move to the terminal state, false if some other call already did.
    fn finish(&self) -> bool {
        self.finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Open transaction, dereferences to the [`Querier`] bound to it.
///
/// The transaction ends exactly once: after the first `commit` or `rollback` every further
/// call returns [`ErrorKind::TransactionAlreadyFinished`] without reaching the driver.
/// Dropping an unfinished `Tx` rolls it back in the background.
pub struct Tx<C: Connection> {
    querier: Querier<C>,
    handle: Arc<TxHandle<C::Transaction>>,
}

impl<C: Connection> Tx<C> {
    pub(crate) fn new(querier: Querier<C>, handle: Arc<TxHandle<C::Transaction>>) -> Self {
        Self { querier, handle }
    }

    pub fn querier(&self) -> &Querier<C> {
        &self.querier
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Commit, then run the on commit callbacks in registration order.
    ///
    /// The first failing callback stops the sequence and its error is returned, the
    /// transaction stays committed.
    pub async fn commit(&self) -> Result<()> {
        if !self.handle.finish() {
            return Err(ErrorKind::TransactionAlreadyFinished.into_error());
        }
        self.querier
            .logged("COMMIT", &[], self.handle.transaction.commit())
            .await?;
        let callbacks = match &self.querier.on_commit {
            Some(v) => std::mem::take(&mut *v.lock().unwrap_or_else(PoisonError::into_inner)),
            None => Vec::new(),
        };
        for callback in callbacks {
            callback()?;
        }
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        if !self.handle.finish() {
            return Err(ErrorKind::TransactionAlreadyFinished.into_error());
        }
        self.querier
            .logged("ROLLBACK", &[], self.handle.transaction.rollback())
            .await
    }

    /// Drop the callbacks registered so far.
    pub(crate) fn clear_on_commit(&self) {
        if let Some(v) = &self.querier.on_commit {
            v.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

impl<C: Connection> Deref for Tx<C> {
    type Target = Querier<C>;
    fn deref(&self) -> &Self::Target {
        &self.querier
    }
}

impl<C: Connection> Drop for Tx<C> {
    fn drop(&mut self) {
        if !self.handle.finish() {
            return;
        }
        let handle = self.handle.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                log::debug!("Rolling back a transaction dropped while still open");
                runtime.spawn(async move {
                    if let Err(e) = handle.transaction.rollback().await {
                        log::warn!("Rollback of a dropped transaction failed: {e:#}");
                    }
                });
            }
            Err(..) => {
                log::warn!("Transaction dropped while open outside of a runtime, it was not rolled back");
            }
        }
    }
}
