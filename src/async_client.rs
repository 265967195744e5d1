//! Async wrapper around [`Poller`] for use inside a Tokio runtime.
//!
//! Every operation runs on the blocking thread pool via
//! [`tokio::task::spawn_blocking`]; the poller itself stays synchronous.
//!
//! # Example
//!
//! ```no_run
//! use card_sheet_sync::{AsyncPoller, SheetSync};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let poller = AsyncPoller::connect(SheetSync::builder()).await.unwrap();
//!     poller.prime().await.unwrap();
//!     let outcome = poller.run_cycle().await.unwrap();
//!     println!("{:?}", outcome);
//! }
//! ```

use std::sync::{Arc, Mutex};

use crate::catalog::{CatalogClient, CatalogSource};
use crate::error::{Result, SyncError};
use crate::poller::{CycleOutcome, LoopState, Poller};
use crate::sheets::{GoogleWorksheet, Worksheet};
use crate::SheetSyncBuilder;

/// Shares a [`Poller`] behind a mutex and drives it from async code.
pub struct AsyncPoller<W, C> {
    inner: Arc<Mutex<Poller<W, C>>>,
}

impl<W, C> Clone for AsyncPoller<W, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl AsyncPoller<GoogleWorksheet, CatalogClient> {
    /// Build a [`crate::SheetSync`] on the blocking pool and wrap its poller.
    pub async fn connect(builder: SheetSyncBuilder) -> Result<Self> {
        let sync = tokio::task::spawn_blocking(move || builder.build())
            .await
            .map_err(|e| SyncError::Config(format!("Task join error: {e}")))??;
        Ok(Self::new(sync.into_poller()))
    }
}

impl<W, C> AsyncPoller<W, C>
where
    W: Worksheet + Send + 'static,
    C: CatalogSource + Send + 'static,
{
    pub fn new(poller: Poller<W, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(poller)),
        }
    }

    /// Run any poller operation on the blocking thread pool.
    pub async fn with<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Poller<W, C>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let poller = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = poller
                .lock()
                .map_err(|_| SyncError::Config("poller lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| SyncError::Config(format!("Task join error: {e}")))?
    }

    pub async fn prime(&self) -> Result<()> {
        self.with(|p| p.prime()).await
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.with(|p| p.run_cycle()).await
    }

    /// One cycle with the failure policy applied; see [`Poller::step`].
    pub async fn step(&self) -> Result<Option<CycleOutcome>> {
        self.with(|p| p.step()).await
    }

    pub async fn state(&self) -> Result<LoopState> {
        self.with(|p| Ok(p.state())).await
    }

    /// Poll until the consecutive failure limit is reached.
    ///
    /// Each cycle takes the lock on its own, so other handles can query the
    /// poller while this loop waits out the poll delay.
    pub async fn run(&self) -> Result<()> {
        let delay = self.with(|p| Ok(p.poll_delay())).await?;
        loop {
            self.step().await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
