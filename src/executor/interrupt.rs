//! Cancellation handle
//!
//! One handle is created per run and cloned into every executor and worker.
//! Triggering it is sticky: once set, the flag never clears.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

/// Shared "interrupted" flag with async notification
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter
    pub fn trigger(&self) {
        if !self.inner.flag.swap(true, Ordering::SeqCst) {
            debug!("Interrupt triggered");
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the interrupt has been triggered
    pub async fn triggered(&self) {
        loop {
            // register before checking the flag so a concurrent trigger is not missed
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Trigger this handle on the first Ctrl-C and exit with status 130 on
    /// the second.
    ///
    /// Installs a process-wide SIGINT handler, so only binaries should call
    /// it. The returned task should be aborted once the run is over.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let interrupt = self.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            warn!("Received Ctrl+C - cancelling remaining testcases (press again to abort)");
            interrupt.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received second Ctrl+C - aborting");
                std::process::exit(130);
            }
        })
    }
}
