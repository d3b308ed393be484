//! Quiescence barrier
//!
//! Every unit of work registers with the barrier before it is handed to
//! anyone, and the registration is released when the work and all of its
//! follow-up registrations are accounted for. A child is always registered
//! before its parent's registration is released, so the pending count can
//! only reach zero once nothing is left to do.
//!
//! The barrier fires at most once, and only after the start gate has been
//! opened; seeding registers its initial work first and opens the gate
//! afterwards. A registration released by a failed or panicking task poisons
//! the barrier instead of counting as finished work.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Inner {
    pending: AtomicUsize,
    gate_open: AtomicBool,
    fired: AtomicBool,
    completions: AtomicUsize,
    poisoned: AtomicBool,
    done: watch::Sender<bool>,
}

/// Shared completion detector for both pipelines
#[derive(Clone)]
pub struct Barrier {
    inner: Arc<Inner>,
}

/// One unit of outstanding work
///
/// Dropping it marks the work finished. Dropping it during a panic, or
/// calling [`Registration::poison`], marks it failed.
#[must_use = "dropping a registration immediately marks its work finished"]
pub struct Registration {
    barrier: Barrier,
    poisoned: bool,
}

impl Barrier {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                pending: AtomicUsize::new(0),
                gate_open: AtomicBool::new(false),
                fired: AtomicBool::new(false),
                completions: AtomicUsize::new(0),
                poisoned: AtomicBool::new(false),
                done,
            }),
        }
    }

    /// Records a new unit of outstanding work
    pub fn register(&self) -> Registration {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        Registration {
            barrier: self.clone(),
            poisoned: false,
        }
    }

    /// Allows the barrier to fire; called once seeding has registered its work
    pub fn open_gate(&self) {
        self.inner.gate_open.store(true, Ordering::SeqCst);
        if self.inner.pending.load(Ordering::SeqCst) == 0 {
            self.fire();
        }
    }

    /// Resolves once all registered work is finished
    ///
    /// Never resolves on a poisoned barrier.
    pub async fn wait(&self) {
        let mut rx = self.inner.done.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn is_done(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.load(Ordering::SeqCst)
    }

    /// How often completion was signalled; never more than one
    pub fn completions(&self) -> usize {
        self.inner.completions.load(Ordering::SeqCst)
    }

    /// Outstanding registrations
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    fn release(&self, failed: bool) {
        if failed {
            self.inner.poisoned.store(true, Ordering::SeqCst);
        }

        let remaining = self.inner.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.inner.gate_open.load(Ordering::SeqCst) {
            self.fire();
        }
    }

    fn fire(&self) {
        if self.is_poisoned() {
            return;
        }
        if self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.inner.completions.fetch_add(1, Ordering::SeqCst);
            self.inner.done.send_replace(true);
        }
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Registration {
    /// Marks this work as failed; the barrier will never fire
    pub fn poison(mut self) {
        self.poisoned = true;
    }

    /// The barrier this registration belongs to
    pub fn barrier(&self) -> &Barrier {
        &self.barrier
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let failed = self.poisoned || std::thread::panicking();
        self.barrier.release(failed);
    }
}
