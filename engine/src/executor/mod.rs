//! Executor - bounded worker pool draining a spool storage.
//!
//! Workers claim the first entry that is neither in flight nor waiting out a
//! retry backoff, run it through a [`Processor`], and remove it from the
//! storage once it succeeded (which also deletes its mirror file). Entries
//! that keep failing are discarded after `max_attempts`.

mod config;
mod processor;


use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, error, info, warn};

use crate::spool::{Discipline, Entry, Storage, StorageListener, StorageResult};

pub use config::ExecutorConfig;
pub use processor::{CopyProcessor, ProcessError, Processor};

/// Counters for the executor.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    pub processed: AtomicU64,
    pub failed: AtomicU64,
    pub discarded: AtomicU64,
}

impl ExecutorStats {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Claims {
    in_flight: HashSet<u64>,
    attempts: HashMap<u64, u32>,
    retry_at: HashMap<u64, Instant>,
}

/// Wakes one idle worker per entry added to the storage.
struct WakeOnGrowth(Arc<Notify>);

impl StorageListener for WakeOnGrowth {
    fn on_size_changed(&self, previous: usize, current: usize) {
        if current > previous {
            self.0.notify_one();
        }
    }
}

pub struct Executor<E: Entry, D: Discipline<E>, P: Processor<E>> {
    storage: Arc<Storage<E, D>>,
    processor: Arc<P>,
    config: ExecutorConfig,
    wakeup: Arc<Notify>,
    claims: Mutex<Claims>,
    stats: Arc<ExecutorStats>,
    stopping: AtomicBool,
}

impl<E: Entry, D: Discipline<E>, P: Processor<E>> Executor<E, D, P> {
    /// Create an executor and subscribe it to growth of `storage`.
    pub fn new(
        storage: Arc<Storage<E, D>>,
        processor: P,
        config: ExecutorConfig,
    ) -> StorageResult<Arc<Self>> {
        let wakeup = Arc::new(Notify::new());
        storage.register_listener(Arc::new(WakeOnGrowth(Arc::clone(&wakeup))))?;
        Ok(Arc::new(Self {
            storage,
            processor: Arc::new(processor),
            config,
            wakeup,
            claims: Mutex::new(Claims::default()),
            stats: Arc::new(ExecutorStats::default()),
            stopping: AtomicBool::new(false),
        }))
    }

    pub fn stats(&self) -> &Arc<ExecutorStats> {
        &self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.claims.lock().in_flight.len()
    }

    #[inline]
    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Ask all workers to stop after their current entry.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.wakeup.notify_waiters();
    }

    /// Run the workers until `shutdown` fires (or its sender is dropped).
    /// Returns once every worker has finished its current entry.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let workers = self.config.workers.max(1);
        info!(workers, max_attempts = self.config.max_attempts, "Executor started");

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let executor = Arc::clone(&self);
                tokio::spawn(async move { executor.worker_loop(worker).await })
            })
            .collect();

        tokio::select! {
            _ = shutdown.recv() => {}
            _ = self.wait_stopped() => {}
        }
        self.stop();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Executor worker panicked");
            }
        }
        info!(
            processed = self.stats.processed(),
            failed = self.stats.failed(),
            discarded = self.stats.discarded(),
            "Executor stopped"
        );
    }

    async fn wait_stopped(&self) {
        while !self.is_stopping() {
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn worker_loop(&self, worker: usize) {
        while !self.is_stopping() {
            match self.claim() {
                Ok(Some(entry)) => self.execute(worker, entry).await,
                Ok(None) => {
                    tokio::select! {
                        _ = self.wakeup.notified() => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    warn!(worker, error = %e, "Storage unavailable, worker exiting");
                    return;
                }
            }
        }
    }

    /// Pick the next runnable entry and mark it in flight.
    ///
    /// The attempt count of a newly seen entry is seeded from the entry
    /// itself, so a retry budget survives a restart.
    fn claim(&self) -> StorageResult<Option<E>> {
        let mut claims = self.claims.lock();
        self.prune(&mut claims)?;
        let now = Instant::now();
        let entry = self.storage.find(|e| {
            let id = e.id();
            !claims.in_flight.contains(&id)
                && claims.retry_at.get(&id).map_or(true, |at| *at <= now)
        })?;
        if let Some(ref entry) = entry {
            let id = entry.id();
            claims.in_flight.insert(id);
            claims.retry_at.remove(&id);
            claims.attempts.entry(id).or_insert_with(|| entry.attempts());
        }
        Ok(entry)
    }

    /// Forget retry state of entries removed from the storage by others.
    fn prune(&self, claims: &mut Claims) -> StorageResult<()> {
        let mut stale = Vec::new();
        for &id in claims.attempts.keys().chain(claims.retry_at.keys()) {
            if !claims.in_flight.contains(&id) && !self.storage.contains_id(id)? {
                stale.push(id);
            }
        }
        for id in stale {
            claims.attempts.remove(&id);
            claims.retry_at.remove(&id);
        }
        Ok(())
    }

    fn release_claim(&self, entry_id: u64) {
        let mut claims = self.claims.lock();
        claims.in_flight.remove(&entry_id);
        claims.attempts.remove(&entry_id);
        claims.retry_at.remove(&entry_id);
    }

    async fn execute(&self, worker: usize, entry: E) {
        let entry_id = entry.id();
        let started = Instant::now();

        match self.processor.process(&entry).await {
            Ok(()) => {
                if let Err(e) = self.storage.remove_by_id(entry_id) {
                    warn!(worker, entry_id, error = %e, "Failed to remove processed entry");
                }
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                self.release_claim(entry_id);
                debug!(
                    worker,
                    entry_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Spool entry processed"
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                let attempts = {
                    let mut claims = self.claims.lock();
                    let attempts = claims.attempts.entry(entry_id).or_insert(0);
                    *attempts += 1;
                    *attempts
                };

                if attempts >= self.config.max_attempts {
                    error!(worker, entry_id, attempts, error = %e, "Discarding spool entry after max attempts");
                    if let Err(e) = self.storage.remove_by_id(entry_id) {
                        warn!(worker, entry_id, error = %e, "Failed to remove discarded entry");
                    }
                    self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                    self.release_claim(entry_id);
                    return;
                }

                warn!(worker, entry_id, attempts, error = %e, "Spool entry failed, will retry");
                // Persist the count so a restart resumes the same budget
                match self.storage.update(entry_id, |stored| stored.set_attempts(attempts)) {
                    // Removed while it was being processed
                    Ok(None) => {
                        self.release_claim(entry_id);
                        return;
                    }
                    Ok(Some(_)) => {}
                    Err(e) => {
                        warn!(worker, entry_id, error = %e, "Failed to record attempt count");
                    }
                }
                let mut claims = self.claims.lock();
                claims
                    .retry_at
                    .insert(entry_id, Instant::now() + self.config.retry_backoff);
                claims.in_flight.remove(&entry_id);
            }
        }
    }
}
