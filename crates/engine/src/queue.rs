//! Bounded reconciliation queue and its periodic drain consumer.
//!
//! Producers block when the queue is full. One consumer thread drains
//! everything queued on each tick; requests are applied in FIFO order and
//! a failing request does not stop the drain.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded, select, tick};
use parking_lot::Mutex;
use tracing::{debug, error, info, info_span, warn};

use graphprov_core::config::DEFAULT_QUEUE_CAPACITY;
use graphprov_core::{ContextFactory, DrainId, Iri, ProvenanceConfig, QueueConfig};

use crate::data_manager::{CleanupSummary, DataManager};
use crate::error::EngineError;
use crate::mapping::{MappingRegistry, NoResolver, ObjectResolver};
use crate::requests::{RequestEffects, RequestProcessor, UpdateRequest};
use crate::stores::WorkflowStores;

const PROGRESS_EVERY: usize = 1_000;

/// Hooks for caches and indexes kept outside the store.
pub trait ChangeListener: Send + Sync {
    fn invalidate_caches(&self) {}

    fn reindex(&self, updated: &BTreeSet<Iri>, deleted: &BTreeSet<Iri>) {
        let _ = (updated, deleted);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ChangeListener for NoopListener {}

/// What one drain pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub failed: usize,
    pub statements_added: usize,
    pub statements_removed: usize,
    pub updated: BTreeSet<Iri>,
    pub deleted: BTreeSet<Iri>,
    pub cleanup: CleanupSummary,
}

impl DrainReport {
    pub fn handled(&self) -> usize {
        self.processed + self.failed
    }
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub processed: u64,
    pub failed: u64,
}

/// Depth thresholds. Each crossing is reported once: the warning
/// threshold moves past the depth, the critical one re-arms only after the
/// depth has dropped below it.
struct DepthAlarm {
    warn_at: AtomicUsize,
    step: usize,
    critical: usize,
    critical_raised: AtomicBool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DepthCheck {
    /// Crossed warning threshold and the next one.
    growing: Option<(usize, usize)>,
    critical: bool,
}

impl DepthAlarm {
    fn new(config: &QueueConfig) -> Self {
        Self {
            warn_at: AtomicUsize::new(config.warn_threshold),
            step: config.warn_step.max(1),
            critical: config.critical_threshold,
            critical_raised: AtomicBool::new(false),
        }
    }

    fn observe(&self, depth: usize) -> DepthCheck {
        let mut check = DepthCheck::default();
        let threshold = self.warn_at.load(Ordering::Relaxed);
        if depth > threshold {
            let next = threshold + self.step * ((depth - threshold) / self.step + 1);
            if self
                .warn_at
                .compare_exchange(threshold, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                check.growing = Some((threshold, next));
            }
        }
        if depth >= self.critical {
            check.critical = !self.critical_raised.swap(true, Ordering::Relaxed);
        } else {
            self.critical_raised.store(false, Ordering::Relaxed);
        }
        check
    }
}

struct QueueInner {
    sender: Sender<UpdateRequest>,
    receiver: Receiver<UpdateRequest>,
    capacity: usize,
    config: ProvenanceConfig,
    alarm: DepthAlarm,
    // Held for a whole pass: the drain owns its live connection exclusively.
    drain_lock: Mutex<()>,
    stores: WorkflowStores,
    factory: Arc<ContextFactory>,
    registry: Arc<MappingRegistry>,
    resolver: Arc<dyn ObjectResolver>,
    listener: Arc<dyn ChangeListener>,
    submitted: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

pub struct QueueBuilder {
    config: ProvenanceConfig,
    stores: WorkflowStores,
    factory: Arc<ContextFactory>,
    registry: Arc<MappingRegistry>,
    resolver: Arc<dyn ObjectResolver>,
    listener: Arc<dyn ChangeListener>,
}

impl QueueBuilder {
    pub fn registry(mut self, registry: Arc<MappingRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ObjectResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ChangeListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn build(self) -> ReconciliationQueue {
        let queue = &self.config.queue;
        let capacity = if queue.capacity == 0 {
            DEFAULT_QUEUE_CAPACITY
        } else {
            queue.capacity
        };
        let (sender, receiver) = bounded(capacity);
        ReconciliationQueue {
            inner: Arc::new(QueueInner {
                sender,
                receiver,
                capacity,
                alarm: DepthAlarm::new(queue),
                config: self.config,
                drain_lock: Mutex::new(()),
                stores: self.stores,
                factory: self.factory,
                registry: self.registry,
                resolver: self.resolver,
                listener: self.listener,
                submitted: AtomicU64::new(0),
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }
}

/// Shared handle to the queue; clones feed the same queue.
#[derive(Clone)]
pub struct ReconciliationQueue {
    inner: Arc<QueueInner>,
}

impl ReconciliationQueue {
    pub fn builder(
        config: &ProvenanceConfig,
        stores: WorkflowStores,
        factory: Arc<ContextFactory>,
    ) -> QueueBuilder {
        QueueBuilder {
            config: config.clone(),
            stores,
            factory,
            registry: Arc::new(MappingRegistry::new()),
            resolver: Arc::new(NoResolver),
            listener: Arc::new(NoopListener),
        }
    }

    pub fn depth(&self) -> usize {
        self.inner.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.inner.submitted.load(Ordering::Relaxed),
            processed: self.inner.processed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }

    /// Enqueues, blocking while the queue is full.
    pub fn submit(&self, request: UpdateRequest) -> Result<(), EngineError> {
        self.inner
            .sender
            .send(request)
            .map_err(|_| EngineError::QueueClosed)?;
        self.accepted();
        Ok(())
    }

    /// Enqueues, giving up with `QueueFull` after `timeout`.
    pub fn submit_timeout(
        &self,
        request: UpdateRequest,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        match self.inner.sender.send_timeout(request, timeout) {
            Ok(()) => {
                self.accepted();
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => Err(EngineError::QueueFull {
                capacity: self.inner.capacity,
            }),
            Err(SendTimeoutError::Disconnected(_)) => Err(EngineError::QueueClosed),
        }
    }

    fn accepted(&self) {
        self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        self.check_depth();
    }

    fn check_depth(&self) {
        let depth = self.depth();
        let check = self.inner.alarm.observe(depth);
        if let Some((threshold, next)) = check.growing {
            warn!(depth, threshold, next, "reconciliation queue is growing");
        }
        if check.critical {
            error!(
                depth,
                capacity = self.inner.capacity,
                "reconciliation queue close to capacity"
            );
        }
    }

    /// Applies everything currently queued. Returns once the queue is
    /// momentarily empty; later submissions wait for the next pass.
    pub fn drain_now(&self) -> DrainReport {
        let _exclusive = self.inner.drain_lock.lock();
        let inner = &*self.inner;
        let drain = DrainId::new();
        let _span = info_span!("drain", %drain).entered();

        let processor =
            RequestProcessor::new(&inner.factory, &inner.registry, inner.resolver.as_ref());
        let limit = inner.config.queue.touched_context_limit;
        let mut report = DrainReport::default();
        let mut effects = RequestEffects::default();
        let mut dm: Option<DataManager> = None;

        while let Ok(request) = inner.receiver.try_recv() {
            if dm.is_none() {
                match DataManager::open_live(&inner.stores, &inner.config) {
                    Ok(opened) => dm = Some(opened),
                    Err(e) => {
                        error!(request = %request, error = %e, "cannot open live store, request dropped");
                        report.failed += 1;
                        continue;
                    }
                }
            }
            let Some(dm) = dm.as_mut() else { continue };

            match processor.apply(dm, &request) {
                Ok(applied) => {
                    report.processed += 1;
                    effects.merge(applied);
                }
                Err(e) => {
                    report.failed += 1;
                    error!(request = %request, error = %e, "update request failed");
                }
            }
            if report.handled() % PROGRESS_EVERY == 0 {
                info!(
                    handled = report.handled(),
                    remaining = inner.receiver.len(),
                    "drain progress"
                );
            }

            if effects.removed_from.len() > limit {
                match dm.cleanup_meta_garbage(&effects.removed_from) {
                    Ok(summary) => add_cleanup(&mut report.cleanup, summary),
                    Err(e) => warn!(error = %e, "intermediate cleanup failed"),
                }
                effects.removed_from.clear();
            }
            if effects.added_to.len() > limit {
                effects.added_to.clear();
            }
        }

        if let Some(mut dm) = dm {
            match dm.cleanup_meta_garbage(&effects.removed_from) {
                Ok(summary) => add_cleanup(&mut report.cleanup, summary),
                Err(e) => error!(error = %e, "context cleanup failed"),
            }
            inner.listener.invalidate_caches();
            inner.listener.reindex(&effects.updated, &effects.deleted);
            info!(
                processed = report.processed,
                failed = report.failed,
                added = effects.statements_added,
                removed = effects.statements_removed,
                cleanup = %report.cleanup,
                "drain finished"
            );
        } else {
            debug!("queue empty");
        }

        inner
            .processed
            .fetch_add(report.processed as u64, Ordering::Relaxed);
        inner
            .failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        report.statements_added = effects.statements_added;
        report.statements_removed = effects.statements_removed;
        report.updated = effects.updated;
        report.deleted = effects.deleted;
        report
    }

    /// Starts the periodic drain thread.
    pub fn start(&self) -> Result<ConsumerHandle, EngineError> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let queue = self.clone();
        let interval = Duration::from_millis(self.inner.config.queue.drain_interval_ms.max(1));
        let thread = std::thread::Builder::new()
            .name("graphprov-drain".into())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            queue.drain_now();
                        }
                        recv(stop_rx) -> _ => {
                            queue.drain_now();
                            break;
                        }
                    }
                }
                debug!("drain consumer stopped");
            })
            .map_err(|e| EngineError::Consumer(e.to_string()))?;
        info!(interval_ms = interval.as_millis() as u64, "drain consumer started");
        Ok(ConsumerHandle {
            stop: stop_tx,
            thread: Some(thread),
        })
    }
}

fn add_cleanup(total: &mut CleanupSummary, summary: CleanupSummary) {
    total.checked += summary.checked;
    total.deleted += summary.deleted;
}

/// Running drain consumer. Dropping it stops the thread after a final pass.
pub struct ConsumerHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<(), EngineError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let _ = self.stop.try_send(());
        thread
            .join()
            .map_err(|_| EngineError::Consumer("drain thread panicked".into()))
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop_and_join() {
            error!(error = %e, "stopping drain consumer failed");
        }
    }
}
