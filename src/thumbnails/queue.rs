//! Thumbnail worker queue for background loading.
//!
//! - Bounded worker pool (1-4 threads) pulling from a bounded flume channel
//! - Requests are submitted visible-first, then outward by row distance
//! - Each in-flight request carries a cancellation token owned by the UI thread
//! - Requests are stamped with a generation; results from a cancelled or
//!   superseded generation come back as `Cancelled` and never reach the cache
//! - Results flow back on an unbounded channel the UI thread drains per frame

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use flume::{Receiver, Sender};
use tracing::{debug, error, trace, warn};

use super::cache::{ThumbnailCache, DEFAULT_MAX_MEMORY_MB};
use super::source::{FileThumbnailSource, ThumbnailSource};
use super::Bitmap;
use crate::error::ThumbnailError;
use crate::layout::IndexWindow;
use crate::models::MediaId;

/// Default number of worker threads.
const DEFAULT_WORKERS: usize = 2;

/// Maximum number of worker threads.
const MAX_WORKERS: usize = 4;

/// Maximum number of queued requests.
const MAX_QUEUE_SIZE: usize = 256;

/// How long an idle worker waits before re-checking the shutdown flag.
const WORKER_POLL: Duration = Duration::from_millis(100);

/// A request to load a thumbnail.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub id: MediaId,
    /// Source file, if the media has one.
    pub path: Option<PathBuf>,
    /// Lower is more urgent; 0 is the visible window.
    pub priority: u32,
    /// Position in the list when the request was made.
    pub index: usize,
}

impl ThumbnailRequest {
    pub fn new(id: MediaId, path: Option<PathBuf>) -> Self {
        Self {
            id,
            path,
            priority: 0,
            index: 0,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// Result sent back to the UI thread.
#[derive(Debug, Clone)]
pub struct ThumbnailResult {
    pub id: MediaId,
    /// Generation of the request this answers.
    pub generation: u64,
    pub outcome: Result<Bitmap, ThumbnailError>,
}

impl ThumbnailResult {
    pub fn new(id: MediaId, outcome: Result<Bitmap, ThumbnailError>) -> Self {
        Self {
            id,
            generation: 0,
            outcome,
        }
    }
}

/// What `ThumbnailQueue::request` did with a request.
#[derive(Debug, Clone)]
pub enum RequestStatus {
    /// Already in the memory cache; nothing was queued.
    Cached(Bitmap),
    Queued,
    /// A request for the same id is still in flight.
    AlreadyPending,
    /// Queue full or workers gone. The caller may retry later.
    Rejected,
}

struct Job {
    request: ThumbnailRequest,
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

/// Bookkeeping for a request the UI thread is still waiting on.
struct InFlight {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl InFlight {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Indices of `outer` in load order with their priorities.
///
/// The visible window comes first in index order at priority 0, then the
/// remaining indices by row distance, rows below before rows above.
pub fn waterfall_order(
    visible: IndexWindow,
    outer: IndexWindow,
    columns: usize,
) -> Vec<(usize, u32)> {
    let columns = columns.max(1);
    let mut order: Vec<(usize, u32, bool)> = outer
        .iter()
        .map(|index| {
            if visible.contains(index) {
                (index, 0, false)
            } else if index < visible.first {
                let rows = (visible.first - index).div_ceil(columns);
                (index, rows as u32, true)
            } else {
                let rows = (index - visible.last).div_ceil(columns);
                (index, rows as u32, false)
            }
        })
        .collect();

    // Above the window, nearer cells first
    order.sort_by_key(|&(index, priority, above)| {
        let nearness = if above { usize::MAX - index } else { index };
        (priority, above, nearness)
    });
    order
        .into_iter()
        .map(|(index, priority, _)| (index, priority))
        .collect()
}

/// Worker queue for thumbnail loading.
pub struct ThumbnailQueue {
    request_tx: Sender<Job>,
    result_rx: Receiver<ThumbnailResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    /// Requests not yet answered, by id. UI thread only.
    in_flight: HashMap<MediaId, InFlight>,
    next_generation: u64,
    cache: ThumbnailCache,
    source: Arc<dyn ThumbnailSource>,
}

impl ThumbnailQueue {
    fn spawn(
        workers: usize,
        cache: ThumbnailCache,
        source: Arc<dyn ThumbnailSource>,
    ) -> anyhow::Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        let (request_tx, request_rx) = flume::bounded(MAX_QUEUE_SIZE);
        let (result_tx, result_rx) = flume::unbounded();

        let shutdown = Arc::new(AtomicBool::new(false));

        let mut worker_handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let ctx = WorkerContext {
                worker_id,
                rx: request_rx.clone(),
                tx: result_tx.clone(),
                shutdown: Arc::clone(&shutdown),
                cache: cache.clone(),
                source: Arc::clone(&source),
            };

            let handle = thread::Builder::new()
                .name(format!("thumb-worker-{}", worker_id))
                .spawn(move || worker_loop(ctx))
                .context("Failed to spawn thumbnail worker")?;
            worker_handles.push(handle);
        }

        debug!(num_workers, "Started thumbnail worker queue");

        Ok(Self {
            request_tx,
            result_rx,
            workers: worker_handles,
            shutdown,
            in_flight: HashMap::new(),
            next_generation: 1,
            cache,
            source,
        })
    }

    /// Submit a request unless the bitmap is cached or already in flight.
    pub fn request(&mut self, req: ThumbnailRequest) -> RequestStatus {
        if self.in_flight.contains_key(&req.id) {
            trace!(id = %req.id, "Request already pending");
            return RequestStatus::AlreadyPending;
        }

        if let Some(bitmap) = self.cache.get(req.id) {
            trace!(id = %req.id, "Thumbnail already cached");
            return RequestStatus::Cached(bitmap);
        }

        let id = req.id;
        let generation = self.next_generation;
        let cancelled = Arc::new(AtomicBool::new(false));
        let job = Job {
            request: req,
            generation,
            cancelled: Arc::clone(&cancelled),
        };

        match self.request_tx.try_send(job) {
            Ok(()) => {
                self.next_generation += 1;
                self.in_flight.insert(
                    id,
                    InFlight {
                        generation,
                        cancelled,
                    },
                );
                RequestStatus::Queued
            }
            Err(flume::TrySendError::Full(_)) => {
                warn!(%id, "Thumbnail queue full, dropping request");
                RequestStatus::Rejected
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                error!("Thumbnail queue disconnected");
                RequestStatus::Rejected
            }
        }
    }

    /// Cancel a pending request. Returns false if nothing was in flight.
    ///
    /// A worker that already started still finishes, but its bitmap is not
    /// cached and its result comes back as `Cancelled`.
    pub fn cancel(&mut self, id: MediaId) -> bool {
        match self.in_flight.remove(&id) {
            Some(entry) => {
                entry.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight request whose id fails `keep`.
    pub fn cancel_unless(&mut self, mut keep: impl FnMut(MediaId) -> bool) -> Vec<MediaId> {
        let dropped: Vec<MediaId> = self
            .in_flight
            .keys()
            .copied()
            .filter(|id| !keep(*id))
            .collect();
        for id in &dropped {
            self.cancel(*id);
        }
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Cancelled off-screen thumbnail requests");
        }
        dropped
    }

    pub fn cancel_all(&mut self) -> Vec<MediaId> {
        self.cancel_unless(|_| false)
    }

    /// Drain completed results (non-blocking).
    pub fn poll_results(&mut self) -> Vec<ThumbnailResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(self.settle(result));
        }
        results
    }

    /// Wait up to `timeout` for the next result.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ThumbnailResult> {
        let result = self.result_rx.recv_timeout(timeout).ok()?;
        Some(self.settle(result))
    }

    /// Retires the in-flight entry a result answers. A result from an older
    /// generation leaves the newer request pending and is reported as
    /// `Cancelled`.
    fn settle(&mut self, mut result: ThumbnailResult) -> ThumbnailResult {
        let current = self
            .in_flight
            .get(&result.id)
            .is_some_and(|entry| entry.generation == result.generation);
        if current {
            self.in_flight.remove(&result.id);
        } else if !matches!(result.outcome, Err(ThumbnailError::Cancelled)) {
            trace!(
                id = %result.id,
                generation = result.generation,
                "Discarding superseded result"
            );
            result.outcome = Err(ThumbnailError::Cancelled);
        }
        result
    }

    /// Forget the cached bitmap for `id` in memory and in the source.
    ///
    /// A load already running for `id` is cancelled first, so its bitmap
    /// cannot land in the cache afterwards.
    pub fn invalidate(&mut self, id: MediaId) {
        self.cancel(id);
        self.cache.remove(id);
        self.source.invalidate(id);
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn is_pending(&self, id: MediaId) -> bool {
        self.in_flight.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Shutdown the worker pool.
    pub fn shutdown(&mut self) {
        debug!("Shutting down thumbnail queue");
        self.shutdown.store(true, Ordering::SeqCst);
        self.cancel_all();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Thumbnail queue shutdown complete");
    }
}

impl Drop for ThumbnailQueue {
    fn drop(&mut self) {
        if !self.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for ThumbnailQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailQueue")
            .field("workers", &self.workers.len())
            .field("in_flight", &self.in_flight.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

struct WorkerContext {
    worker_id: usize,
    rx: Receiver<Job>,
    tx: Sender<ThumbnailResult>,
    shutdown: Arc<AtomicBool>,
    cache: ThumbnailCache,
    source: Arc<dyn ThumbnailSource>,
}

fn worker_loop(ctx: WorkerContext) {
    let worker_id = ctx.worker_id;
    debug!(worker_id, "Thumbnail worker started");

    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            break;
        }

        match ctx.rx.recv_timeout(WORKER_POLL) {
            Ok(job) => {
                let result = process_job(&job, &ctx.cache, ctx.source.as_ref());
                if let Err(e) = ctx.tx.send(result) {
                    warn!(worker_id, error = ?e, "Failed to send thumbnail result");
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker_id, "Thumbnail worker stopped");
}

fn process_job(job: &Job, cache: &ThumbnailCache, source: &dyn ThumbnailSource) -> ThumbnailResult {
    let id = job.request.id;
    let generation = job.generation;
    let cancelled = || job.cancelled.load(Ordering::Acquire);
    let answer = |outcome: Result<Bitmap, ThumbnailError>| ThumbnailResult {
        id,
        generation,
        outcome,
    };

    if cancelled() {
        trace!(%id, "Skipping cancelled thumbnail request");
        return answer(Err(ThumbnailError::Cancelled));
    }

    trace!(
        %id,
        index = job.request.index,
        priority = job.request.priority,
        "Processing thumbnail request"
    );
    let bitmap = match source.load(&job.request) {
        Ok(img) => Bitmap::new(img),
        Err(e) => {
            warn!(%id, error = %e, "Failed to load thumbnail");
            return answer(Err(e));
        }
    };

    // Checked under the cache lock so an invalidate cannot slip in between
    if !cache.insert_unless(id, Bitmap::clone(&bitmap), cancelled) {
        trace!(%id, "Thumbnail cancelled while loading");
        return answer(Err(ThumbnailError::Cancelled));
    }
    answer(Ok(bitmap))
}

/// Builder for ThumbnailQueue with configuration options.
#[derive(Debug, Clone)]
pub struct ThumbnailQueueBuilder {
    workers: usize,
    max_memory_mb: usize,
    cache_dir: Option<PathBuf>,
}

impl ThumbnailQueueBuilder {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            cache_dir: None,
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    pub fn max_memory_mb(mut self, mb: usize) -> Self {
        self.max_memory_mb = mb;
        self
    }

    /// Persist generated thumbnails under `dir` (file-backed queues only).
    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    pub fn build(self, source: Arc<dyn ThumbnailSource>) -> anyhow::Result<ThumbnailQueue> {
        ThumbnailQueue::spawn(self.workers, ThumbnailCache::new(self.max_memory_mb), source)
    }

    /// Build a queue that decodes files from disk into `box_width` x `box_height`.
    pub fn build_file_backed(
        self,
        box_width: u32,
        box_height: u32,
    ) -> anyhow::Result<ThumbnailQueue> {
        let mut source = FileThumbnailSource::new(box_width, box_height);
        if let Some(dir) = self.cache_dir.clone() {
            source = source.with_cache_dir(dir);
        }
        self.build(Arc::new(source))
    }
}

impl Default for ThumbnailQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}
