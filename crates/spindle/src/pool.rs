//! Worker pool
//!
//! Admission control, worker recycling and lifecycle for a bounded set of
//! reusable worker threads.
//!
//! # Admission
//!
//! A submission is served, in order of preference, by:
//! 1. the most recently returned idle worker,
//! 2. a newly spawned worker while `running < capacity`,
//! 3. parking on the pool's condition variable until a worker comes back,
//!    unless the pool is nonblocking or the blocked-caller cap is reached,
//!    in which case the submission fails with `PoolOverloaded`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{PoolError, Result};
use crate::options::PoolOptions;
use crate::reclaimer::Reclaimer;
use crate::store::{new_store, WorkerStore};
use crate::worker::{Task, Worker};

/// Capacity value meaning "no limit"
pub const UNBOUNDED: isize = -1;

const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pool lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Accepting submissions
    Open,
    /// Released; submissions fail until reboot
    Closed,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Point-in-time view of the pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured capacity (-1 = unbounded)
    pub capacity: isize,
    /// Workers alive, idle or busy
    pub running: usize,
    /// Workers parked in the idle store
    pub idle: usize,
    /// Callers blocked in submit
    pub waiting: usize,
    pub status: PoolStatus,
}

/// State shared by pool handles, workers and the reclaimer
pub(crate) struct Shared {
    capacity: AtomicIsize,
    running: AtomicUsize,
    /// Mutated only while `idle` is locked
    waiting: AtomicUsize,
    closed: AtomicBool,
    idle: Mutex<Box<dyn WorkerStore>>,
    cond: Condvar,
    options: PoolOptions,
    next_worker_id: AtomicU64,
    reclaimer: Mutex<Option<Reclaimer>>,
}

impl Shared {
    pub(crate) fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn cap(&self) -> isize {
        self.capacity.load(Ordering::SeqCst)
    }

    fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    fn has_room(&self) -> bool {
        let cap = self.cap();
        cap == UNBOUNDED || self.running() < cap as usize
    }

    fn over_capacity(&self) -> bool {
        let cap = self.cap();
        cap != UNBOUNDED && self.running() > cap as usize
    }

    /// Obtain a worker for one task, blocking if the policy allows it
    fn retrieve_worker(self: &Arc<Self>) -> Result<Worker> {
        let mut idle = self.idle.lock();

        loop {
            if self.is_closed() {
                return Err(PoolError::PoolClosed);
            }

            if let Some(worker) = idle.detach() {
                return Ok(worker);
            }

            if self.has_room() {
                self.running.fetch_add(1, Ordering::SeqCst);
                drop(idle);
                return self.spawn_worker();
            }

            if self.options.nonblocking {
                return Err(PoolError::PoolOverloaded);
            }
            let max_blocking = self.options.max_blocking_tasks;
            if max_blocking != 0 && self.waiting.load(Ordering::SeqCst) >= max_blocking {
                return Err(PoolError::PoolOverloaded);
            }

            self.waiting.fetch_add(1, Ordering::SeqCst);
            self.cond.wait(&mut idle);
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Start a worker whose slot was already counted in `running`
    fn spawn_worker(self: &Arc<Self>) -> Result<Worker> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        Worker::spawn(self, id).map_err(|e| {
            warn!(worker_id = id, error = %e, "Failed to spawn worker");
            self.retire_worker();
            PoolError::from(e)
        })
    }

    /// Return a worker to the idle store after its task finished.
    ///
    /// Returns false when the worker must retire instead; its slot has
    /// then already been released from `running`.
    pub(crate) fn revert_worker(&self, mut worker: Worker) -> bool {
        let mut idle = self.idle.lock();

        if self.is_closed() || self.over_capacity() {
            self.running.fetch_sub(1, Ordering::SeqCst);
            drop(idle);
            debug!(worker_id = worker.id(), "Worker rejected on revert");
            self.cond.notify_one();
            return false;
        }

        worker.mark_idle(Instant::now());
        idle.insert(worker);
        drop(idle);
        self.cond.notify_one();
        true
    }

    /// Release the `running` slot of a worker that exited
    pub(crate) fn retire_worker(&self) {
        let idle = self.idle.lock();
        self.running.fetch_sub(1, Ordering::SeqCst);
        drop(idle);
        self.cond.notify_one();
    }

    /// One reclaimer pass: retire every worker idle past the expiry
    pub(crate) fn purge_expired(&self) -> usize {
        let expired = self
            .idle
            .lock()
            .retrieve_expired(self.options.effective_expiry());

        let reclaimed = expired.len();
        // Sentinels go out without the lock held
        for worker in expired {
            worker.retire();
        }
        if reclaimed > 0 {
            debug!(reclaimed, running = self.running(), "Reclaimed idle workers");
        }

        // Every worker may be gone with callers still parked; none will
        // revert to wake them, so wake them all.
        let waiting = self.waiting.load(Ordering::SeqCst);
        if self.running() == 0 || (waiting > 0 && self.has_room()) {
            drop(self.idle.lock());
            self.cond.notify_all();
        }
        reclaimed
    }
}

/// A bounded pool of reusable worker threads
///
/// Cloning a `Pool` yields another handle to the same pool. Idle workers and
/// the reclaimer exit once the last handle is dropped.
///
/// # Example
///
/// ```
/// use spindle::{Pool, PoolOptions};
/// use std::sync::mpsc;
///
/// let pool = Pool::new(4, PoolOptions::default()).unwrap();
/// let (tx, rx) = mpsc::channel();
/// pool.submit(move || tx.send(21 * 2).unwrap()).unwrap();
/// assert_eq!(rx.recv().unwrap(), 42);
/// pool.release();
/// ```
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

impl Pool {
    /// Create a pool
    ///
    /// A negative `capacity` means unbounded. Zero capacity, or
    /// pre-allocation on an unbounded pool, fails with `InvalidSize`.
    pub fn new(capacity: isize, options: PoolOptions) -> Result<Self> {
        let capacity = match capacity {
            0 => return Err(PoolError::InvalidSize),
            c if c < 0 => UNBOUNDED,
            c => c,
        };
        if options.pre_alloc && capacity == UNBOUNDED {
            return Err(PoolError::InvalidSize);
        }

        let kind = options.store_kind();
        let slots = if options.pre_alloc { capacity as usize } else { 0 };

        let shared = Arc::new(Shared {
            capacity: AtomicIsize::new(capacity),
            running: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            idle: Mutex::new(new_store(kind, slots)),
            cond: Condvar::new(),
            options,
            next_worker_id: AtomicU64::new(0),
            reclaimer: Mutex::new(None),
        });

        let reclaimer = Reclaimer::start(&shared)?;
        *shared.reclaimer.lock() = Some(reclaimer);

        info!(
            capacity,
            store = %kind,
            expiry_ms = shared.options.effective_expiry().as_millis() as u64,
            "Created worker pool"
        );
        Ok(Self { shared })
    }

    /// Create a pool with default options
    pub fn with_capacity(capacity: isize) -> Result<Self> {
        Self::new(capacity, PoolOptions::default())
    }

    /// Create a pool with an explicit idle expiry in seconds
    ///
    /// Negative expiry fails with `InvalidExpiry`; zero uses the default.
    pub fn with_timing(capacity: isize, expiry_secs: i64) -> Result<Self> {
        if expiry_secs < 0 {
            return Err(PoolError::InvalidExpiry);
        }
        let options =
            PoolOptions::default().with_expiry_duration(Duration::from_secs(expiry_secs as u64));
        Self::new(capacity, options)
    }

    /// Run `task` on a pool worker
    ///
    /// Blocks while the pool is saturated unless the pool is nonblocking or
    /// the blocked-caller cap is reached.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let mut task: Task = Box::new(task);
        loop {
            let worker = self.shared.retrieve_worker()?;
            let worker_id = worker.id();
            match worker.assign(task) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    warn!(worker_id, "Worker inbox closed, retrying submission");
                    task = returned;
                }
            }
        }
    }

    /// Workers alive, idle or busy
    pub fn running(&self) -> usize {
        self.shared.running()
    }

    /// Remaining capacity; -1 when unbounded, never below 0 otherwise
    pub fn free(&self) -> isize {
        let cap = self.cap();
        if cap == UNBOUNDED {
            return UNBOUNDED;
        }
        (cap - self.running() as isize).max(0)
    }

    /// Configured capacity; -1 when unbounded
    pub fn cap(&self) -> isize {
        self.shared.cap()
    }

    /// Callers currently blocked in submit
    pub fn waiting(&self) -> usize {
        self.shared.waiting.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn status(&self) -> PoolStatus {
        if self.is_closed() {
            PoolStatus::Closed
        } else {
            PoolStatus::Open
        }
    }

    /// Snapshot of the counters; takes the pool lock to count idle workers
    pub fn stats(&self) -> PoolStats {
        let idle = self.shared.idle.lock().len();
        PoolStats {
            capacity: self.cap(),
            running: self.running(),
            idle,
            waiting: self.waiting(),
            status: self.status(),
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.shared.options
    }

    /// Change the capacity
    ///
    /// No-op for unbounded or pre-allocated pools, non-positive sizes, or
    /// the current size. Shrinking is lazy: surplus workers retire as they
    /// finish their tasks.
    pub fn tune(&self, size: isize) {
        let shared = &self.shared;
        let old = shared.cap();
        if old == UNBOUNDED || size <= 0 || size == old || shared.options.pre_alloc {
            return;
        }

        {
            let _idle = shared.idle.lock();
            shared.capacity.store(size, Ordering::SeqCst);
        }
        debug!(old, new = size, "Tuned pool capacity");

        if size > old && self.waiting() > 0 {
            if size - old == 1 {
                shared.cond.notify_one();
            } else {
                shared.cond.notify_all();
            }
        }
    }

    /// Close the pool and retire its idle workers
    ///
    /// Busy workers finish their current task and then retire. Calling this
    /// on a closed pool does nothing.
    #[instrument(skip(self))]
    pub fn release(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let idle = shared.idle.lock().reset();
        let retired = idle.len();
        for worker in idle {
            worker.retire();
        }
        // Blocked callers wake up to PoolClosed
        shared.cond.notify_all();

        if let Some(reclaimer) = shared.reclaimer.lock().take() {
            reclaimer.stop();
        }

        info!(retired, running = self.running(), "Released worker pool");
    }

    /// Release, then wait up to `timeout` for every worker to exit
    pub fn release_timeout(&self, timeout: Duration) -> Result<()> {
        self.release();

        let deadline = Instant::now() + timeout;
        loop {
            if self.running() == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(running = self.running(), "Release timeout reached");
                return Err(PoolError::ReleaseTimeout(timeout));
            }
            thread::sleep(RELEASE_POLL_INTERVAL);
        }
    }

    /// Reopen a released pool and restart its reclaimer
    ///
    /// Does nothing on an open pool. Capacity and running count are kept.
    #[instrument(skip(self))]
    pub fn reboot(&self) -> Result<()> {
        let shared = &self.shared;
        if shared
            .closed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let mut slot = shared.reclaimer.lock();
        match Reclaimer::start(shared) {
            Ok(reclaimer) => {
                *slot = Some(reclaimer);
                info!(capacity = self.cap(), "Rebooted worker pool");
                Ok(())
            }
            Err(e) => {
                shared.closed.store(true, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.cap())
            .field("running", &self.running())
            .field("waiting", &self.waiting())
            .field("status", &self.status())
            .finish()
    }
}
