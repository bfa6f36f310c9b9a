//! Worker: one reusable OS thread bound to a private inbox
//!
//! The pool owns a [`Worker`] handle while the worker is idle; the handle
//! travels with each task into the inbox and comes back to the pool through
//! `revert_worker` when the task finishes. The thread itself only holds a
//! weak reference to the pool.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, trace};

use crate::options::PanicHandler;
use crate::pool::Shared;

/// Unit of work accepted by the pool
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Inbox item: exactly one arrives between two executions
pub(crate) enum Message {
    /// Run the task, then hand the worker back to the pool
    Run(Task, Worker),
    /// Retirement sentinel
    Retire,
}

/// Handle to an idle or checked-out worker
pub(crate) struct Worker {
    id: u64,
    inbox: Sender<Message>,
    last_idle: Instant,
}

impl Worker {
    /// Start a worker thread and return its handle
    pub(crate) fn spawn(shared: &Arc<Shared>, id: u64) -> io::Result<Self> {
        let options = shared.options();
        let (inbox, rx) = bounded(options.handoff_capacity.min(1));

        let mut builder =
            thread::Builder::new().name(format!("{}-worker-{}", options.thread_name, id));
        if let Some(size) = options.stack_size {
            builder = builder.stack_size(size);
        }

        let worker_loop = WorkerLoop {
            id,
            inbox: rx,
            pool: Arc::downgrade(shared),
            panic_handler: options.panic_handler.clone(),
        };
        builder.spawn(move || worker_loop.run())?;

        debug!(worker_id = id, "Spawned worker");
        Ok(Self {
            id,
            inbox,
            last_idle: Instant::now(),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Hand a task to the worker. Gives the task back if the thread is gone.
    pub(crate) fn assign(self, task: Task) -> Result<(), Task> {
        let inbox = self.inbox.clone();
        inbox.send(Message::Run(task, self)).map_err(|e| match e.0 {
            Message::Run(task, _) => task,
            Message::Retire => unreachable!("sent a Run message"),
        })
    }

    /// Send the retirement sentinel
    pub(crate) fn retire(self) {
        trace!(worker_id = self.id, "Retiring worker");
        // A closed inbox means the thread already exited
        let _ = self.inbox.send(Message::Retire);
    }

    pub(crate) fn mark_idle(&mut self, now: Instant) {
        self.last_idle = now;
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_idle)
    }

    /// Handle with no thread behind it, for store tests
    #[cfg(test)]
    pub(crate) fn detached(id: u64, last_idle: Instant) -> (Self, Receiver<Message>) {
        let (inbox, rx) = bounded(1);
        (
            Self {
                id,
                inbox,
                last_idle,
            },
            rx,
        )
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("last_idle", &self.last_idle)
            .finish()
    }
}

/// Thread side of a worker
struct WorkerLoop {
    id: u64,
    inbox: Receiver<Message>,
    pool: Weak<Shared>,
    panic_handler: Option<PanicHandler>,
}

impl WorkerLoop {
    fn run(self) {
        let mut slot = RunningSlot {
            pool: &self.pool,
            held: true,
        };

        while let Ok(message) = self.inbox.recv() {
            match message {
                Message::Retire => break,
                Message::Run(task, worker) => {
                    self.execute(task);

                    let Some(shared) = self.pool.upgrade() else {
                        // Pool dropped while the task ran
                        break;
                    };
                    if !shared.revert_worker(worker) {
                        // Rejected: revert_worker already released the slot
                        slot.held = false;
                        break;
                    }
                }
            }
        }

        debug!(worker_id = self.id, "Worker exited");
    }

    fn execute(&self, task: Task) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            match &self.panic_handler {
                Some(handler) => handler(payload),
                None => error!(
                    worker_id = self.id,
                    panic = %panic_message(payload.as_ref()),
                    "Task panicked"
                ),
            }
        }
    }
}

/// A worker's share of the pool's running count, released when the
/// thread exits for any reason, including a panicking fault sink.
struct RunningSlot<'a> {
    pool: &'a Weak<Shared>,
    held: bool,
}

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            if let Some(shared) = self.pool.upgrade() {
                shared.retire_worker();
            }
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
