//! # Spindle
//!
//! A bounded, reusable pool of worker threads.
//!
//! ## Features
//!
//! - **Worker reuse**: idle workers are handed new tasks most-recently-used first
//! - **Bounded concurrency**: never more live workers than the configured capacity
//! - **Back-pressure**: saturated submissions block, or fail fast in nonblocking mode
//!   or once the blocked-caller cap is reached
//! - **Idle reclamation**: a background reclaimer retires workers idle past their expiry
//! - **Lifecycle**: release, reboot and runtime capacity tuning
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Pool                               │
//! │  submit ─► retrieve_worker ─► idle store (LIFO) / spawn /    │
//! │                               block on condvar / reject      │
//! └─────────────────────────────────────────────────────────────┘
//!          │ task + handle                     ▲ revert_worker
//!          ▼                                   │
//! ┌──────────────────────┐           ┌──────────────────────────┐
//! │  Worker thread       │ ────────► │  WorkerStore             │
//! │  (inbox: 0/1 slots)  │           │  stack | ring            │
//! └──────────────────────┘           └──────────────────────────┘
//!                                              ▲
//!                                              │ retrieve_expired
//!                                    ┌──────────────────────────┐
//!                                    │  Reclaimer (every expiry)│
//!                                    └──────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use spindle::{Pool, PoolError, PoolOptions};
//! use std::time::Duration;
//!
//! let options = PoolOptions::default()
//!     .with_nonblocking(true)
//!     .with_expiry_duration(Duration::from_secs(5));
//! let pool = Pool::new(8, options)?;
//!
//! pool.submit(|| {
//!     // work
//! })?;
//!
//! pool.release();
//! assert!(matches!(pool.submit(|| {}), Err(PoolError::PoolClosed)));
//! # Ok::<(), PoolError>(())
//! ```

pub mod error;
pub mod options;
pub mod pool;

mod reclaimer;
mod store;
mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{PoolError, Result};
    pub use crate::options::{PoolOptions, StoreKind};
    pub use crate::pool::{Pool, PoolStats, PoolStatus, UNBOUNDED};
}

// Re-export key types at crate root
pub use error::{PoolError, Result};
pub use options::{handoff_capacity, PanicHandler, PoolOptions, StoreKind, DEFAULT_EXPIRY};
pub use pool::{Pool, PoolStats, PoolStatus, UNBOUNDED};
