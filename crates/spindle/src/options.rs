//! Pool options
//!
//! An immutable bundle of admission and recycling parameters, built once
//! before the pool is constructed.

use std::any::Any;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Expiry used when none (or zero) is configured
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(1);

/// Default worker thread name prefix
pub const DEFAULT_THREAD_NAME: &str = "spindle";

/// Fault sink receiving the payload of a task that panicked
pub type PanicHandler = Arc<dyn Fn(Box<dyn Any + Send>) + Send + Sync>;

/// Idle-store strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Growable LIFO array
    Stack,
    /// Circular buffer that grows in fixed steps
    Ring,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack => write!(f, "stack"),
            Self::Ring => write!(f, "ring"),
        }
    }
}

/// Inbox slot count for a given hardware parallelism.
///
/// A single hardware thread gets a synchronous handoff (0); anything wider
/// gets one buffered slot so the submitter does not wait for the worker to
/// be scheduled.
pub fn handoff_capacity(parallelism: usize) -> usize {
    if parallelism <= 1 {
        0
    } else {
        1
    }
}

/// Pool options
///
/// # Example
///
/// ```
/// use spindle::PoolOptions;
/// use std::time::Duration;
///
/// let options = PoolOptions::default()
///     .with_nonblocking(true)
///     .with_expiry_duration(Duration::from_millis(500));
/// assert!(options.nonblocking);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Reserve all idle-store slots at construction; disables `tune`
    pub pre_alloc: bool,

    /// Cap on concurrently blocked submitters (0 = unlimited)
    pub max_blocking_tasks: usize,

    /// Submit never blocks; fails with `PoolOverloaded` instead
    pub nonblocking: bool,

    /// Idle-eviction window, also the reclaimer tick interval
    #[serde(with = "duration_millis")]
    pub expiry_duration: Duration,

    /// Explicit idle-store strategy (None = ring when pre-allocated, else stack)
    pub store: Option<StoreKind>,

    /// Worker inbox slots: 0 for synchronous handoff, 1 for a buffered slot
    pub handoff_capacity: usize,

    /// Worker thread name prefix
    pub thread_name: String,

    /// Worker thread stack size in bytes (None = platform default)
    pub stack_size: Option<usize>,

    /// Receives panics raised by tasks
    #[serde(skip)]
    pub panic_handler: Option<PanicHandler>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            pre_alloc: false,
            max_blocking_tasks: 0,
            nonblocking: false,
            expiry_duration: DEFAULT_EXPIRY,
            store: None,
            handoff_capacity: handoff_capacity(parallelism),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
            panic_handler: None,
        }
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("pre_alloc", &self.pre_alloc)
            .field("max_blocking_tasks", &self.max_blocking_tasks)
            .field("nonblocking", &self.nonblocking)
            .field("expiry_duration", &self.expiry_duration)
            .field("store", &self.store)
            .field("handoff_capacity", &self.handoff_capacity)
            .field("thread_name", &self.thread_name)
            .field("stack_size", &self.stack_size)
            .field("panic_handler", &self.panic_handler.is_some())
            .finish()
    }
}

impl PoolOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create options from environment variables
    ///
    /// Environment variables (all optional, unset keeps the default):
    /// - `SPINDLE_PRE_ALLOC`: `true`/`1` to pre-allocate
    /// - `SPINDLE_MAX_BLOCKING_TASKS`: blocked-caller cap
    /// - `SPINDLE_NONBLOCKING`: `true`/`1` for fail-fast submission
    /// - `SPINDLE_EXPIRY_MS`: idle expiry in milliseconds
    /// - `SPINDLE_THREAD_NAME`: worker thread name prefix
    /// - `SPINDLE_STACK_SIZE`: worker stack size in bytes
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(v) = env_flag("SPINDLE_PRE_ALLOC") {
            options.pre_alloc = v;
        }
        if let Some(v) = env_parse("SPINDLE_MAX_BLOCKING_TASKS") {
            options.max_blocking_tasks = v;
        }
        if let Some(v) = env_flag("SPINDLE_NONBLOCKING") {
            options.nonblocking = v;
        }
        if let Some(ms) = env_parse::<u64>("SPINDLE_EXPIRY_MS") {
            options.expiry_duration = Duration::from_millis(ms);
        }
        if let Ok(name) = env::var("SPINDLE_THREAD_NAME") {
            options.thread_name = name;
        }
        if let Some(v) = env_parse("SPINDLE_STACK_SIZE") {
            options.stack_size = Some(v);
        }

        options
    }

    /// Reserve all idle-store slots at construction
    pub fn with_pre_alloc(mut self, pre_alloc: bool) -> Self {
        self.pre_alloc = pre_alloc;
        self
    }

    /// Set the blocked-caller cap (0 = unlimited)
    pub fn with_max_blocking_tasks(mut self, max: usize) -> Self {
        self.max_blocking_tasks = max;
        self
    }

    /// Fail fast instead of blocking when saturated
    pub fn with_nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Set the idle-eviction window
    pub fn with_expiry_duration(mut self, expiry: Duration) -> Self {
        self.expiry_duration = expiry;
        self
    }

    /// Force an idle-store strategy
    pub fn with_store(mut self, kind: StoreKind) -> Self {
        self.store = Some(kind);
        self
    }

    /// Set the worker inbox slot count (clamped to 0 or 1)
    pub fn with_handoff_capacity(mut self, slots: usize) -> Self {
        self.handoff_capacity = slots.min(1);
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the worker thread stack size
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Install a fault sink for panicking tasks
    pub fn with_panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Box<dyn Any + Send>) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Arc::new(handler));
        self
    }

    /// Expiry with the zero value replaced by the default
    pub fn effective_expiry(&self) -> Duration {
        if self.expiry_duration.is_zero() {
            DEFAULT_EXPIRY
        } else {
            self.expiry_duration
        }
    }

    /// Idle-store strategy after applying the pre-allocation default
    pub fn store_kind(&self) -> StoreKind {
        match self.store {
            Some(kind) => kind,
            None if self.pre_alloc => StoreKind::Ring,
            None => StoreKind::Stack,
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable pool option");
            None
        }
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
