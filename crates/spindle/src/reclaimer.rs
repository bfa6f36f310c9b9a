//! Idle-worker reclaimer
//!
//! A background thread that ticks every expiry interval and retires the
//! workers that have sat idle for longer than that.

use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use tracing::{debug, error};

use crate::pool::Shared;

/// Handle to a running reclaimer thread
pub(crate) struct Reclaimer {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Reclaimer {
    /// Start ticking for `shared`; the thread only holds a weak reference
    pub(crate) fn start(shared: &Arc<Shared>) -> io::Result<Self> {
        let options = shared.options();
        let interval = options.effective_expiry();
        let (stop, stop_rx) = bounded(1);
        let pool = Arc::downgrade(shared);

        let handle = thread::Builder::new()
            .name(format!("{}-reclaimer", options.thread_name))
            .spawn(move || reclaim_loop(pool, interval, stop_rx))?;

        debug!(interval_ms = interval.as_millis() as u64, "Started reclaimer");
        Ok(Self { stop, handle })
    }

    /// Stop the loop and wait for the thread to exit
    pub(crate) fn stop(self) {
        // Dropping the sender disconnects the stop channel
        drop(self.stop);
        if self.handle.join().is_err() {
            error!("Reclaimer thread panicked");
        }
    }
}

fn reclaim_loop(pool: Weak<Shared>, interval: Duration, stop: Receiver<()>) {
    let ticker = tick(interval);

    loop {
        select! {
            recv(ticker) -> _ => {
                let Some(shared) = pool.upgrade() else {
                    break;
                };
                if shared.is_closed() {
                    debug!("Reclaim loop: pool closed");
                    break;
                }
                shared.purge_expired();
            }
            recv(stop) -> _ => {
                debug!("Reclaim loop: stop requested");
                break;
            }
        }
    }

    debug!("Reclaim loop exited");
}
