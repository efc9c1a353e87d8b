//! The background status poller.
//!
//! One worker thread per connected session keeps observers live by refreshing
//! the cache at the configured max-age cadence.  The worker only exists while
//! the session is connected: it is started by a successful connect, exits on
//! disconnect, and a shutdown flag paired with a condvar wakes the sleep
//! promptly so teardown is bounded.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Default)]
struct PollerState {
    shutdown: bool,
    thread: Option<JoinHandle<()>>,
}

/// Owner of the poll worker thread.
#[derive(Debug, Default)]
pub(crate) struct Poller {
    state: Mutex<PollerState>,
    wake: Condvar,
}

impl Poller {
    /// Starts the worker.  `tick` runs once per interval and returns whether
    /// polling should continue; it must not call back into this poller.
    pub(crate) fn start(
        self: &Arc<Self>,
        interval: Duration,
        tick: impl Fn() -> bool + Send + 'static,
    ) {
        // A leftover worker from a previous connect epoch is told to stop
        // and reaped before the new one starts.
        self.stop_and_join();

        let poller = Arc::clone(self);
        let mut state = self.state.lock().unwrap();
        state.shutdown = false;
        state.thread = Some(thread::spawn(move || poller.run(interval, tick)));
    }

    fn run(&self, interval: Duration, tick: impl Fn() -> bool) {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return;
            }
            (state, _) = self.wake.wait_timeout(state, interval).unwrap();
            if state.shutdown {
                return;
            }
            drop(state);
            if !tick() {
                return;
            }
            state = self.state.lock().unwrap();
        }
    }

    /// Requests shutdown without waiting.  Safe to call from any thread,
    /// the worker included (used on the device-loss path).
    pub(crate) fn signal_stop(&self) {
        self.state.lock().unwrap().shutdown = true;
        self.wake.notify_all();
    }

    /// Requests shutdown and reaps the worker thread.  Must not be called
    /// from the worker itself.
    pub(crate) fn stop_and_join(&self) {
        let thread = {
            let mut state = self.state.lock().unwrap();
            state.shutdown = true;
            self.wake.notify_all();
            state.thread.take()
        };
        if let Some(thread) = thread {
            let _ = thread.join();
        }
    }
}
