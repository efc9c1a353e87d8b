//! The cached status snapshot.
//!
//! All freshness decisions happen under one mutex: the age check and the
//! refresh-plus-rotate are a single critical section, so two overlapping
//! refreshes are impossible.  The transport is only ever locked from inside
//! this critical section (the one permitted nesting, cache → transport);
//! observer fan-out happens strictly after the cache lock is released.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::proto::StatusSnapshot;

/// The rotated state of one successful refresh, handed to observer fan-out
/// after the cache lock is dropped.
#[derive(Debug, Clone)]
pub(crate) struct Refresh {
    /// Cache generation this refresh produced.
    pub(crate) generation: u64,
    /// Snapshot that was current before this refresh, if any.
    pub(crate) previous: Option<Arc<StatusSnapshot>>,
    /// The freshly decoded snapshot.
    pub(crate) current: Arc<StatusSnapshot>,
}

#[derive(Debug, Default)]
struct CacheState {
    current: Option<Arc<StatusSnapshot>>,
    previous: Option<Arc<StatusSnapshot>>,
    updated_at: Option<Instant>,
    generation: u64,
}

/// Holder of the most recent and previous decoded status snapshots.
#[derive(Debug)]
pub(crate) struct StatusCache {
    state: Mutex<CacheState>,
    max_age: Duration,
}

impl StatusCache {
    pub(crate) fn new(max_age: Duration) -> Self {
        Self { state: Mutex::new(CacheState::default()), max_age }
    }

    /// Serves the current snapshot, refreshing it first when `force` is set
    /// or the cached one is older than the configured max age.
    ///
    /// `fetch` runs under the cache mutex and is expected to acquire the
    /// transport mutex internally.  On fetch failure the cached snapshot and
    /// timestamp are cleared and the error is returned; the caller decides
    /// what the failure means for the session.
    pub(crate) fn read_with<E>(
        &self,
        force: bool,
        fetch: impl FnOnce() -> Result<StatusSnapshot, E>,
    ) -> Result<(Option<Arc<StatusSnapshot>>, Option<Refresh>), E> {
        let mut state = self.state.lock().unwrap();

        let fresh = !force
            && state.current.is_some()
            && state
                .updated_at
                .is_some_and(|at| at.elapsed() <= self.max_age);
        if fresh {
            return Ok((state.current.clone(), None));
        }

        match fetch() {
            Ok(snapshot) => {
                let current = Arc::new(snapshot);
                state.previous = state.current.take();
                state.current = Some(Arc::clone(&current));
                state.updated_at = Some(Instant::now());
                state.generation += 1;
                let refresh = Refresh {
                    generation: state.generation,
                    previous: state.previous.clone(),
                    current,
                };
                Ok((state.current.clone(), Some(refresh)))
            }
            Err(e) => {
                state.current = None;
                state.updated_at = None;
                Err(e)
            }
        }
    }

    /// Non-refreshing accessor for use from observer callbacks.
    pub(crate) fn peek(&self) -> Option<Arc<StatusSnapshot>> {
        self.state.lock().unwrap().current.clone()
    }

    /// Current cache generation.
    pub(crate) fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    /// Drops all cached state on disconnect.  The generation counter keeps
    /// counting so fan-out identity stays unique for the session's lifetime.
    pub(crate) fn invalidate(&self) {
        let mut state = self.state.lock().unwrap();
        state.current = None;
        state.previous = None;
        state.updated_at = None;
    }
}
