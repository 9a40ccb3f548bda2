//! The in-memory home of every store's [`SwitchState`].

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::file_util;
use crate::switch_state::SwitchState;

/// Maps store ids to their switch state, loading each one from the store's data directory the
/// first time it's asked for.
///
/// Entries are handed out behind their own lock so stores never wait on each other beyond the
/// map lookup.
#[derive(Debug)]
pub struct SwitchStateRegistry {
    period: NonZeroU32,
    states: Mutex<HashMap<String, Arc<Mutex<SwitchState>>>>,
}

impl SwitchStateRegistry {
    pub fn new(period: NonZeroU32) -> Self {
        Self {
            period,
            states: Default::default(),
        }
    }

    pub fn period(&self) -> NonZeroU32 {
        self.period
    }

    /// Returns the state for `store_id`, recovering it from `data_dir` if this is the first time
    /// we've seen the store. Never fails: a missing or unreadable state file just means we start
    /// from scratch.
    pub fn get(&self, store_id: &str, data_dir: impl AsRef<Path>) -> Arc<Mutex<SwitchState>> {
        if let Some(state) = self.states.lock().get(store_id) {
            return Arc::clone(state);
        }

        // Load outside the map lock so other stores aren't held up by our disk read.
        let recovered = Arc::new(Mutex::new(self.recover(store_id, data_dir.as_ref())));

        // Someone may have raced us to it. First one in wins.
        let mut states = self.states.lock();
        Arc::clone(
            states
                .entry(store_id.to_owned())
                .or_insert(recovered),
        )
    }

    /// A copy of the in-memory state, if the store has been loaded.
    pub fn snapshot(&self, store_id: &str) -> Option<SwitchState> {
        self.states
            .lock()
            .get(store_id)
            .map(|state| *state.lock())
    }

    /// Forgets a store, e.g. when it's shut down. The state file is left alone.
    pub fn remove(&self, store_id: &str) -> Option<SwitchState> {
        self.states
            .lock()
            .remove(store_id)
            .map(|state| *state.lock())
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    fn recover(&self, store_id: &str, data_dir: &Path) -> SwitchState {
        let path = file_util::policy_info_path(data_dir);
        if !path.exists() {
            debug!(store_id, ?path, "No compaction policy switch state, starting fresh");
            return SwitchState::new(self.period);
        }

        match SwitchState::read(&path) {
            Ok(mut state) => {
                if state.counter.period() != self.period {
                    info!(
                        store_id,
                        persisted = state.counter.period().get(),
                        configured = self.period.get(),
                        "Compaction policy switch period changed"
                    );
                    state.counter = state.counter.with_period(self.period);
                }
                debug!(store_id, ?state, "Recovered compaction policy switch state");
                state
            }
            Err(e) => {
                warn!(
                    store_id,
                    ?path,
                    ?e,
                    "Could not read compaction policy switch state, starting fresh"
                );
                SwitchState::new(self.period)
            }
        }
    }
}
