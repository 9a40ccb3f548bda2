//! Per-store state deciding when to switch to a compact-all cycle, and its on-disk form.
//!
//! The state lives in `<data dir>/compactionPolicyInfo.json`:
//!
//! ```json
//! {
//!   "compactionPolicyCounter": {
//!     "storeCompactionPolicySwitchPeriod": 3,
//!     "counter": 1,
//!     "value": 1
//!   },
//!   "lastCompactAllTime": 1593463435900
//! }
//! ```
//!
//! `counter` is how many decisions have been made in the current cycle and `value` is how many
//! are left before a compact-all is forced. `value` is the one we trust when the two disagree.

use std::num::NonZeroU32;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::file_util;
use crate::{Error, Result};

pub use counter::PolicyCycleCounter;

mod counter;

/// Epoch millis stored when a store has never run a compact-all.
pub const NEVER_COMPACTED_ALL: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchState {
    pub counter: PolicyCycleCounter,
    /// Epoch millis of the last decision that picked compact-all.
    pub last_compact_all_time: i64,
}

impl SwitchState {
    /// State for a store we know nothing about.
    pub fn new(period: NonZeroU32) -> Self {
        Self {
            counter: PolicyCycleCounter::new(period),
            last_compact_all_time: NEVER_COMPACTED_ALL,
        }
    }

    /// Whether the next decision should be a compact-all: either the counter ran out or it's been
    /// at least `window_millis` since the last compact-all.
    pub fn compact_all_due(&self, now: i64, window_millis: i64) -> bool {
        self.counter.should_fire_this_cycle()
            || self.last_compact_all_time.saturating_add(window_millis) <= now
    }

    /// Reads state previously written with [`SwitchState::write`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let doc: SwitchStateDoc = file_util::read_json(path)?;
        doc.try_into()
    }

    /// Overwrites the state file in `data_dir`.
    pub fn write(&self, data_dir: impl AsRef<Path>) -> Result<()> {
        let path = file_util::policy_info_path(data_dir);
        debug!(?path, state = ?self, "Writing compaction policy switch state");
        file_util::write_pretty_json(path, &SwitchStateDoc::from(self))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchStateDoc {
    compaction_policy_counter: CounterDoc,
    last_compact_all_time: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterDoc {
    #[serde(rename = "storeCompactionPolicySwitchPeriod")]
    period: u32,
    counter: u32,
    value: u32,
}

impl From<&SwitchState> for SwitchStateDoc {
    fn from(state: &SwitchState) -> Self {
        Self {
            compaction_policy_counter: CounterDoc {
                period: state.counter.period().get(),
                counter: state.counter.position(),
                value: state.counter.value(),
            },
            last_compact_all_time: state.last_compact_all_time,
        }
    }
}

impl TryFrom<SwitchStateDoc> for SwitchState {
    type Error = Error;

    fn try_from(doc: SwitchStateDoc) -> Result<Self> {
        let CounterDoc {
            period,
            counter,
            value,
        } = doc.compaction_policy_counter;
        let period = NonZeroU32::new(period).ok_or(Error::InvalidPeriod(period))?;
        let counter_state = PolicyCycleCounter::from_value(period, value);
        if counter_state.position() != counter || counter_state.value() != value {
            debug!(
                counter,
                value,
                period = period.get(),
                "Inconsistent persisted counter, going by value"
            );
        }
        Ok(Self {
            counter: counter_state,
            last_compact_all_time: doc.last_compact_all_time,
        })
    }
}
