//! Tunables for the compaction policy switch.

use std::num::NonZeroU32;
use std::path::Path;

use serde::Deserialize;

use crate::{Error, Result};

const DEFAULT_SWITCH_PERIOD: u32 = 7;
const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawStoreConfig")]
pub struct StoreConfig {
    /// Number of decisions between forced compact-all cycles. Also the number of days after which
    /// a compact-all is forced regardless of how many decisions were made.
    pub compaction_policy_switch_period: NonZeroU32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStoreConfig {
    #[serde(default = "default_switch_period")]
    store_compaction_policy_switch_period: u32,
}

fn default_switch_period() -> u32 {
    DEFAULT_SWITCH_PERIOD
}

impl TryFrom<RawStoreConfig> for StoreConfig {
    type Error = Error;

    fn try_from(raw: RawStoreConfig) -> Result<Self> {
        Self::new(raw.store_compaction_policy_switch_period)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compaction_policy_switch_period: NonZeroU32::new(DEFAULT_SWITCH_PERIOD)
                .expect("default period is non-zero"),
        }
    }
}

impl StoreConfig {
    pub fn new(switch_period: u32) -> Result<Self> {
        let compaction_policy_switch_period =
            NonZeroU32::new(switch_period).ok_or(Error::InvalidPeriod(switch_period))?;
        Ok(Self {
            compaction_policy_switch_period,
        })
    }

    /// Reads a JSON config file such as `{"storeCompactionPolicySwitchPeriod": 3}`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// The wall-clock window after which a compact-all is forced.
    pub fn switch_window_millis(&self) -> i64 {
        i64::from(self.compaction_policy_switch_period.get()).saturating_mul(MILLIS_PER_DAY)
    }
}
