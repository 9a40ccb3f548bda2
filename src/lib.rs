//! Decides, for every store on a node, whether a compaction cycle should run the cheap
//! stats-based policy or a full compact-all pass, and remembers where each store is in that
//! rotation across restarts.
//!
//! The moving parts, roughly bottom up:
//!   - [`SwitchState`] with its [`PolicyCycleCounter`] is what gets persisted per store
//!   - [`SwitchStateRegistry`] keeps every store's state in memory, loading it lazily
//!   - [`HybridPolicySelector`] makes the call and hands off to the chosen [`CompactionPolicy`]

pub mod clock;
mod compaction_policy;
mod config;
mod error;
mod file_util;
mod hybrid_policy;
mod registry;
mod switch_state;

pub use compaction_policy::{
    CompactionDetails, CompactionPolicy, CompactionRequest, PolicyKind, StoreStats,
};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use file_util::POLICY_INFO_FILE_NAME;
pub use hybrid_policy::HybridPolicySelector;
pub use registry::SwitchStateRegistry;
pub use switch_state::{PolicyCycleCounter, SwitchState, NEVER_COMPACTED_ALL};
