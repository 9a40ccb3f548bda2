//! Switches between a stats-based and a compact-all policy.
//!
//! Most cycles use the cheap stats-based policy. Once every `period` decisions, or whenever
//! `period` days have passed without one, the store gets a compact-all cycle instead. Progress
//! toward the next compact-all is written to the store's data directory after every decision so
//! it survives restarts.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, trace};

use crate::clock::{Clock, SystemClock};
use crate::compaction_policy::{
    CompactionDetails, CompactionPolicy, CompactionRequest, PolicyKind, StoreStats,
};
use crate::config::StoreConfig;
use crate::registry::SwitchStateRegistry;
use crate::switch_state::SwitchState;
use crate::Result;

pub struct HybridPolicySelector<S, A, C = SystemClock> {
    clock: C,
    compact_all: A,
    registry: Arc<SwitchStateRegistry>,
    stats_based: S,
    switch_window_millis: i64,
}

impl<S, A> HybridPolicySelector<S, A, SystemClock> {
    pub fn new(
        config: &StoreConfig,
        registry: Arc<SwitchStateRegistry>,
        stats_based: S,
        compact_all: A,
    ) -> Self {
        Self::with_clock(config, registry, stats_based, compact_all, SystemClock)
    }
}

impl<S, A, C> HybridPolicySelector<S, A, C> {
    /// # Panics
    ///
    /// Panics if the registry was built for a different period than `config`. Both have to agree
    /// or the counter and the wall-clock window would drift apart.
    pub fn with_clock(
        config: &StoreConfig,
        registry: Arc<SwitchStateRegistry>,
        stats_based: S,
        compact_all: A,
        clock: C,
    ) -> Self {
        assert_eq!(
            registry.period(),
            config.compaction_policy_switch_period,
            "registry and config disagree on the switch period"
        );
        Self {
            clock,
            compact_all,
            registry,
            stats_based,
            switch_window_millis: config.switch_window_millis(),
        }
    }

    pub fn registry(&self) -> &Arc<SwitchStateRegistry> {
        &self.registry
    }
}

impl<S, A, C: Clock> HybridPolicySelector<S, A, C> {
    /// The policy the next [`decide`](Self::decide) for this store would use, without recording
    /// anything.
    pub fn peek(&self, store_id: &str, data_dir: impl AsRef<Path>) -> PolicyKind {
        let state = self.registry.get(store_id, data_dir);
        let state = state.lock();
        self.kind_for(&state, self.clock.now_millis())
    }

    fn kind_for(&self, state: &SwitchState, now: i64) -> PolicyKind {
        if state.compact_all_due(now, self.switch_window_millis) {
            PolicyKind::CompactAll
        } else {
            PolicyKind::StatsBased
        }
    }
}

impl<S, A, C> HybridPolicySelector<S, A, C>
where
    S: CompactionPolicy,
    A: CompactionPolicy,
    C: Clock,
{
    /// Picks the policy for this cycle, records the choice, and returns what that policy wants
    /// compacted. Failing to record the choice is logged and otherwise ignored. Errors from the
    /// chosen policy are returned as is.
    ///
    /// Callers must not run two decisions for the same store at once.
    pub fn decide(
        &self,
        request: &CompactionRequest<'_>,
        stats: &dyn StoreStats,
    ) -> Result<Option<CompactionDetails>> {
        let store_id = stats.store_id();
        let kind = self.select_and_record(store_id, request.data_dir);
        info!(store_id, policy = %kind, "Selected compaction policy");
        self.policy(kind).compaction_details(request, stats)
    }

    fn select_and_record(&self, store_id: &str, data_dir: &Path) -> PolicyKind {
        let state = self.registry.get(store_id, data_dir);
        let mut state = state.lock();

        let now = self.clock.now_millis();
        let kind = self.kind_for(&state, now);
        if kind == PolicyKind::CompactAll {
            trace!(store_id, "Compact-all due this cycle");
            state.last_compact_all_time = now;
            state.counter.reset();
        }

        // The file holds the decision we just made, before the counter moves on.
        Self::persist(store_id, data_dir, &state);
        state.counter.advance();
        kind
    }

    fn persist(store_id: &str, data_dir: &Path, state: &SwitchState) {
        if data_dir.as_os_str().is_empty() {
            debug!(store_id, "No data dir, not persisting compaction policy switch state");
            return;
        }
        if let Err(e) = state.write(data_dir) {
            error!(
                store_id,
                ?data_dir,
                ?e,
                "Failed to persist compaction policy switch state"
            );
        }
    }

    fn policy(&self, kind: PolicyKind) -> &dyn CompactionPolicy {
        match kind {
            PolicyKind::StatsBased => &self.stats_based,
            PolicyKind::CompactAll => &self.compact_all,
        }
    }
}

impl<S, A, C> CompactionPolicy for HybridPolicySelector<S, A, C>
where
    S: CompactionPolicy,
    A: CompactionPolicy,
    C: Clock,
{
    fn compaction_details(
        &self,
        request: &CompactionRequest<'_>,
        stats: &dyn StoreStats,
    ) -> Result<Option<CompactionDetails>> {
        self.decide(request, stats)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::clock::ManualClock;
    use crate::Error;

    const DAY: i64 = 24 * 60 * 60 * 1000;

    struct Stats(&'static str);
    impl StoreStats for Stats {
        fn store_id(&self) -> &str {
            self.0
        }
    }

    /// Answers with its own kind so tests can tell which policy ran.
    struct Tagged {
        kind: PolicyKind,
        calls: Cell<usize>,
    }
    impl Tagged {
        fn new(kind: PolicyKind) -> Self {
            Self {
                kind,
                calls: Cell::new(0),
            }
        }
    }
    impl CompactionPolicy for Tagged {
        fn compaction_details(
            &self,
            request: &CompactionRequest<'_>,
            _stats: &dyn StoreStats,
        ) -> Result<Option<CompactionDetails>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Some(CompactionDetails {
                reference_time_ms: match self.kind {
                    PolicyKind::StatsBased => 1,
                    PolicyKind::CompactAll => 2,
                },
                segments_under_compaction: request.segments_not_in_journal.to_vec(),
            }))
        }
    }

    fn kind_of(details: Option<CompactionDetails>) -> PolicyKind {
        match details.unwrap().reference_time_ms {
            1 => PolicyKind::StatsBased,
            2 => PolicyKind::CompactAll,
            other => panic!("unexpected reference time {other}"),
        }
    }

    fn selector(
        period: u32,
        now: i64,
    ) -> HybridPolicySelector<Tagged, Tagged, Arc<ManualClock>> {
        let config = StoreConfig::new(period).unwrap();
        let registry = Arc::new(SwitchStateRegistry::new(config.compaction_policy_switch_period));
        HybridPolicySelector::with_clock(
            &config,
            registry,
            Tagged::new(PolicyKind::StatsBased),
            Tagged::new(PolicyKind::CompactAll),
            Arc::new(ManualClock::new(now)),
        )
    }

    fn request(data_dir: &Path) -> CompactionRequest<'_> {
        CompactionRequest {
            total_capacity: 100,
            used_capacity: 80,
            segment_capacity: 10,
            segment_header_size: 1,
            segments_not_in_journal: &[],
            data_dir,
        }
    }

    #[test]
    fn counter_switches_every_period() {
        let dir = tempfile::tempdir().unwrap();
        let selector = selector(3, 1_000);
        let kinds: Vec<_> = (0..7)
            .map(|_| kind_of(selector.decide(&request(dir.path()), &Stats("s")).unwrap()))
            .collect();
        use PolicyKind::*;
        assert_eq!(
            kinds,
            [StatsBased, StatsBased, CompactAll, StatsBased, StatsBased, CompactAll, StatsBased]
        );
        assert_eq!(selector.stats_based.calls.get(), 5);
        assert_eq!(selector.compact_all.calls.get(), 2);
    }

    #[test]
    fn compact_all_records_time() {
        let dir = tempfile::tempdir().unwrap();
        let selector = selector(2, 1_000);
        selector.decide(&request(dir.path()), &Stats("s")).unwrap();
        selector.clock.set(1_500);
        selector.decide(&request(dir.path()), &Stats("s")).unwrap();

        let state = selector.registry.snapshot("s").unwrap();
        assert_eq!(state.last_compact_all_time, 1_500);
    }

    #[test]
    fn window_forces_compact_all() {
        let dir = tempfile::tempdir().unwrap();
        let selector = selector(3, 1_000);
        assert_eq!(
            kind_of(selector.decide(&request(dir.path()), &Stats("s")).unwrap()),
            PolicyKind::StatsBased
        );

        selector.clock.set(3 * DAY);
        assert_eq!(
            kind_of(selector.decide(&request(dir.path()), &Stats("s")).unwrap()),
            PolicyKind::CompactAll
        );

        // The counter restarted, so the next two are stats-based again.
        for _ in 0..2 {
            assert_eq!(
                kind_of(selector.decide(&request(dir.path()), &Stats("s")).unwrap()),
                PolicyKind::StatsBased
            );
        }
    }

    #[test]
    fn peek_does_not_record() {
        let dir = tempfile::tempdir().unwrap();
        let selector = selector(1, 1_000);
        assert_eq!(selector.peek("s", dir.path()), PolicyKind::CompactAll);
        assert_eq!(
            selector.registry.snapshot("s").unwrap(),
            SwitchState::new(selector.registry.period())
        );
        assert!(!dir.path().join("compactionPolicyInfo.json").exists());
    }

    #[test]
    fn empty_data_dir_is_not_persisted() {
        let selector = selector(3, 1_000);
        let details = selector.decide(&request(Path::new("")), &Stats("s")).unwrap();
        assert_eq!(kind_of(details), PolicyKind::StatsBased);
        assert_eq!(selector.registry.snapshot("s").unwrap().counter.value(), 1);
    }

    struct Failing;
    impl CompactionPolicy for Failing {
        fn compaction_details(
            &self,
            _request: &CompactionRequest<'_>,
            stats: &dyn StoreStats,
        ) -> Result<Option<CompactionDetails>> {
            Err(Error::Compaction {
                store_id: stats.store_id().to_owned(),
                reason: "index is gone".to_owned(),
            })
        }
    }

    #[test]
    fn delegate_errors_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(3).unwrap();
        let registry = Arc::new(SwitchStateRegistry::new(config.compaction_policy_switch_period));
        let selector = HybridPolicySelector::with_clock(
            &config,
            registry,
            Failing,
            Failing,
            ManualClock::new(1_000),
        );

        let err = selector
            .decide(&request(dir.path()), &Stats("s"))
            .unwrap_err();
        match err {
            Error::Compaction { store_id, reason } => {
                assert_eq!(store_id, "s");
                assert_eq!(reason, "index is gone");
            }
            other => panic!("unexpected error {other:?}"),
        }

        // The bookkeeping still happened.
        let state = selector.registry().snapshot("s").unwrap();
        assert_eq!(state.counter.value(), 1);
        assert!(dir.path().join("compactionPolicyInfo.json").exists());
    }

    #[test]
    #[should_panic(expected = "disagree")]
    fn mismatched_registry_panics() {
        let config = StoreConfig::new(3).unwrap();
        let registry = Arc::new(SwitchStateRegistry::new(
            StoreConfig::new(4).unwrap().compaction_policy_switch_period,
        ));
        HybridPolicySelector::new(
            &config,
            registry,
            Tagged::new(PolicyKind::StatsBased),
            Tagged::new(PolicyKind::CompactAll),
        );
    }
}
