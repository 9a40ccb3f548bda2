//! Policies for choosing which log segments of a store to compact.
//!
//! The policies that actually pick segments live with the store. This crate only needs to know
//! how to ask one for its [`CompactionDetails`], and which of the two a hybrid decision landed
//! on.

use std::fmt;
use std::path::Path;

use crate::Result;

/// What a store is made of at the moment a compaction cycle starts.
#[derive(Debug, Clone, Copy)]
pub struct CompactionRequest<'a> {
    pub total_capacity: u64,
    pub used_capacity: u64,
    pub segment_capacity: u64,
    pub segment_header_size: u64,
    /// Log segments with no entries still referenced by the journal.
    pub segments_not_in_journal: &'a [String],
    /// Where the store keeps its files.
    pub data_dir: &'a Path,
}

/// The segments a policy decided to compact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionDetails {
    /// Blobs that expired or were deleted before this time can be reclaimed.
    pub reference_time_ms: i64,
    pub segments_under_compaction: Vec<String>,
}

/// Statistics about a store. Policies get whatever they need from the concrete type; the switch
/// only needs to know whose statistics these are.
pub trait StoreStats {
    fn store_id(&self) -> &str;
}

pub trait CompactionPolicy {
    /// Returns `Ok(None)` when there is nothing worth compacting this cycle.
    fn compaction_details(
        &self,
        request: &CompactionRequest<'_>,
        stats: &dyn StoreStats,
    ) -> Result<Option<CompactionDetails>>;
}

impl<P: CompactionPolicy + ?Sized> CompactionPolicy for &P {
    fn compaction_details(
        &self,
        request: &CompactionRequest<'_>,
        stats: &dyn StoreStats,
    ) -> Result<Option<CompactionDetails>> {
        (**self).compaction_details(request, stats)
    }
}

impl<P: CompactionPolicy + ?Sized> CompactionPolicy for Box<P> {
    fn compaction_details(
        &self,
        request: &CompactionRequest<'_>,
        stats: &dyn StoreStats,
    ) -> Result<Option<CompactionDetails>> {
        (**self).compaction_details(request, stats)
    }
}

/// The two policies a hybrid decision switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Compact the segments usage statistics say are worth it.
    StatsBased,
    /// Compact everything that's eligible.
    CompactAll,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatsBased => f.write_str("stats-based"),
            Self::CompactAll => f.write_str("compact-all"),
        }
    }
}
