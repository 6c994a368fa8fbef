//! Statistics reducer: fixed-width `u64` counter structs, gathered from
//! every worker to the coordinator and summed element-wise.
//!
//! Generalizes `workflow::Counters`'s keyed-HashMap accumulator into two
//! fixed-width, wire-encodable structs so every rank's contribution can be
//! summed element-wise over `Transport::gather` rather than printed locally
//! per-process.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::wire::transport::Transport;
use crate::workflow::Counters;

/// Per-rank tally of the worker pipeline's file/record bookkeeping. Counts
/// reflect every record read and matched, not just the records ultimately
/// printed by a limited `list`/`sort` result set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProcessedSummary {
    pub files_opened: u64,
    pub files_failed: u64,
    pub records_read: u64,
    pub records_matched: u64,
    pub records_sent: u64,
}

impl ProcessedSummary {
    /// Element-wise sum; the reduction is associative and commutative, so
    /// ranks can be folded in in any order.
    pub fn add(&mut self, other: &ProcessedSummary) {
        self.files_opened += other.files_opened;
        self.files_failed += other.files_failed;
        self.records_read += other.records_read;
        self.records_matched += other.records_matched;
        self.records_sent += other.records_sent;
    }
}

/// Per-rank tally for `meta` mode: min/max timestamps and byte/packet
/// totals over every record seen. `meta` summarizes the whole stream, so
/// these fields are independent of any filter match outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetadataSummary {
    pub records_seen: u64,
    pub bytes_total: u64,
    pub packets_total: u64,
    pub first_seen_min: u64,
    pub last_seen_max: u64,
}

impl Default for MetadataSummary {
    fn default() -> Self {
        Self { records_seen: 0, bytes_total: 0, packets_total: 0, first_seen_min: u64::MAX, last_seen_max: 0 }
    }
}

impl MetadataSummary {
    pub fn add(&mut self, other: &MetadataSummary) {
        self.records_seen += other.records_seen;
        self.bytes_total += other.bytes_total;
        self.packets_total += other.packets_total;
        self.first_seen_min = self.first_seen_min.min(other.first_seen_min);
        self.last_seen_max = self.last_seen_max.max(other.last_seen_max);
    }

    /// `first_seen_min` starts at `u64::MAX` as the reduction identity; when
    /// nothing has been folded in it reads back as zero instead.
    pub fn first_seen_min_or_zero(&self) -> u64 {
        if self.first_seen_min == u64::MAX { 0 } else { self.first_seen_min }
    }
}

#[derive(Serialize, Deserialize)]
struct StatsPayload {
    processed: ProcessedSummary,
    metadata: MetadataSummary,
}

/// Coordinator + worker side of the statistics reduction: every rank sends
/// its local summaries, and the coordinator sums them element-wise. Runs
/// after the session barrier, as the last collective before teardown.
///
/// On the coordinator, returns `Some((processed, metadata))`; on a worker,
/// `None` (mirrors [`Transport::gather`]'s root/non-root split).
pub fn reduce(
    transport: &dyn Transport,
    local_processed: ProcessedSummary,
    local_metadata: MetadataSummary,
) -> Result<Option<(ProcessedSummary, MetadataSummary)>> {
    let payload = bincode::serialize(&StatsPayload { processed: local_processed, metadata: local_metadata })?;
    let Some(all) = transport.gather(0, &payload)? else { return Ok(None) };

    let mut processed = ProcessedSummary::default();
    let mut metadata = MetadataSummary::default();
    for bytes in &all {
        let payload: StatsPayload = bincode::deserialize(bytes)?;
        processed.add(&payload.processed);
        metadata.add(&payload.metadata);
    }
    Ok(Some((processed, metadata)))
}

/// Render the reduced summaries the way `Counters::print_all` renders a
/// tool's tallies; called by the coordinator after the session barrier.
pub fn print_summary(ctrs: &Counters, processed: &ProcessedSummary, metadata: &MetadataSummary) {
    let _ = ctrs; // kept for API symmetry with `w.ctrs.print_all()` call site
    eprintln!("{}", crate::workflow::COUNTER_SEPARATOR);
    eprintln!(
        "files opened={} failed={} records read={} matched={} sent={}",
        processed.files_opened, processed.files_failed, processed.records_read, processed.records_matched, processed.records_sent
    );
    if metadata.records_seen > 0 {
        eprintln!(
            "meta records={} bytes={} packets={} first_seen={} last_seen={}",
            metadata.records_seen,
            metadata.bytes_total,
            metadata.packets_total,
            metadata.first_seen_min_or_zero(),
            metadata.last_seen_max
        );
    }
}
