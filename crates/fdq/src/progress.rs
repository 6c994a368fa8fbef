//! Progress side-channel: workers periodically report how much of their
//! assigned input they have consumed so the coordinator can render a running
//! progress indicator, independent of the data stream.
//!
//! Grounded in `workflow::Counters`'s keyed-counter pattern for the
//! accumulation side, and in `workflow::Log::print` for the timestamped-line
//! rendering the coordinator uses to print it.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::wire::transport::{Tag, Transport};

/// Whether/how often progress updates are sent, at a configurable interval;
/// disabled entirely when `interval` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Report after this many files have been opened by a worker, or
    /// `None` to disable the side channel entirely.
    pub report_every_files: Option<usize>,
}

impl ProgressConfig {
    pub fn disabled() -> Self {
        Self { report_every_files: None }
    }

    pub fn every(n: usize) -> Self {
        Self { report_every_files: Some(n.max(1)) }
    }

    pub fn is_enabled(&self) -> bool {
        self.report_every_files.is_some()
    }
}

/// One progress update, wire-encoded with `bincode` as a small, fixed-shape
/// message, mirroring the statistics reducer's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub rank: u32,
    pub files_done: usize,
    pub files_total: usize,
    pub records_matched: u64,
}

/// Worker-side helper: send a [`ProgressUpdate`] over [`Tag::Progress`] if the
/// configured interval has elapsed . Call once per file closed.
pub struct ProgressReporter<'a> {
    config: ProgressConfig,
    transport: &'a dyn Transport,
    files_done: usize,
    files_total: usize,
    records_matched: u64,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(config: ProgressConfig, transport: &'a dyn Transport, files_total: usize) -> Self {
        Self { config, transport, files_done: 0, files_total, records_matched: 0 }
    }

    /// Record that one more file has been fully processed, and send an
    /// update if the reporting interval was hit.
    pub fn file_done(&mut self, records_matched_in_file: u64) -> Result<()> {
        self.files_done += 1;
        self.records_matched += records_matched_in_file;
        let Some(interval) = self.config.report_every_files else { return Ok(()) };
        if self.files_done % interval == 0 || self.files_done == self.files_total {
            self.send_update()?;
        }
        Ok(())
    }

    /// Send a final update unconditionally if this worker was assigned no
    /// files at all, so the coordinator's [`run_coordinator_loop`] doesn't
    /// wait forever on a rank whose `file_done` was never called (
    /// "Empty input: every mode terminates").
    pub fn finish_if_no_files(&self) -> Result<()> {
        if self.files_total == 0 && self.config.is_enabled() {
            self.send_update()?;
        }
        Ok(())
    }

    fn send_update(&self) -> Result<()> {
        let update = ProgressUpdate {
            rank: self.transport.rank(),
            files_done: self.files_done,
            files_total: self.files_total,
            records_matched: self.records_matched,
        };
        let payload = bincode::serialize(&update)?;
        self.transport.send(0, Tag::Progress, &payload)
    }
}

/// Coordinator-side: decode one [`ProgressUpdate`] received on
/// [`Tag::Progress`] and render it the way `workflow::Log::print` renders a
/// status line.
pub fn render_update(update: &ProgressUpdate) -> String {
    format!(
        "worker {} : {}/{} files, {} records matched",
        update.rank, update.files_done, update.files_total, update.records_matched
    )
}

pub fn decode_update(payload: &[u8]) -> Result<ProgressUpdate> {
    Ok(bincode::deserialize(payload)?)
}

/// Coordinator-side progress loop: the coordinator runs the data-plane driver
/// and the progress loop concurrently, since `recv_any` only waits on one tag
/// at a time. Drains [`Tag::Progress`] until every worker has reported
/// `files_done == files_total`, printing each update via `log`. Meant to run
/// on its own `std::thread::scope` thread alongside whichever mode driver is
/// consuming [`Tag::Data`].
pub fn run_coordinator_loop(
    transport: &dyn Transport,
    log: &crate::workflow::Log,
    worker_count: u32,
) -> Result<()> {
    if worker_count == 0 {
        return Ok(());
    }
    let mut done: std::collections::HashSet<u32> = std::collections::HashSet::new();
    while done.len() < worker_count as usize {
        let (_, payload) = transport.recv_any(Tag::Progress)?;
        let update = decode_update(&payload)?;
        log.print(&render_update(&update));
        if update.files_done >= update.files_total {
            done.insert(update.rank);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::transport::LoopbackTransport;

    #[test]
    fn reports_only_at_configured_interval() {
        let group = LoopbackTransport::group(2);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let worker = iter.next().unwrap();

        let handle = std::thread::spawn(move || {
            let mut reporter = ProgressReporter::new(ProgressConfig::every(2), &worker, 5);
            for _ in 0..5 {
                reporter.file_done(1).unwrap();
            }
        });

        // interval 2 of 5 files -> updates at files_done = 2, 4, and 5 (final flush)
        let mut updates = Vec::new();
        for _ in 0..3 {
            let (_, payload) = coordinator.recv_any(Tag::Progress).unwrap();
            updates.push(decode_update(&payload).unwrap());
        }
        handle.join().unwrap();

        assert_eq!(updates.iter().map(|u| u.files_done).collect::<Vec<_>>(), vec![2, 4, 5]);
    }

    #[test]
    fn disabled_config_sends_nothing() {
        assert!(!ProgressConfig::disabled().is_enabled());
    }
}
