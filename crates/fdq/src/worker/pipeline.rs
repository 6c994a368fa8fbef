//! Worker pipeline: file discovery, per-file read -> filter -> local
//! aggregate, progress reporting, and mode-specific egress.
//!
//! File reads are fanned out across a small pool of threads, but the
//! transport is only ever touched from the thread that owns
//! `std::thread::scope` — so file-processing threads hand completed-file
//! notices back over a bounded `crossbeam` channel instead of reporting
//! progress themselves.

use std::path::PathBuf;

use crossbeam::channel::{bounded, Sender};

use crate::error::Result;
use crate::flow::filter::Filter;
use crate::flow::reader::FlowReader;
use crate::flow::record::FieldId;
use crate::flow::table::{AggregationTable, SortMode};
use crate::progress::ProgressReporter;
use crate::session::{SessionContext, WorkingMode};
use crate::stats::{MetadataSummary, ProcessedSummary};
use crate::wire::receiver::send_records;
use crate::wire::transport::{Tag, Transport};
use crate::worker::discovery;

/// What one worker contributes to the session-end statistics reduction,
/// returned after egress so the binary entry point can fold it into the
/// barrier/reduce sequence.
pub struct WorkerOutcome {
    pub processed: ProcessedSummary,
    pub metadata: MetadataSummary,
}

/// Shared with the coordinator-side `sort`/`aggr` drivers so both ends agree
/// on when cursor output is sorted vs. insertion-ordered.
pub(crate) fn sort_mode_for(ctx: &SessionContext) -> SortMode {
    match ctx.mode {
        WorkingMode::Sort | WorkingMode::Aggr if ctx.fields.sort_field().is_some() => match ctx.sort_direction {
            crate::session::SortDirection::Asc => SortMode::SortedAsc,
            crate::session::SortDirection::Desc => SortMode::SortedDesc,
        },
        _ => SortMode::InsertionOrder,
    }
}

/// Number of file-reading worker threads to fan out across. Capped by the
/// file count so a handful of files don't spawn idle threads.
fn thread_count(files: usize) -> usize {
    rayon::current_num_threads().max(1).min(files.max(1))
}

struct FileOutcome {
    table: AggregationTable,
    processed: ProcessedSummary,
    metadata: MetadataSummary,
}

fn process_file(path: &PathBuf, filter: &Filter, schema_template: &AggregationTable) -> FileOutcome {
    let mut table = AggregationTable::new(schema_template.schema().clone(), SortMode::InsertionOrder);
    let mut processed = ProcessedSummary::default();
    let mut metadata = MetadataSummary::default();

    let mut reader = match FlowReader::open(path) {
        Ok(r) => r,
        Err(_) => {
            processed.files_failed += 1;
            return FileOutcome { table, processed, metadata };
        }
    };
    processed.files_opened += 1;

    loop {
        match reader.next_record() {
            Ok(Some(record)) => {
                processed.records_read += 1;
                metadata.records_seen += 1;
                if let Some(crate::flow::record::FieldValue::U64(v)) = record.get(FieldId::Octets) {
                    metadata.bytes_total += v;
                }
                if let Some(crate::flow::record::FieldValue::U64(v)) = record.get(FieldId::Packets) {
                    metadata.packets_total += v;
                }
                if let Some(crate::flow::record::FieldValue::U64(v)) = record.get(FieldId::FirstSeen) {
                    metadata.first_seen_min = metadata.first_seen_min.min(v);
                }
                if let Some(crate::flow::record::FieldValue::U64(v)) = record.get(FieldId::LastSeen) {
                    metadata.last_seen_max = metadata.last_seen_max.max(v);
                }
                if !filter.matches(&record) {
                    continue;
                }
                processed.records_matched += 1;
                table.write(&record);
            }
            Ok(None) => break,
            Err(_) => {
                // per-file read failure short of EOF: records already consumed are kept
                break;
            }
        }
    }
    FileOutcome { table, processed, metadata }
}

/// Run the full worker pipeline to completion and return the summaries to
/// fold into the session-end reduction.
pub fn run(transport: &dyn Transport, ctx: &SessionContext) -> Result<WorkerOutcome> {
    let rank = transport.rank();
    let worker_count = transport.size().saturating_sub(1);
    let filter = Filter::compile(ctx.filter_expr.as_deref().unwrap_or(""))?;
    let files = discovery::discover_files(&ctx.path, ctx.time_interval, rank, worker_count)?;

    let file_count_payload = (files.len() as u64).to_le_bytes().to_vec();
    transport.gather(0, &file_count_payload)?;

    let mut table = AggregationTable::new(ctx.fields.clone(), SortMode::InsertionOrder);
    let mut processed = ProcessedSummary::default();
    let mut metadata = MetadataSummary::default();

    if !files.is_empty() {
        let (tx, rx): (Sender<FileOutcome>, _) = bounded(files.len());
        let chunks = chunk(&files, thread_count(files.len()));
        std::thread::scope(|scope| {
            for chunk in &chunks {
                let tx = tx.clone();
                let filter = &filter;
                let table = &table;
                scope.spawn(move || {
                    for path in *chunk {
                        let outcome = process_file(path, filter, table);
                        if tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            let mut reporter = ProgressReporter::new(ctx.progress, transport, files.len());
            for outcome in rx.iter() {
                table.merge(&outcome.table);
                processed.add(&outcome.processed);
                metadata.add(&outcome.metadata);
                let _ = reporter.file_done(outcome.processed.records_matched);
            }
        });
    } else {
        // No files assigned to this worker: still announce completion so the
        // coordinator's progress loop doesn't wait forever on this rank.
        let reporter = ProgressReporter::new(ctx.progress, transport, 0);
        reporter.finish_if_no_files()?;
    }

    processed.records_sent += match ctx.mode {
        WorkingMode::List => egress_list(transport, &table, ctx.xchg_buff_size)?,
        WorkingMode::Sort => egress_sort(transport, &table, ctx)?,
        WorkingMode::Aggr if ctx.use_tput => {
            crate::tput::respond_worker(transport, &retable(&table, ctx), ctx.limit)?;
            0
        }
        WorkingMode::Aggr => egress_aggr(transport, &table, ctx.xchg_buff_size)?,
        WorkingMode::Meta => 0, // no data records egressed, progress + stats only
    };

    Ok(WorkerOutcome { processed, metadata })
}

/// Rebuild `table` with the query's configured sort mode. The worker builds
/// its local table in insertion order so file-thread merges stay cheap, then
/// sorts once at egress.
fn retable(table: &AggregationTable, ctx: &SessionContext) -> AggregationTable {
    let mut sorted = AggregationTable::new(table.schema().clone(), sort_mode_for(ctx));
    sorted.merge(table);
    sorted
}

fn egress_list(transport: &dyn Transport, table: &AggregationTable, xchg_buff_size: usize) -> Result<u64> {
    let rows = table.cursor();
    let count = rows.len() as u64;
    let records = rows.into_iter().map(|row| row.to_record().encode());
    send_records(transport, 0, Tag::Data, xchg_buff_size, records)?;
    Ok(count)
}

fn egress_sort(transport: &dyn Transport, table: &AggregationTable, ctx: &SessionContext) -> Result<u64> {
    let sorted = retable(table, ctx);
    let cursor = sorted.cursor();
    let take = if ctx.limit == 0 { cursor.len() } else { ctx.limit };
    let count = take.min(cursor.len()) as u64;
    let records = cursor.into_iter().take(take).map(|row| row.to_record().encode());
    send_records(transport, 0, Tag::Data, ctx.xchg_buff_size, records)?;
    Ok(count)
}

fn egress_aggr(transport: &dyn Transport, table: &AggregationTable, xchg_buff_size: usize) -> Result<u64> {
    let count = table.len() as u64;
    let records = table.entries().map(|(_, row)| row.to_record().encode());
    send_records(transport, 0, Tag::Data, xchg_buff_size, records)?;
    Ok(count)
}

fn chunk(files: &[PathBuf], n: usize) -> Vec<&[PathBuf]> {
    let n = n.max(1);
    let chunk_size = files.len().div_ceil(n).max(1);
    files.chunks(chunk_size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::record::{FieldValue, FlowRecord};
    use crate::session::{FieldRole, FieldSet, FieldSpec};
    use std::io::Write;

    fn schema() -> FieldSet {
        FieldSet::new(vec![
            FieldSpec { field: FieldId::Protocol, role: FieldRole::Key },
            FieldSpec { field: FieldId::Octets, role: FieldRole::AggregateSum },
        ])
    }

    fn write_flow_file(dir: &std::path::Path, name: &str, records: &[FlowRecord]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for rec in records {
            file.write_all(&rec.encode()).unwrap();
        }
        path
    }

    #[test]
    fn process_file_counts_reads_matches_and_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = FlowRecord::new();
        a.set(FieldId::Protocol, FieldValue::U64(6));
        a.set(FieldId::Octets, FieldValue::U64(100));
        let mut b = FlowRecord::new();
        b.set(FieldId::Protocol, FieldValue::U64(17));
        b.set(FieldId::Octets, FieldValue::U64(50));
        let path = write_flow_file(dir.path(), "flows.bin", &[a, b]);

        let filter = Filter::compile("proto == 6").unwrap();
        let template = AggregationTable::new(schema(), SortMode::InsertionOrder);
        let outcome = process_file(&path, &filter, &template);

        assert_eq!(outcome.processed.records_read, 2);
        assert_eq!(outcome.processed.records_matched, 1);
        assert_eq!(outcome.table.len(), 1);
    }

    #[test]
    fn metadata_counts_records_regardless_of_filter_match() {
        // spec §4.4(iii): "non-matching records are skipped but counted in
        // metadata" — meta mode summarizes the whole stream, not just the
        // records the filter let through.
        let dir = tempfile::tempdir().unwrap();
        let mut a = FlowRecord::new();
        a.set(FieldId::Protocol, FieldValue::U64(6));
        a.set(FieldId::Octets, FieldValue::U64(100));
        let mut b = FlowRecord::new();
        b.set(FieldId::Protocol, FieldValue::U64(17));
        b.set(FieldId::Octets, FieldValue::U64(50));
        let path = write_flow_file(dir.path(), "flows.bin", &[a, b]);

        let filter = Filter::compile("proto == 6").unwrap();
        let template = AggregationTable::new(schema(), SortMode::InsertionOrder);
        let outcome = process_file(&path, &filter, &template);

        assert_eq!(outcome.processed.records_matched, 1);
        assert_eq!(outcome.metadata.records_seen, 2);
        assert_eq!(outcome.metadata.bytes_total, 150);
    }

    #[test]
    fn missing_file_is_counted_as_failed_not_fatal() {
        let filter = Filter::compile("").unwrap();
        let template = AggregationTable::new(schema(), SortMode::InsertionOrder);
        let outcome = process_file(&PathBuf::from("/nonexistent/flows.bin"), &filter, &template);
        assert_eq!(outcome.processed.files_failed, 1);
        assert_eq!(outcome.processed.files_opened, 0);
    }

    #[test]
    fn chunk_splits_without_dropping_files() {
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("f{i}"))).collect();
        let chunks = chunk(&files, 2);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 5);
        assert!(chunks.len() <= 2);
    }
}
