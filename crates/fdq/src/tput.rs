//! The three-phase TPUT (threshold-based preemptive top-k) protocol.
//!
//! Coordinator-driven states: `Phase1 -> Phase2Threshold -> Phase2Gather ->
//! Phase3Bcast -> Phase3Gather -> Done`. Workers are pure responders to each
//! coordinator broadcast, built on the transport primitives in
//! [`crate::wire`].

use crate::error::{Error, Result};
use crate::flow::table::{AggregatedRow, AggregationTable, SortMode};
use crate::session::FieldSet;
use crate::wire::receiver::{send_records, CoordinatorReceiver};
use crate::wire::transport::{Tag, Transport};

const CANDIDATE_XCHG_CAPACITY: usize = 64 * 1024;

/// Run the coordinator side of TPUT to completion, returning the exact
/// top-`n` rows.
pub fn run_coordinator(
    transport: &dyn Transport,
    schema: &FieldSet,
    sort_mode: SortMode,
    n: usize,
) -> Result<Vec<AggregatedRow>> {
    let worker_count = transport.size().saturating_sub(1);
    if worker_count == 0 {
        return Err(Error::InsufficientParallelism { origin: crate::origin!(), size: transport.size() as usize });
    }
    let sort_field = schema.sort_field().ok_or_else(|| {
        Error::internal("TPUT requires a sort field in the schema", crate::origin!())
    })?;

    // Phase 1: each worker sends its entire local aggregation; the
    // coordinator builds the cross-worker partial-sum table.
    let mut partial = AggregationTable::new(schema.clone(), sort_mode);
    CoordinatorReceiver::on_tag(transport, Tag::Tput1).run(|_from, record| partial.write_raw(record))?;

    let tau1 = partial.nth_sort_value_or_last(n);
    let threshold = tau1.div_ceil(worker_count as u64);

    // Phase 2 threshold: broadcast the single u64 threshold to every worker.
    let mut threshold_payload = threshold.to_le_bytes().to_vec();
    transport.broadcast(0, &mut threshold_payload)?;

    // Phase 2 gather: each worker sends its local rows with aggregate >= threshold.
    let mut candidates = AggregationTable::new(schema.clone(), sort_mode);
    CoordinatorReceiver::on_tag(transport, Tag::Tput2).run(|_from, record| candidates.write_raw(record))?;

    // Phase 3 bcast: the merged candidate key set, encoded as a u64 count
    // followed by count x (i32 len, len bytes).
    let candidate_keys: Vec<Vec<u8>> = candidates.entries().map(|(key, _)| key.clone()).collect();
    let mut bcast_payload = encode_key_set(&candidate_keys);
    transport.broadcast(0, &mut bcast_payload)?;

    // Phase 3 gather: exact sums for each candidate key from every worker.
    let mut exact = AggregationTable::new(schema.clone(), sort_mode);
    CoordinatorReceiver::on_tag(transport, Tag::Tput3Reply).run(|_from, record| exact.write_raw(record))?;

    let mut rows: Vec<AggregatedRow> = exact.cursor().into_iter().cloned().collect();
    rows.sort_by(|a, b| {
        let av = a.aggregate(sort_field).unwrap_or(0);
        let bv = b.aggregate(sort_field).unwrap_or(0);
        bv.cmp(&av) // TPUT always ranks by descending magnitude before the caller applies sort_direction for display
    });
    if n > 0 {
        rows.truncate(n);
    }
    Ok(rows)
}

/// Run the worker side of TPUT to completion, responding to the
/// coordinator's three broadcasts using `local`, the worker's own complete
/// aggregation over its assigned input. `n` is the query's record limit,
/// used to cap what phase 1 ships: sending only the local top-N is the
/// whole point of TPUT, to avoid shipping the long tail.
pub fn respond_worker(transport: &dyn Transport, local: &AggregationTable, n: usize) -> Result<()> {
    // Phase 1: send only our local top-N, sorted in the configured
    // direction via `cursor()`, not the full local aggregation.
    let top_n: Vec<_> = local.cursor().into_iter().take(n.max(1)).collect();
    let phase1_records = top_n.into_iter().map(|row| row.to_record().encode());
    send_records(transport, 0, Tag::Tput1, CANDIDATE_XCHG_CAPACITY, phase1_records)?;

    // Phase 2 threshold: receive the broadcast u64.
    let mut threshold_payload = Vec::new();
    transport.broadcast(0, &mut threshold_payload)?;
    let threshold = decode_u64(&threshold_payload)?;

    let above_threshold = local
        .entries()
        .filter(|(_, row)| local.schema().sort_field().is_some_and(|f| row.aggregate(f).unwrap_or(0) >= threshold))
        .map(|(_, row)| row.to_record().encode());
    send_records(transport, 0, Tag::Tput2, CANDIDATE_XCHG_CAPACITY, above_threshold)?;

    // Phase 3 bcast: receive the merged candidate key set.
    let mut bcast_payload = Vec::new();
    transport.broadcast(0, &mut bcast_payload)?;
    let candidate_keys = decode_key_set(&bcast_payload)?;

    let replies = candidate_keys
        .iter()
        .filter_map(|key| local.row_for_key_bytes(key))
        .map(|row| row.to_record().encode());
    send_records(transport, 0, Tag::Tput3Reply, CANDIDATE_XCHG_CAPACITY, replies)
}

fn encode_key_set(keys: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(keys.len() as u64).to_le_bytes());
    for key in keys {
        out.extend_from_slice(&(key.len() as i32).to_le_bytes());
        out.extend_from_slice(key);
    }
    out
}

fn decode_key_set(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let count_bytes = buf.get(0..8).ok_or_else(|| {
        Error::protocol("truncated candidate-key-set count", crate::origin!())
    })?;
    let count = u64::from_le_bytes(count_bytes.try_into().unwrap()) as usize;
    let mut offset = 8usize;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        let len_bytes = buf.get(offset..offset + 4).ok_or_else(|| {
            Error::protocol("truncated candidate-key length", crate::origin!())
        })?;
        let len = i32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
        offset += 4;
        let key = buf.get(offset..offset + len).ok_or_else(|| {
            Error::protocol("truncated candidate-key bytes", crate::origin!())
        })?;
        keys.push(key.to_vec());
        offset += len;
    }
    Ok(keys)
}

fn decode_u64(buf: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = buf
        .get(0..8)
        .ok_or_else(|| Error::protocol("truncated u64 broadcast payload", crate::origin!()))?
        .try_into()
        .unwrap();
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::record::{FieldId, FieldValue, FlowRecord};
    use crate::session::{FieldRole, FieldSpec};
    use crate::wire::transport::LoopbackTransport;

    fn schema() -> FieldSet {
        FieldSet::new(vec![
            FieldSpec { field: FieldId::SrcPort, role: FieldRole::Key },
            FieldSpec { field: FieldId::Octets, role: FieldRole::AggregateSum },
            FieldSpec { field: FieldId::Octets, role: FieldRole::Sort },
        ])
    }

    fn local_table(entries: &[(u16, u64)]) -> AggregationTable {
        let mut table = AggregationTable::new(schema(), SortMode::SortedDesc);
        for &(key, value) in entries {
            let mut rec = FlowRecord::new();
            rec.set(FieldId::SrcPort, FieldValue::U64(key as u64));
            rec.set(FieldId::Octets, FieldValue::U64(value));
            table.write(&rec);
        }
        table
    }

    #[test]
    fn threshold_pruning_keeps_exact_top_n_despite_long_tail() {
        // keys a/b/c/d/e mapped to SrcPort 1..5 respectively.
        let w1 = local_table(&[(1, 100), (2, 40), (3, 5)]);
        let w2 = local_table(&[(1, 50), (2, 10), (4, 7)]);
        let w3 = local_table(&[(3, 60), (2, 20), (5, 8)]);

        let group = LoopbackTransport::group(4);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let workers: Vec<_> = iter.collect();
        let locals = vec![w1, w2, w3];

        let handles: Vec<_> = workers
            .into_iter()
            .zip(locals.into_iter())
            .map(|(w, local)| std::thread::spawn(move || respond_worker(&w, &local, 2).unwrap()))
            .collect();

        let top = run_coordinator(&coordinator, &schema(), SortMode::SortedDesc, 2).unwrap();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(top.len(), 2);
        let get = |port: u64| top.iter().find(|r| r.key_fields.iter().any(|(f, v)| *f == FieldId::SrcPort && v.as_u64() == Some(port)));
        let a = get(1).expect("key a (port 1) should survive");
        let b = get(2).expect("key b (port 2) should survive");
        assert_eq!(a.aggregate(FieldId::Octets), Some(150));
        assert_eq!(b.aggregate(FieldId::Octets), Some(70));
    }

    #[test]
    fn single_worker_tput_matches_plain_aggregation() {
        let w1 = local_table(&[(1, 30), (2, 90), (3, 10)]);
        let group = LoopbackTransport::group(2);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let worker = iter.next().unwrap();

        let handle = std::thread::spawn(move || respond_worker(&worker, &w1, 1).unwrap());
        let top = run_coordinator(&coordinator, &schema(), SortMode::SortedDesc, 1).unwrap();
        handle.join().unwrap();

        assert_eq!(top.len(), 1);
        assert_eq!(top[0].aggregate(FieldId::Octets), Some(90));
    }
}
