//! `AggregationTable`: a key-tuple-keyed hash map of per-field accumulators
//! (`new`, `write`, `write_raw`, `cursor`, sort mode), standing in for a
//! columnar group-by/aggregate engine with the narrow capability surface
//! this query engine actually needs.
//!
//! Grounded in the same `sum`/`min`/`max` accumulator semantics a
//! columnar query-planning engine's group-by step would use, reimplemented
//! here as a plain hash map rather than a full query planner.

use std::collections::HashMap;

use crate::flow::record::{FieldId, FieldValue, FlowRecord};
use crate::session::{FieldRole, FieldSet};

/// Per-key accumulator. Each slot tracks the aggregate role configured for
/// its field; `Sum` also backs the `sort` role since a sorted result set
/// requires the sort field to be aggregated.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Sum(u64),
    Min(u64),
    Max(u64),
}

impl Slot {
    fn new(role: FieldRole, value: u64) -> Self {
        match role {
            FieldRole::AggregateMin => Slot::Min(value),
            FieldRole::AggregateMax => Slot::Max(value),
            _ => Slot::Sum(value),
        }
    }

    fn update(&mut self, role: FieldRole, value: u64) {
        match (self, role) {
            (Slot::Sum(acc), _) => *acc = acc.saturating_add(value),
            (Slot::Min(acc), _) => *acc = (*acc).min(value),
            (Slot::Max(acc), _) => *acc = (*acc).max(value),
        }
    }

    fn value(self) -> u64 {
        match self {
            Slot::Sum(v) | Slot::Min(v) | Slot::Max(v) => v,
        }
    }
}

/// One aggregated row: the key fields (verbatim, from the first record seen
/// for that key) plus the accumulator slots for every aggregate field.
#[derive(Debug, Clone)]
pub struct AggregatedRow {
    pub key_fields: Vec<(FieldId, FieldValue)>,
    aggregates: HashMap<FieldId, Slot>,
}

impl AggregatedRow {
    pub fn aggregate(&self, field: FieldId) -> Option<u64> {
        self.aggregates.get(&field).map(|s| s.value())
    }

    /// Materialize this aggregated row back into a [`FlowRecord`] so it can
    /// be framed onto the wire  or printed.
    pub fn to_record(&self) -> FlowRecord {
        let mut rec = FlowRecord::new();
        for (field, value) in &self.key_fields {
            rec.set(*field, *value);
        }
        for (field, slot) in &self.aggregates {
            rec.set(*field, FieldValue::U64(slot.value()));
        }
        rec
    }
}

/// Whether cursor traversal orders by the configured sort field, and in
/// which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    InsertionOrder,
    SortedAsc,
    SortedDesc,
}

/// An associative map from key-tuple to accumulator.
pub struct AggregationTable {
    schema: FieldSet,
    sort_mode: SortMode,
    rows: HashMap<Vec<u8>, AggregatedRow>,
    insertion_order: Vec<Vec<u8>>, // tracks first-seen order for insertion-order cursors and tie-breaks
}

impl AggregationTable {
    pub fn new(schema: FieldSet, sort_mode: SortMode) -> Self {
        Self {
            schema,
            sort_mode,
            rows: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write a decoded record into the table, updating the matching row's
    /// accumulators or inserting a new one.
    pub fn write(&mut self, record: &FlowRecord) {
        let key = record.key_bytes(self.schema.keys());
        let is_new = !self.rows.contains_key(&key);
        let row = self.rows.entry(key.clone()).or_insert_with(|| AggregatedRow {
            key_fields: self.schema.keys().filter_map(|f| record.get(f).map(|v| (f, v))).collect(),
            aggregates: HashMap::new(),
        });
        for spec in self.schema.aggregates() {
            let Some(FieldValue::U64(value)) = record.get(spec.field) else { continue };
            row.aggregates
                .entry(spec.field)
                .and_modify(|slot| slot.update(spec.role, value))
                .or_insert_with(|| Slot::new(spec.role, value));
        }
        if is_new {
            self.insertion_order.push(key);
        }
    }

    /// Write a raw encoded record, used when workers have already
    /// pre-aggregated and the coordinator only needs to re-sum partials
    /// (the TPUT phases).
    pub fn write_raw(&mut self, bytes: &[u8]) -> crate::error::Result<()> {
        let record = FlowRecord::decode(bytes).ok_or_else(|| {
            crate::error::Error::internal("malformed raw aggregation-table record", crate::origin!())
        })?;
        self.write(&record);
        Ok(())
    }

    /// Iterate rows in the configured [`SortMode`], ordered by the sort key
    /// when one is configured. Ties break by insertion order.
    pub fn cursor(&self) -> Vec<&AggregatedRow> {
        let mut rows: Vec<&AggregatedRow> = self.insertion_order.iter().map(|k| &self.rows[k]).collect();
        match self.sort_mode {
            SortMode::InsertionOrder => {}
            SortMode::SortedAsc | SortMode::SortedDesc => {
                let Some(sort_field) = self.schema.sort_field() else { return rows };
                rows.sort_by(|a, b| {
                    let av = a.aggregate(sort_field).unwrap_or(0);
                    let bv = b.aggregate(sort_field).unwrap_or(0);
                    match self.sort_mode {
                        SortMode::SortedDesc => bv.cmp(&av),
                        _ => av.cmp(&bv),
                    }
                });
            }
        }
        rows
    }

    /// The value of the sort field at rank `n` (1-based) if the table holds
    /// at least `n` rows, else the last row's value, else `0` (
    /// phase 1 "τ₁ = the value of the sort field of the N-th record if the
    /// table holds ≥ N records, else the value of the last record, else zero").
    pub fn nth_sort_value_or_last(&self, n: usize) -> u64 {
        let Some(sort_field) = self.schema.sort_field() else { return 0 };
        let rows = self.cursor();
        if rows.is_empty() {
            return 0;
        }
        let idx = if n >= 1 && n <= rows.len() { n - 1 } else { rows.len() - 1 };
        rows[idx].aggregate(sort_field).unwrap_or(0)
    }

    pub fn schema(&self) -> &FieldSet {
        &self.schema
    }

    /// Fold every row of `other` into `self` (worker-side per-thread table
    /// merge,  "file reads may be parallelized across threads
    /// internally"). Associative-commutative by construction: re-runs
    /// [`write`] on each row's materialized record, so the result does not
    /// depend on merge order .
    pub fn merge(&mut self, other: &AggregationTable) {
        for (_, row) in other.entries() {
            self.write(&row.to_record());
        }
    }

    /// Look up a row by its raw key-tuple bytes (TPUT phase 3, :
    /// "each worker reports its exact local sum for each candidate key").
    pub fn row_for_key_bytes(&self, key: &[u8]) -> Option<&AggregatedRow> {
        self.rows.get(key)
    }

    /// Every `(key_bytes, row)` pair currently held, in insertion order (TPUT
    /// phase 2, : enumerating a worker's own candidates above
    /// threshold, or the coordinator's merged candidate set).
    pub fn entries(&self) -> impl Iterator<Item = (&Vec<u8>, &AggregatedRow)> {
        self.insertion_order.iter().map(move |k| (k, &self.rows[k]))
    }
}
