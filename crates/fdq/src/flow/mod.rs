//! Flow-record data model: the fixed-width wire codec, the boolean filter
//! expression evaluator, the streaming file reader, and the in-memory
//! aggregation table that groups and sums records by key.

pub mod filter;
pub mod reader;
pub mod record;
pub mod table;

pub use filter::Filter;
pub use reader::FlowReader;
pub use record::{FieldId, FieldValue, FlowRecord};
pub use table::{AggregatedRow, AggregationTable, SortMode};
