//! `fdq` implements the distributed flow-record query engine's core:
//! the coordinator<->worker wire protocol, the double-buffered receive loop,
//! the worker file-reading pipeline, the TPUT top-N algorithm, and the
//! query mode drivers that run on top of them.
//!
//! The CLI and process bootstrap live in the `fdq_node` binary crate; this
//! crate is transport-agnostic over its `wire::Transport` capability so the
//! same drivers run against a real TCP cluster or an in-process loopback
//! used by the test suite.

// modules
pub mod error;
pub mod workflow;   // ambient stack: config, counters, log, file I/O
pub mod wire;       // transport, framing, double-buffered receiver
pub mod session;    // SessionContext and FieldSet
pub mod flow;       // flow records, filter, reader, aggregation table
pub mod worker;     // path discovery and the per-worker pipeline
pub mod progress;   // progress side-channel
pub mod drivers;    // list / sort / aggr / meta mode drivers
pub mod tput;       // three-phase TPUT top-N
pub mod stats;      // statistics reducer
pub mod format;     // pretty/CSV output

// re-exports
pub use error::{Error, ErrorCode, Result};
pub use session::{FieldSet, Role, SessionContext, WorkingMode};
pub use workflow::file::{InputFile, OutputFile};
