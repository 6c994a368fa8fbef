//! Support for the `fdq` coordinator/worker binary: CLI resolution and
//! static process-group bootstrap over TCP. The session lifecycle itself
//! lives in `fdq::session` and is driven from `main.rs`; this crate only
//! supplies the two pieces that are specific to running as an actual OS
//! process rather than a library.

pub mod bootstrap;
pub mod cli;
