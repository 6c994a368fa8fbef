//! Crate-wide error taxonomy.
//!
//! A single enum carries every error variant the session can hit, each with
//! an `ErrorCode` used to map onto the process exit status. Rather than a
//! `throw!()`-style macro that prints a message and exits on the spot, this
//! crate threads `Result<T, Error>` through every fallible boundary and
//! converts a terminal `Err` into an exit code once, in `fdq_node::main`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit-status codes. `Ok`/`Help` are not used as `Error` variants;
/// they are the two non-error outcomes of CLI parsing and session dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Ok               = 0,
    Eof              = 10,
    OutOfMemory      = 11,
    Transport        = 12,
    External         = 13,
    Internal         = 14,
    BadArgument      = 15,
    BadPath          = 16,
    BadFilter        = 17,
    InsufficientParallelism = 18,
    Protocol         = 19,
}

/// Where in the source an error was raised, captured via `file!()`/`line!()`
/// at the call site. Rendered in `Display` only above a configured
/// verbosity level.
#[derive(Debug, Clone)]
pub struct Origin {
    pub file: &'static str,
    pub line: u32,
}

#[macro_export]
macro_rules! origin {
    () => {
        $crate::error::Origin { file: file!(), line: line!() }
    };
}

/// The crate-wide error type. Every variant carries an [`Origin`] and an
/// optional human-readable detail; verbose `Display` includes the origin,
/// quiet `Display` does not (see [`Error::display_verbose`]).
#[derive(Debug, Error)]
pub enum Error {
    #[error("end of stream")]
    Eof { origin: Origin },

    #[error("out of memory: {detail}")]
    OutOfMemory { origin: Origin, detail: String },

    #[error("transport error: {detail}")]
    Transport { origin: Origin, detail: String },

    #[error("external flow-record library error: {detail}")]
    External { origin: Origin, detail: String, secondary_code: Option<i32> },

    #[error("internal error: {detail}")]
    Internal { origin: Origin, detail: String },

    #[error("bad argument: {detail}")]
    BadArgument { origin: Origin, detail: String },

    #[error("bad path {path:?}: {detail}")]
    BadPath { origin: Origin, path: PathBuf, detail: String },

    #[error("bad filter expression {expr:?}: {detail}")]
    BadFilter { origin: Origin, expr: String, detail: String },

    #[error("insufficient parallelism: need at least 1 coordinator + 1 worker, got {size} rank(s)")]
    InsufficientParallelism { origin: Origin, size: usize },

    #[error("protocol violation: {detail}")]
    Protocol { origin: Origin, detail: String },
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Eof { .. }                     => ErrorCode::Eof,
            Error::OutOfMemory { .. }              => ErrorCode::OutOfMemory,
            Error::Transport { .. }                => ErrorCode::Transport,
            Error::External { .. }                 => ErrorCode::External,
            Error::Internal { .. }                 => ErrorCode::Internal,
            Error::BadArgument { .. }               => ErrorCode::BadArgument,
            Error::BadPath { .. }                  => ErrorCode::BadPath,
            Error::BadFilter { .. }                 => ErrorCode::BadFilter,
            Error::InsufficientParallelism { .. }    => ErrorCode::InsufficientParallelism,
            Error::Protocol { .. }                  => ErrorCode::Protocol,
        }
    }

    fn origin(&self) -> &Origin {
        match self {
            Error::Eof { origin }
            | Error::OutOfMemory { origin, .. }
            | Error::Transport { origin, .. }
            | Error::External { origin, .. }
            | Error::Internal { origin, .. }
            | Error::BadArgument { origin, .. }
            | Error::BadPath { origin, .. }
            | Error::BadFilter { origin, .. }
            | Error::InsufficientParallelism { origin, .. }
            | Error::Protocol { origin, .. } => origin,
        }
    }

    /// Render this error the way a non-quiet verbosity should: message plus
    /// the originating file and line.
    pub fn display_verbose(&self) -> String {
        let origin = self.origin();
        format!("{self} ({}:{})", origin.file, origin.line)
    }

    pub fn transport(detail: impl Into<String>, origin: Origin) -> Self {
        Error::Transport { origin, detail: detail.into() }
    }

    pub fn internal(detail: impl Into<String>, origin: Origin) -> Self {
        Error::Internal { origin, detail: detail.into() }
    }

    pub fn protocol(detail: impl Into<String>, origin: Origin) -> Self {
        Error::Protocol { origin, detail: detail.into() }
    }

    pub fn bad_argument(detail: impl Into<String>, origin: Origin) -> Self {
        Error::BadArgument { origin, detail: detail.into() }
    }

    pub fn bad_filter(expr: impl Into<String>, detail: impl Into<String>, origin: Origin) -> Self {
        Error::BadFilter { origin, expr: expr.into(), detail: detail.into() }
    }

    pub fn bad_path(path: impl Into<PathBuf>, detail: impl Into<String>, origin: Origin) -> Self {
        Error::BadPath { origin, path: path.into(), detail: detail.into() }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transport { origin: origin!(), detail: e.to_string() }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Transport { origin: origin!(), detail: format!("codec error: {e}") }
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Internal { origin: origin!(), detail: format!("csv error: {e}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_display_includes_origin() {
        let err = Error::Internal { origin: origin!(), detail: "boom".to_string() };
        let rendered = err.display_verbose();
        assert!(rendered.contains("boom"));
        assert!(rendered.contains("error.rs"));
    }

    #[test]
    fn code_maps_each_variant() {
        assert_eq!(Error::Eof { origin: origin!() }.code(), ErrorCode::Eof);
        assert_eq!(
            Error::InsufficientParallelism { origin: origin!(), size: 1 }.code(),
            ErrorCode::InsufficientParallelism
        );
    }
}
