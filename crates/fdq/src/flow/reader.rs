//! `FlowReader`: the opaque external flow-record library's read-side contract
//! ,
//! with one concrete implementation supplied
//!
//! Opening/iterating mirrors `workflow::file::InputFile`
//! ; gzip-aware opening uses 's
//! own `flate2` dependency, since rotated flow-capture files are routinely
//! shipped compressed .

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};
use crate::flow::record::FlowRecord;

/// A stream of flow records read from one file. The external library this
/// stands in for would also support ingesting from e.g. live capture or a
/// socket; this spec only requires file input .
pub struct FlowReader {
    inner: Box<dyn Read>,
    path: String,
}

impl FlowReader {
    /// Open a flow-record file, transparently decompressing `.gz` files
    /// (, ).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::bad_path(path, e.to_string(), crate::origin!())
        })?;
        let reader = BufReader::with_capacity(1 << 16, file);
        let inner: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzDecoder::new(reader))
        } else {
            Box::new(reader)
        };
        Ok(Self { inner, path: path.display().to_string() })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read the next record, or `None` at a clean end of stream (
    /// `Eof` is stream-level, non-fatal). Per-file read failures that are not
    /// EOF are logged as warnings by the caller and the records already
    /// consumed are kept  — this method itself
    /// only distinguishes "got a record" from "did not".
    pub fn next_record(&mut self) -> Result<Option<FlowRecord>> {
        let mut buf = vec![0u8; FlowRecord::encoded_len()];
        match read_exact_or_eof(&mut self.inner, &mut buf) {
            ReadOutcome::Eof => Ok(None),
            ReadOutcome::Full => {
                FlowRecord::decode(&buf).map(Some).ok_or_else(|| {
                    Error::External { origin: crate::origin!(), detail: format!("malformed record in {}", self.path), secondary_code: None }
                })
            }
            ReadOutcome::Partial => Err(Error::External {
                origin: crate::origin!(),
                detail: format!("truncated record at end of {}", self.path),
                secondary_code: None,
            }),
        }
    }
}

enum ReadOutcome {
    Full,
    Eof,
    Partial,
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> ReadOutcome {
    let mut filled = 0usize;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => break,
        }
    }
    if filled == 0 {
        ReadOutcome::Eof
    } else if filled == buf.len() {
        ReadOutcome::Full
    } else {
        ReadOutcome::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::record::{FieldId, FieldValue};
    use std::io::Write;

    #[test]
    fn reads_records_written_by_the_same_codec() {
        let mut rec = FlowRecord::new();
        rec.set(FieldId::Protocol, FieldValue::U64(6));
        rec.set(FieldId::Octets, FieldValue::U64(42));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(&rec.encode()).unwrap();
        file.write_all(&rec.encode()).unwrap();
        drop(file);

        let mut reader = FlowReader::open(&path).unwrap();
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.get(FieldId::Octets), Some(FieldValue::U64(42)));
        let second = reader.next_record().unwrap();
        assert!(second.is_some());
        let third = reader.next_record().unwrap();
        assert!(third.is_none());
    }

    #[test]
    fn missing_file_is_bad_path() {
        let err = FlowReader::open("/nonexistent/path/flows.bin").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::BadPath);
    }
}
