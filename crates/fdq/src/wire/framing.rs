//! Length-prefixed record framing into fixed-size exchange buffers. The
//! buffer-fill-then-flush shape follows a record-count-threshold loop
//! adapted to a byte-capacity threshold instead.

use crate::error::{Error, Result};

/// Default exchange buffer capacity. Kept small in tests to exercise the
/// split-buffer edge case without huge fixtures.
pub const DEFAULT_XCHG_BUFF_SIZE: usize = 256 * 1024;

const LEN_PREFIX_SIZE: usize = 4;

/// Accumulates encoded records into `XCHG_BUFF_SIZE`-capacity buffers,
/// flushing a buffer via `on_flush` whenever the next record would not fit.
/// Call [`FramePacker::finish`] to flush any partial buffer and send the
/// zero-length terminator.
pub struct FramePacker<'a> {
    capacity: usize,
    buf: Vec<u8>,
    on_flush: Box<dyn FnMut(&[u8]) -> Result<()> + 'a>,
}

impl<'a> FramePacker<'a> {
    pub fn new(capacity: usize, on_flush: impl FnMut(&[u8]) -> Result<()> + 'a) -> Self {
        Self { capacity, buf: Vec::with_capacity(capacity), on_flush: Box::new(on_flush) }
    }

    /// Append one encoded record, flushing the current buffer first if the
    /// record (plus its length prefix) does not fit.
    pub fn push(&mut self, record: &[u8]) -> Result<()> {
        let needed = LEN_PREFIX_SIZE + record.len();
        if needed > self.capacity {
            return Err(Error::internal(
                format!("record of {} bytes does not fit in a {}-byte exchange buffer", record.len(), self.capacity),
                crate::origin!(),
            ));
        }
        if self.buf.len() + needed > self.capacity {
            self.flush()?;
        }
        self.buf.extend_from_slice(&(record.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(record);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            (self.on_flush)(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Flush any remaining partial buffer, then send the zero-length
    /// terminator message: a final zero-length data message acts as the
    /// worker's stream terminator.
    pub fn finish(mut self) -> Result<()> {
        self.flush()?;
        (self.on_flush)(&[])
    }
}

/// Walk a received buffer and yield each record's bytes. Returns `Err` if a
/// length prefix claims more bytes than remain in the buffer (a malformed
/// message is fatal).
pub fn unpack(buf: &[u8]) -> Result<Vec<&[u8]>> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        let header = buf.get(offset..offset + LEN_PREFIX_SIZE).ok_or_else(|| {
            Error::protocol("truncated length prefix in framed buffer", crate::origin!())
        })?;
        let len = u32::from_le_bytes(header.try_into().unwrap()) as usize;
        offset += LEN_PREFIX_SIZE;
        let record = buf.get(offset..offset + len).ok_or_else(|| {
            Error::protocol("record payload exceeds received buffer length", crate::origin!())
        })?;
        records.push(record);
        offset += len;
    }
    Ok(records)
}

/// `true` iff `buf` is the zero-byte stream terminator.
pub fn is_terminator(buf: &[u8]) -> bool {
    buf.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn pack_all(capacity: usize, records: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let flushed = RefCell::new(Vec::new());
        {
            let mut packer = FramePacker::new(capacity, |buf: &[u8]| {
                flushed.borrow_mut().push(buf.to_vec());
                Ok(())
            });
            for r in records {
                packer.push(r).unwrap();
            }
            packer.finish().unwrap();
        }
        flushed.into_inner()
    }

    #[test]
    fn round_trip_preserves_order_with_ample_capacity() {
        let records: Vec<Vec<u8>> = vec![b"r1".to_vec(), b"record-two".to_vec(), b"r3".to_vec()];
        let buffers = pack_all(DEFAULT_XCHG_BUFF_SIZE, &records);
        assert_eq!(buffers.len(), 2); // one data buffer, one zero-length terminator
        assert!(is_terminator(buffers.last().unwrap()));

        let mut decoded = Vec::new();
        for buf in &buffers[..buffers.len() - 1] {
            decoded.extend(unpack(buf).unwrap().into_iter().map(|r| r.to_vec()));
        }
        assert_eq!(decoded, records);
    }

    #[test]
    fn splits_across_buffers_without_corrupting_records() {
        // A record sized to just fill a buffer, followed by a small record,
        // must land in two buffers without splitting either.
        let capacity = 32;
        let first = vec![7u8; capacity - 4 - 4]; // capacity - len_prefix - a bit of headroom
        let second = vec![9u8; 1];
        let buffers = pack_all(capacity, &[first.clone(), second.clone()]);

        let mut decoded = Vec::new();
        let mut saw_split = false;
        for buf in &buffers {
            if is_terminator(buf) {
                continue;
            }
            let records = unpack(buf).unwrap();
            if decoded.is_empty() && records.len() == 1 {
                saw_split = true;
            }
            decoded.extend(records.into_iter().map(|r| r.to_vec()));
        }
        assert!(saw_split, "expected the large record to occupy its own buffer");
        assert_eq!(decoded, vec![first, second]);
    }

    #[test]
    fn empty_stream_is_just_the_terminator() {
        let buffers = pack_all(DEFAULT_XCHG_BUFF_SIZE, &[]);
        assert_eq!(buffers.len(), 1);
        assert!(is_terminator(&buffers[0]));
    }

    #[test]
    fn truncated_length_prefix_is_a_protocol_error() {
        let err = unpack(&[1, 2]).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Protocol);
    }
}
