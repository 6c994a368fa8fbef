//! Double-buffered exchange plus the coordinator's wait-any receive loop. Two
//! pieces live here:
//!
//! - [`DoubleBuffer`]: the worker-side ping-pong buffer pair that lets a
//!   worker keep packing the next batch of matched records while the
//!   previous batch is in flight — a worker fills one buffer while the other
//!   is being sent, swapping a `crossbeam::channel` producer/consumer handoff
//!   for a pair of owned buffers since there is exactly one producer and one
//!   "in flight" slot rather than a worker pool.
//! - [`CoordinatorReceiver`]: the coordinator-side loop that wait-any
//!   dispatches across all workers until every worker has sent its
//!   terminator — the coordinator services whichever worker is ready, and
//!   a terminator is unique per worker per tag.

use std::collections::HashSet;

use crate::error::Result;
use crate::wire::framing::{is_terminator, unpack, FramePacker};
use crate::wire::transport::{Tag, Transport};

/// A pair of exchange buffers that alternate between "being filled" and
/// "handed off" roles.
pub struct DoubleBuffer {
    capacity: usize,
    front: Vec<u8>,
    back: Vec<u8>,
}

impl DoubleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, front: Vec::with_capacity(capacity), back: Vec::with_capacity(capacity) }
    }

    /// Swap the filled ("front") buffer out for the empty ("back") one,
    /// returning the filled buffer's bytes for transmission. The returned
    /// buffer's capacity is reused on the next swap.
    pub fn swap(&mut self) -> Vec<u8> {
        std::mem::swap(&mut self.front, &mut self.back);
        let ready = std::mem::replace(&mut self.back, Vec::with_capacity(self.capacity));
        ready
    }

    pub fn front_mut(&mut self) -> &mut Vec<u8> {
        &mut self.front
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Repeatedly wait-any dispatches on [`Tag::Data`] across all workers,
/// invoking `on_records` for every decoded record, until every worker has
/// sent its zero-length terminator.
pub struct CoordinatorReceiver<'a> {
    transport: &'a dyn Transport,
    tag: Tag,
    pending: HashSet<u32>,
}

impl<'a> CoordinatorReceiver<'a> {
    /// Drain [`Tag::Data`] until every worker's record stream terminates.
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self::on_tag(transport, Tag::Data)
    }

    /// Drain an arbitrary framed-record tag until every worker terminates —
    /// the same drain loop shape also drives the TPUT phase-1 and phase-2
    /// exchanges, which reuse this terminator convention on their own tags.
    pub fn on_tag(transport: &'a dyn Transport, tag: Tag) -> Self {
        let pending = (1..transport.size()).collect();
        Self { transport, tag, pending }
    }

    /// Run the receive loop to completion. `on_records` is called once per
    /// decoded record with the originating worker's rank.
    pub fn run(mut self, mut on_records: impl FnMut(u32, &[u8]) -> Result<()>) -> Result<()> {
        while !self.pending.is_empty() {
            let (from, payload) = self.transport.recv_any(self.tag)?;
            if is_terminator(&payload) {
                self.pending.remove(&from);
                continue;
            }
            for record in unpack(&payload)? {
                on_records(from, record)?;
            }
        }
        Ok(())
    }
}

/// Pack and send one worker's full record stream on `tag` using a
/// [`DoubleBuffer`], flushing whenever the packer's buffer fills and sending
/// the terminator at the end. `records` yields pre-encoded record bytes. The
/// TPUT phase-1 and phase-2 exchanges reuse this for their worker->coordinator
/// legs.
pub fn send_records<'t>(
    transport: &'t dyn Transport,
    to: u32,
    tag: Tag,
    capacity: usize,
    records: impl Iterator<Item = Vec<u8>>,
) -> Result<()> {
    let mut double = DoubleBuffer::new(capacity);
    let mut packer = FramePacker::new(double.capacity(), |buf: &[u8]| {
        double.front_mut().clear();
        double.front_mut().extend_from_slice(buf);
        let ready = double.swap();
        transport.send(to, tag, &ready)
    });
    for record in records {
        packer.push(&record)?;
    }
    packer.finish()
}
