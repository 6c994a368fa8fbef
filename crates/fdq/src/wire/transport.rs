//! Wire transport: an MPI-flavored collective/point-to-point abstraction over
//! either real TCP sockets or an in-process loopback used by tests. Both
//! implementations share the same shape: bounded channels and a small pool of
//! worker threads, generalized from single-process fan-out to a rank/size
//! process group connected by sockets.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};

use crate::error::{Error, Result};

/// Message tags exchanged over the wire, one per protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// coord->all (collective): the broadcast `SessionContext`.
    Context,
    /// workers->coord (gather): one `u64` file count per worker.
    FileCount,
    /// worker->coord: a framed exchange buffer of matched records, terminator = 0 bytes.
    Data,
    /// worker->coord, side channel: a progress update per completed file.
    Progress,
    /// worker->coord: TPUT phase 1 candidate records + 0-byte terminator.
    Tput1,
    /// coord->all (collective): the TPUT phase-2 threshold, one `u64`.
    Tput2Threshold,
    /// worker->coord: TPUT phase 2 records above threshold + 0-byte terminator.
    Tput2,
    /// coord->all (collective): the TPUT phase-3 merged candidate key set.
    Tput3Bcast,
    /// worker->coord: TPUT phase 3 exact verification sums + 0-byte terminator.
    Tput3Reply,
    /// workers->coord (reduce): fixed-width counter-struct fragments.
    Stats,
}

/// A process-group-wide, rank/tag addressed message exchange. Implementors
/// need not be thread-safe across callers beyond what each operation
/// documents; every method here is blocking.
pub trait Transport: Send + Sync {
    fn rank(&self) -> u32;
    fn size(&self) -> u32;

    /// Point-to-point send. Blocking; the double-buffered coordinator
    /// receiver is what supplies non-blocking behavior above this layer.
    fn send(&self, to: u32, tag: Tag, payload: &[u8]) -> Result<()>;

    /// Point-to-point receive from a specific rank.
    fn recv(&self, from: u32, tag: Tag) -> Result<Vec<u8>>;

    /// Block until any rank has a message pending for `tag`, returning its
    /// rank and payload.
    fn recv_any(&self, tag: Tag) -> Result<(u32, Vec<u8>)>;

    /// Broadcast from `root` to every other rank. On the root, `payload` is
    /// sent as-is; on non-root ranks the received bytes replace `payload`'s
    /// contents.
    fn broadcast(&self, root: u32, payload: &mut Vec<u8>) -> Result<()>;

    /// Gather one payload per rank at `root`. Returns `Some` of `size()`
    /// payloads, indexed by rank, at the root; `None` elsewhere.
    fn gather(&self, root: u32, payload: &[u8]) -> Result<Option<Vec<Vec<u8>>>>;

    /// Block until every rank in the group has called `barrier`.
    fn barrier(&self) -> Result<()>;
}

/// A real process-group transport over TCP sockets. The coordinator (rank 0)
/// holds one connected stream per worker; each worker holds a single stream
/// back to the coordinator — the process group is a star topology, no
/// worker-to-worker traffic.
///
/// Every tag shares one TCP stream per peer, and the coordinator's mode
/// driver and progress loop need to drain two different tags concurrently on
/// two different threads. A coordinator reading one tag must not accidentally
/// steal a frame meant for the other, so each accepted worker connection gets
/// a dedicated reader thread that demultiplexes incoming frames into one
/// `crossbeam` channel per tag — the same per-`(peer, tag)` mailbox shape
/// [`LoopbackTransport`] already uses below, generalized from in-process
/// channels to a socket reader pump.
pub struct TcpTransport {
    rank: u32,
    size: u32,
    /// Rank 0 only: the write half of each worker's stream, indexed `worker_rank - 1`.
    worker_writers: Vec<Mutex<TcpStream>>,
    /// Rank 0 only: per-`(worker_rank - 1, tag)` demultiplexed inbound mailboxes.
    worker_inboxes: Vec<HashMap<TagKey, Receiver<Vec<u8>>>>,
    /// Non-zero ranks only: the single stream back to the coordinator. A
    /// worker's own protocol is strictly request/response (it only ever
    /// awaits the tag the session lifecycle expects next), so no demuxing is
    /// needed on this side.
    coordinator_stream: Option<Mutex<TcpStream>>,
}

const ALL_TAGS: [Tag; 10] = [
    Tag::Context,
    Tag::FileCount,
    Tag::Data,
    Tag::Progress,
    Tag::Tput1,
    Tag::Tput2Threshold,
    Tag::Tput2,
    Tag::Tput3Bcast,
    Tag::Tput3Reply,
    Tag::Stats,
];

impl TcpTransport {
    /// Build the coordinator's view of the transport from its accepted worker
    /// connections, ordered by rank (ranks are assigned by connection order).
    /// Spawns one demultiplexing reader thread per worker.
    pub fn new_coordinator(worker_streams: Vec<TcpStream>) -> Self {
        let size = worker_streams.len() as u32 + 1;
        let mut worker_writers = Vec::with_capacity(worker_streams.len());
        let mut worker_inboxes = Vec::with_capacity(worker_streams.len());
        for stream in worker_streams {
            let reader_stream = stream.try_clone().expect("tcp stream clone for demux reader thread");
            worker_writers.push(Mutex::new(stream));

            let mut senders: HashMap<TagKey, Sender<Vec<u8>>> = HashMap::new();
            let mut receivers: HashMap<TagKey, Receiver<Vec<u8>>> = HashMap::new();
            for &tag in &ALL_TAGS {
                let (tx, rx) = unbounded();
                senders.insert(tag_key(tag), tx);
                receivers.insert(tag_key(tag), rx);
            }
            std::thread::spawn(move || demux_reader_loop(reader_stream, senders));
            worker_inboxes.push(receivers);
        }
        Self { rank: 0, size, worker_writers, worker_inboxes, coordinator_stream: None }
    }

    /// Build a worker's view of the transport from its connection to the
    /// coordinator and the rank/size it was assigned during bootstrap.
    pub fn new_worker(rank: u32, size: u32, coordinator_stream: TcpStream) -> Self {
        Self {
            rank,
            size,
            worker_writers: Vec::new(),
            worker_inboxes: Vec::new(),
            coordinator_stream: Some(Mutex::new(coordinator_stream)),
        }
    }

    fn writer_to(&self, peer: u32) -> Result<&Mutex<TcpStream>> {
        if self.rank == 0 {
            self.worker_writers.get((peer - 1) as usize).ok_or_else(|| {
                Error::transport(format!("no connection to rank {peer}"), crate::origin!())
            })
        } else {
            self.coordinator_stream.as_ref().ok_or_else(|| {
                Error::internal("worker transport missing coordinator stream", crate::origin!())
            })
        }
    }

    fn inbox_from(&self, peer: u32, tag: Tag) -> Result<&Receiver<Vec<u8>>> {
        self.worker_inboxes
            .get((peer - 1) as usize)
            .and_then(|tags| tags.get(&tag_key(tag)))
            .ok_or_else(|| Error::transport(format!("no demux mailbox for rank {peer}"), crate::origin!()))
    }

    fn write_framed(stream: &mut TcpStream, tag: Tag, payload: &[u8]) -> Result<()> {
        let header = [tag as u8];
        stream.write_all(&header)?;
        stream.write_all(&(payload.len() as u64).to_le_bytes())?;
        stream.write_all(payload)?;
        Ok(())
    }

    fn read_framed(stream: &mut TcpStream) -> Result<(Tag, Vec<u8>)> {
        let mut header = [0u8; 1];
        stream.read_exact(&mut header)?;
        let tag = tag_from_byte(header[0])?;
        let mut len_buf = [0u8; 8];
        stream.read_exact(&mut len_buf)?;
        let len = u64::from_le_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload)?;
        Ok((tag, payload))
    }
}

/// Runs on its own thread for the lifetime of one worker's connection:
/// continuously reads framed messages and routes each into the channel for
/// its tag, so concurrent coordinator-side readers (data driver + progress
/// loop,  step 5) never race over the same socket. Exits quietly on
/// EOF/error at session teardown.
fn demux_reader_loop(mut stream: TcpStream, senders: HashMap<TagKey, Sender<Vec<u8>>>) {
    loop {
        let (tag, payload) = match TcpTransport::read_framed(&mut stream) {
            Ok(framed) => framed,
            Err(_) => return,
        };
        if let Some(tx) = senders.get(&tag_key(tag)) {
            if tx.send(payload).is_err() {
                return;
            }
        }
    }
}

fn tag_from_byte(b: u8) -> Result<Tag> {
    match b {
        0 => Ok(Tag::Context),
        1 => Ok(Tag::FileCount),
        2 => Ok(Tag::Data),
        3 => Ok(Tag::Progress),
        4 => Ok(Tag::Tput1),
        5 => Ok(Tag::Tput2Threshold),
        6 => Ok(Tag::Tput2),
        7 => Ok(Tag::Tput3Bcast),
        8 => Ok(Tag::Tput3Reply),
        9 => Ok(Tag::Stats),
        other => Err(Error::protocol(format!("unknown wire tag byte {other}"), crate::origin!())),
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn send(&self, to: u32, tag: Tag, payload: &[u8]) -> Result<()> {
        let mut stream = self.writer_to(to)?.lock().unwrap();
        Self::write_framed(&mut stream, tag, payload)
    }

    fn recv(&self, from: u32, tag: Tag) -> Result<Vec<u8>> {
        if self.rank == 0 {
            self.inbox_from(from, tag)?
                .recv()
                .map_err(|_| Error::transport(format!("rank {from} disconnected"), crate::origin!()))
        } else {
            let mut stream = self.writer_to(from)?.lock().unwrap();
            let (got_tag, payload) = Self::read_framed(&mut stream)?;
            if got_tag != tag {
                return Err(Error::protocol(format!("expected tag {tag:?}, got {got_tag:?}"), crate::origin!()));
            }
            Ok(payload)
        }
    }

    fn recv_any(&self, tag: Tag) -> Result<(u32, Vec<u8>)> {
        if self.rank != 0 {
            return self.recv(0, tag).map(|payload| (0, payload));
        }
        // Coordinator-side wait-any: poll each worker's per-tag mailbox
        // round-robin until one has a frame. Real MPI wait-any is
        // event-driven; this is the idiomatic substitute over plain channels —
        // fairness and eventual delivery, not a particular scheduling order.
        loop {
            for (idx, tags) in self.worker_inboxes.iter().enumerate() {
                if let Some(rx) = tags.get(&tag_key(tag)) {
                    if let Ok(payload) = rx.try_recv() {
                        return Ok((idx as u32 + 1, payload));
                    }
                }
            }
            std::thread::yield_now();
        }
    }

    fn broadcast(&self, root: u32, payload: &mut Vec<u8>) -> Result<()> {
        if self.rank == root {
            for worker in 1..self.size {
                self.send(worker, Tag::Context, payload)?;
            }
        } else {
            *payload = self.recv(root, Tag::Context)?;
        }
        Ok(())
    }

    fn gather(&self, root: u32, payload: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        if self.rank == root {
            let mut all = vec![Vec::new(); self.size as usize];
            all[root as usize] = payload.to_vec();
            for worker in 1..self.size {
                all[worker as usize] = self.recv(worker, Tag::Stats)?;
            }
            Ok(Some(all))
        } else {
            self.send(root, Tag::Stats, payload)?;
            Ok(None)
        }
    }

    fn barrier(&self) -> Result<()> {
        if self.rank == 0 {
            for worker in 1..self.size {
                self.recv(worker, Tag::Progress)?;
            }
            for worker in 1..self.size {
                self.send(worker, Tag::Progress, &[])?;
            }
        } else {
            self.send(0, Tag::Progress, &[])?;
            self.recv(0, Tag::Progress)?;
        }
        Ok(())
    }
}

/// An in-process transport backed by `crossbeam` channels, one pair per
/// `(tag, rank)` mailbox — deterministic testing without real sockets. Built
/// once for the whole group via [`LoopbackTransport::group`].
pub struct LoopbackTransport {
    rank: u32,
    size: u32,
    inboxes: Arc<HashMap<(u32, TagKey), Receiver<Vec<u8>>>>,
    outboxes: Arc<HashMap<(u32, TagKey), Sender<Vec<u8>>>>,
}

type TagKey = u8;

fn tag_key(tag: Tag) -> TagKey {
    tag as u8
}

impl LoopbackTransport {
    /// Build one [`LoopbackTransport`] per rank in a `size`-process group,
    /// fully wired so every rank can reach every other rank by `(peer, tag)`.
    pub fn group(size: u32) -> Vec<LoopbackTransport> {
        let tags = [
            Tag::Context,
            Tag::FileCount,
            Tag::Data,
            Tag::Progress,
            Tag::Tput1,
            Tag::Tput2Threshold,
            Tag::Tput2,
            Tag::Tput3Bcast,
            Tag::Tput3Reply,
            Tag::Stats,
        ];

        // channel[(sender_rank, receiver_rank, tag)]
        let mut senders: HashMap<(u32, u32, TagKey), Sender<Vec<u8>>> = HashMap::new();
        let mut receivers: HashMap<(u32, u32, TagKey), Receiver<Vec<u8>>> = HashMap::new();
        for from in 0..size {
            for to in 0..size {
                if from == to {
                    continue;
                }
                for &tag in &tags {
                    let (tx, rx) = bounded(1024);
                    senders.insert((from, to, tag_key(tag)), tx);
                    receivers.insert((from, to, tag_key(tag)), rx);
                }
            }
        }

        (0..size)
            .map(|rank| {
                let mut inboxes = HashMap::new();
                let mut outboxes = HashMap::new();
                for peer in 0..size {
                    if peer == rank {
                        continue;
                    }
                    for &tag in &tags {
                        if let Some(rx) = receivers.remove(&(peer, rank, tag_key(tag))) {
                            inboxes.insert((peer, tag_key(tag)), rx);
                        }
                        if let Some(tx) = senders.get(&(rank, peer, tag_key(tag))) {
                            outboxes.insert((peer, tag_key(tag)), tx.clone());
                        }
                    }
                }
                LoopbackTransport { rank, size, inboxes: Arc::new(inboxes), outboxes: Arc::new(outboxes) }
            })
            .collect()
    }
}

impl Transport for LoopbackTransport {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn send(&self, to: u32, tag: Tag, payload: &[u8]) -> Result<()> {
        self.outboxes
            .get(&(to, tag_key(tag)))
            .ok_or_else(|| Error::transport(format!("no loopback channel to rank {to}"), crate::origin!()))?
            .send(payload.to_vec())
            .map_err(|_| Error::transport(format!("rank {to} disconnected"), crate::origin!()))
    }

    fn recv(&self, from: u32, tag: Tag) -> Result<Vec<u8>> {
        self.inboxes
            .get(&(from, tag_key(tag)))
            .ok_or_else(|| Error::transport(format!("no loopback channel from rank {from}"), crate::origin!()))?
            .recv()
            .map_err(|_| Error::transport(format!("rank {from} disconnected"), crate::origin!()))
    }

    fn recv_any(&self, tag: Tag) -> Result<(u32, Vec<u8>)> {
        loop {
            for peer in 0..self.size {
                if peer == self.rank {
                    continue;
                }
                if let Some(rx) = self.inboxes.get(&(peer, tag_key(tag))) {
                    if let Ok(payload) = rx.try_recv() {
                        return Ok((peer, payload));
                    }
                }
            }
            std::thread::yield_now();
        }
    }

    fn broadcast(&self, root: u32, payload: &mut Vec<u8>) -> Result<()> {
        if self.rank == root {
            for peer in 0..self.size {
                if peer != root {
                    self.send(peer, Tag::Context, payload)?;
                }
            }
        } else {
            *payload = self.recv(root, Tag::Context)?;
        }
        Ok(())
    }

    fn gather(&self, root: u32, payload: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        if self.rank == root {
            let mut all = vec![Vec::new(); self.size as usize];
            all[root as usize] = payload.to_vec();
            for peer in 0..self.size {
                if peer != root {
                    all[peer as usize] = self.recv(peer, Tag::Stats)?;
                }
            }
            Ok(Some(all))
        } else {
            self.send(root, Tag::Stats, payload)?;
            Ok(None)
        }
    }

    fn barrier(&self) -> Result<()> {
        if self.rank == 0 {
            for peer in 1..self.size {
                self.recv(peer, Tag::Progress)?;
            }
            for peer in 1..self.size {
                self.send(peer, Tag::Progress, &[])?;
            }
        } else {
            self.send(0, Tag::Progress, &[])?;
            self.recv(0, Tag::Progress)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;

    #[test]
    fn loopback_point_to_point_round_trips() {
        let group = LoopbackTransport::group(2);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let worker = iter.next().unwrap();

        let handle = std::thread::spawn(move || {
            worker.send(0, Tag::Data, b"hello").unwrap();
        });
        let payload = coordinator.recv(1, Tag::Data).unwrap();
        assert_eq!(payload, b"hello");
        handle.join().unwrap();
    }

    #[test]
    fn loopback_broadcast_reaches_every_worker() {
        let group = StdArc::new(LoopbackTransport::group(3));
        let transports: Vec<_> = StdArc::try_unwrap(group).unwrap_or_else(|_| unreachable!());
        let mut iter = transports.into_iter();
        let coordinator = iter.next().unwrap();
        let workers: Vec<_> = iter.collect();

        let handles: Vec<_> = workers
            .into_iter()
            .map(|w| {
                std::thread::spawn(move || {
                    let mut buf = Vec::new();
                    w.broadcast(0, &mut buf).unwrap();
                    buf
                })
            })
            .collect();

        let mut payload = b"ctx".to_vec();
        coordinator.broadcast(0, &mut payload).unwrap();

        for h in handles {
            assert_eq!(h.join().unwrap(), b"ctx");
        }
    }

    #[test]
    fn loopback_barrier_releases_all_ranks() {
        let group = LoopbackTransport::group(3);
        let mut iter = group.into_iter();
        let coordinator = iter.next().unwrap();
        let workers: Vec<_> = iter.collect();

        let handles: Vec<_> = workers.into_iter().map(|w| std::thread::spawn(move || w.barrier().unwrap())).collect();
        coordinator.barrier().unwrap();
        for h in handles {
            h.join().unwrap();
        }
    }
}
