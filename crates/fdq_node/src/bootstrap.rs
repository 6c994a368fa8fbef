//! Static process-group bootstrap over TCP: the coordinator opens one TCP
//! listener and accepts exactly W worker connections in arbitrary order,
//! assigning ranks 1..W by connection order; each worker is launched with
//! the coordinator's address on its command line and connects once.
//!
//! The connection-order rank assignment is the one piece of state a worker
//! cannot know on its own, so the coordinator hands it over as a small
//! fixed-width preamble (rank, size) ahead of the tagged wire protocol proper
//! — the only bytes on the wire that are not one of [`fdq::wire::transport::Tag`]'s
//! framed messages.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use fdq::error::Result;
use fdq::wire::transport::TcpTransport;

/// Accept exactly `worker_count` worker connections on `listen_addr`, in
/// whatever order they arrive, and assign ranks 1..=worker_count by that
/// arrival order.
pub fn bootstrap_coordinator(listen_addr: &str, worker_count: u32) -> Result<TcpTransport> {
    let listener = TcpListener::bind(listen_addr)?;
    let size = worker_count + 1;
    let mut streams = Vec::with_capacity(worker_count as usize);
    for i in 0..worker_count {
        let (mut stream, _peer) = listener.accept()?;
        let rank = i + 1;
        stream.write_all(&rank.to_le_bytes())?;
        stream.write_all(&size.to_le_bytes())?;
        streams.push(stream);
    }
    Ok(TcpTransport::new_coordinator(streams))
}

/// Connect once to the coordinator at `coordinator_addr` and read back the
/// (rank, size) preamble it assigns on acceptance.
pub fn bootstrap_worker(coordinator_addr: &str) -> Result<TcpTransport> {
    let mut stream = TcpStream::connect(coordinator_addr)?;
    let rank = read_u32(&mut stream)?;
    let size = read_u32(&mut stream)?;
    Ok(TcpTransport::new_worker(rank, size, stream))
}

fn read_u32(stream: &mut TcpStream) -> Result<u32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdq::wire::transport::Transport;

    #[test]
    fn coordinator_assigns_ranks_by_connection_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // free the port, bootstrap_coordinator rebinds it

        let addr_string = addr.to_string();
        let coordinator_handle = {
            let addr_string = addr_string.clone();
            std::thread::spawn(move || bootstrap_coordinator(&addr_string, 2).unwrap())
        };
        // give the listener a moment to bind before workers dial in
        std::thread::sleep(std::time::Duration::from_millis(50));

        let w1 = std::thread::spawn({
            let addr_string = addr_string.clone();
            move || bootstrap_worker(&addr_string).unwrap()
        });
        let w2 = std::thread::spawn(move || bootstrap_worker(&addr_string).unwrap());

        let coordinator = coordinator_handle.join().unwrap();
        let t1 = w1.join().unwrap();
        let t2 = w2.join().unwrap();

        assert_eq!(coordinator.rank(), 0);
        assert_eq!(coordinator.size(), 3);
        let ranks: Vec<u32> = vec![t1.rank(), t2.rank()];
        assert!(ranks.contains(&1));
        assert!(ranks.contains(&2));
        assert_eq!(t1.size(), 3);
    }
}
