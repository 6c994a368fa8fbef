//! Wire protocol: transport abstraction, record framing, and the
//! double-buffered coordinator receive loop.

pub mod framing;
pub mod receiver;
pub mod transport;

pub use framing::{is_terminator, unpack, FramePacker, DEFAULT_XCHG_BUFF_SIZE};
pub use receiver::{send_records, CoordinatorReceiver, DoubleBuffer};
pub use transport::{LoopbackTransport, Tag, TcpTransport, Transport};
