use super::Rw;
use crate::{debug, warn};
use tokio::net::TcpStream;

pub type Connection = Rw<TcpStream>;

impl Connection {
    pub fn new(
        stream: TcpStream,
        tcp_nodelay: bool,
        tcp_buffer_size: usize,
    ) -> Self {
        // configure stream
        configure(&stream, tcp_nodelay);
        // create rw
        Rw::from(tcp_buffer_size, tcp_buffer_size, stream)
    }
}

fn configure(stream: &TcpStream, tcp_nodelay: bool) {
    // set TCP_NODELAY; a connection without it is slower, but still usable
    if let Err(e) = stream.set_nodelay(tcp_nodelay) {
        warn!("[connection] error setting TCP_NODELAY: {:?}", e);
    }
    debug!(
        "[connection] peer: {:?} | TCP_NODELAY: {:?}",
        stream.peer_addr(),
        stream.nodelay()
    );
}
