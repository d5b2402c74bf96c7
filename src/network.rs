extern crate net2;

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use net2::TcpBuilder;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Opens a connection to `host:port`, trying each resolved address in turn.
pub fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let addrstr = format!("{}:{}", host, port);
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(source) => return Err(Error::Connect { addr: addrstr, source }),
    };

    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
    for addr in addrs {
        match connect_addr(addr) {
            Ok(stream) => {
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_err = e;
            }
        }
    }
    Err(Error::Connect {
        addr: addrstr,
        source: last_err,
    })
}

fn connect_addr(addr: SocketAddr) -> io::Result<TcpStream> {
    let builder = match addr {
        SocketAddr::V4(_) => TcpBuilder::new_v4()?,
        SocketAddr::V6(_) => TcpBuilder::new_v6()?,
    };
    builder.connect(addr)
}

/// Binds and listens on `bind_host:port` with address reuse, so a data port
/// can be taken again right after the previous transfer released it.
pub fn listen(bind_host: &str, port: u16) -> Result<TcpListener> {
    let addr = (bind_host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("cannot resolve {}", bind_host)))?;
    let builder = match addr {
        SocketAddr::V4(_) => TcpBuilder::new_v4()?,
        SocketAddr::V6(_) => TcpBuilder::new_v6()?,
    };
    builder.reuse_address(true)?;
    builder
        .bind(addr)
        .map_err(|e| io::Error::new(e.kind(), format!("cannot bind to port {}: {}", port, e)))?;
    let listener = builder
        .listen(10)
        .map_err(|e| io::Error::new(e.kind(), format!("listening on port {} failed: {}", port, e)))?;
    debug!(%addr, "listening");
    Ok(listener)
}

/// Read and write timeouts on an established stream. `None` blocks forever.
pub fn apply_timeout(stream: &TcpStream, timeout: Option<Duration>) -> Result<()> {
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    Ok(())
}

/// Shuts both directions down; the descriptor itself goes with the drop.
pub fn close(stream: &TcpStream, role: &str) {
    match stream.shutdown(std::net::Shutdown::Both) {
        Ok(()) => debug!(role, "connection closed"),
        // the peer may already have gone away
        Err(e) if e.kind() == io::ErrorKind::NotConnected => debug!(role, "connection already closed"),
        Err(e) => warn!(role, error = %e, "shutdown failed"),
    }
}
