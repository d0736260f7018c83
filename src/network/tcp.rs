//! TCP transport.
//!
//! One JSON `Package` per connection, answered by one JSON `Response`.
//! The server runs a thread per inbound connection; clients bound every
//! connect, read and write by the dial timeout.

use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use crate::network::{Dialer, Package, PeerClient, Response, Version};
use crate::node::Node;
use log::{debug, error, info};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const SERVER_READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind(addr: &str) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| LedgerError::Network(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Server { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the listener fails. Blocks.
    pub fn run(self, node: Arc<Node>) {
        if let Ok(addr) = self.listener.local_addr() {
            info!("Server listening on {addr}");
        }
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let node = Arc::clone(&node);
                    let spawned = thread::Builder::new()
                        .name("connection".to_string())
                        .spawn(move || {
                            let peer_addr = stream
                                .peer_addr()
                                .map(|a| a.to_string())
                                .unwrap_or_else(|_| "unknown".to_string());
                            if let Err(e) = handle_connection(&node, stream) {
                                error!("Error handling connection from {peer_addr}: {e}");
                            }
                        });
                    if let Err(e) = spawned {
                        error!("Failed to spawn connection handler: {e}");
                    }
                }
                Err(e) => error!("Error accepting connection: {e}"),
            }
        }
    }

    pub fn spawn(self, node: Arc<Node>) -> Result<JoinHandle<()>> {
        Ok(thread::Builder::new()
            .name("server".to_string())
            .spawn(move || self.run(node))?)
    }
}

fn handle_connection(node: &Node, stream: TcpStream) -> Result<()> {
    stream.set_read_timeout(Some(SERVER_READ_TIMEOUT))?;

    let reader = BufReader::new(&stream);
    let pkg = match Deserializer::from_reader(reader).into_iter::<Package>().next() {
        Some(pkg) => pkg?,
        None => return Ok(()),
    };
    debug!("Received {pkg:?}");

    let response = match pkg {
        Package::Handshake { version } => match node.handshake(version) {
            Ok(local) => Response::Version(local),
            Err(e) => Response::Error(e.to_string()),
        },
        Package::Transaction {
            origin,
            addr_from,
            transaction,
        } => match node.handle_transaction(&origin, &addr_from, transaction) {
            Ok(()) => Response::Ack,
            Err(e) => Response::Error(e.to_string()),
        },
    };

    let mut writer = &stream;
    serde_json::to_writer(&mut writer, &response)?;
    writer.flush()?;
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

pub struct TcpDialer {
    timeout: Duration,
}

impl TcpDialer {
    pub fn new(timeout: Duration) -> TcpDialer {
        TcpDialer { timeout }
    }
}

impl Dialer for TcpDialer {
    fn dial(&self, addr: &str) -> Result<Arc<dyn PeerClient>> {
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| LedgerError::Network(format!("Invalid address {addr}: {e}")))?
            .next()
            .ok_or_else(|| LedgerError::Network(format!("Address {addr} did not resolve")))?;
        Ok(Arc::new(TcpClient {
            addr: addr.to_string(),
            socket_addr,
            timeout: self.timeout,
        }))
    }
}

/// Opens a fresh connection per call.
pub struct TcpClient {
    addr: String,
    socket_addr: SocketAddr,
    timeout: Duration,
}

impl TcpClient {
    fn request(&self, pkg: &Package) -> Result<Response> {
        let stream = TcpStream::connect_timeout(&self.socket_addr, self.timeout).map_err(|e| {
            LedgerError::Network(format!("Failed to connect to {}: {e}", self.addr))
        })?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.set_read_timeout(Some(self.timeout))?;

        let mut writer = &stream;
        serde_json::to_writer(&mut writer, pkg)
            .map_err(|e| LedgerError::Network(format!("Failed to send to {}: {e}", self.addr)))?;
        writer.flush()?;

        let reader = BufReader::new(&stream);
        match Deserializer::from_reader(reader).into_iter::<Response>().next() {
            Some(Ok(Response::Error(msg))) => Err(LedgerError::Network(msg)),
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(LedgerError::Network(format!(
                "Bad response from {}: {e}",
                self.addr
            ))),
            None => Err(LedgerError::Network(format!(
                "{} closed the connection",
                self.addr
            ))),
        }
    }
}

impl PeerClient for TcpClient {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn handshake(&self, version: &Version) -> Result<Version> {
        let pkg = Package::Handshake {
            version: version.clone(),
        };
        match self.request(&pkg)? {
            Response::Version(remote) => Ok(remote),
            other => Err(LedgerError::Network(format!(
                "Unexpected handshake reply from {}: {other:?}",
                self.addr
            ))),
        }
    }

    fn handle_transaction(&self, origin: &str, addr_from: &str, tx: &Transaction) -> Result<()> {
        let pkg = Package::Transaction {
            origin: origin.to_string(),
            addr_from: addr_from.to_string(),
            transaction: tx.clone(),
        };
        match self.request(&pkg)? {
            Response::Ack => Ok(()),
            other => Err(LedgerError::Network(format!(
                "Unexpected transaction reply from {}: {other:?}",
                self.addr
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_rejects_garbage_address() {
        let dialer = TcpDialer::new(Duration::from_millis(200));
        assert!(matches!(
            dialer.dial("not an address"),
            Err(LedgerError::Network(_))
        ));
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        // Bind then drop to find a port with nothing listening.
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client = TcpDialer::new(Duration::from_millis(500))
            .dial(&addr.to_string())
            .unwrap();
        assert!(matches!(
            client.handshake(&Version::default()),
            Err(LedgerError::Network(_))
        ));
    }
}
