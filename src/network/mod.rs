//! Peer-to-peer networking
//!
//! Handshake and transaction messages, the peer table, the transport seam,
//! and its two implementations: JSON over TCP for real deployments and an
//! in-process network for tests and simulations.

pub mod local;
pub mod message;
pub mod peer;
pub mod tcp;
pub mod transport;

pub use local::{Delivery, LocalNetwork};
pub use message::{Package, Response, Version};
pub use peer::{PeerEntry, PeerState, PeerTable};
pub use tcp::{Server, TcpClient, TcpDialer};
pub use transport::{Dialer, PeerClient};
