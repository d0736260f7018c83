//! Transport seam between the node and its peers.
//!
//! A `PeerClient` is the handle a node keeps for each connected peer; a
//! `Dialer` turns a listen address into one. The TCP and in-process
//! transports both implement these.

use crate::core::Transaction;
use crate::error::Result;
use crate::network::Version;
use std::sync::Arc;

pub trait PeerClient: Send + Sync {
    /// Listen address this client talks to.
    fn addr(&self) -> &str;

    /// Sends our version, returns theirs.
    fn handshake(&self, version: &Version) -> Result<Version>;

    /// Delivers a transaction. `origin` is the listen address of the node the
    /// transaction entered the network at, `addr_from` the sender's.
    fn handle_transaction(&self, origin: &str, addr_from: &str, tx: &Transaction) -> Result<()>;
}

pub trait Dialer: Send + Sync {
    fn dial(&self, addr: &str) -> Result<Arc<dyn PeerClient>>;
}
