//! In-process transport.
//!
//! Nodes register under their listen address and call each other directly.
//! Every transaction delivery is recorded, which lets tests check exactly
//! who relayed what to whom.

use crate::core::Transaction;
use crate::error::{LedgerError, Result};
use crate::network::{Dialer, PeerClient, Version};
use crate::node::Node;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub from: String,
    pub to: String,
    pub tx_hash: String,
}

#[derive(Default)]
struct Registry {
    nodes: RwLock<HashMap<String, Weak<Node>>>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl Registry {
    fn lookup(&self, addr: &str) -> Result<Arc<Node>> {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(addr)
            .and_then(Weak::upgrade)
            .ok_or_else(|| LedgerError::Network(format!("No node listening on {addr}")))
    }
}

#[derive(Default)]
pub struct LocalNetwork {
    registry: Arc<Registry>,
}

impl LocalNetwork {
    pub fn new() -> Arc<LocalNetwork> {
        Arc::new(LocalNetwork::default())
    }

    /// Makes `node` reachable at its listen address.
    pub fn register(&self, node: &Arc<Node>) {
        self.registry
            .nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(node.listen_addr().to_string(), Arc::downgrade(node));
    }

    /// Takes an address off the network. Existing clients start failing.
    pub fn unregister(&self, addr: &str) {
        self.registry
            .nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(addr);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.registry
            .deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Dialer for LocalNetwork {
    fn dial(&self, addr: &str) -> Result<Arc<dyn PeerClient>> {
        self.registry.lookup(addr)?;
        Ok(Arc::new(LocalClient {
            addr: addr.to_string(),
            registry: Arc::clone(&self.registry),
        }))
    }
}

struct LocalClient {
    addr: String,
    registry: Arc<Registry>,
}

impl PeerClient for LocalClient {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn handshake(&self, version: &Version) -> Result<Version> {
        self.registry.lookup(&self.addr)?.handshake(version.clone())
    }

    fn handle_transaction(&self, origin: &str, addr_from: &str, tx: &Transaction) -> Result<()> {
        let node = self.registry.lookup(&self.addr)?;
        self.registry
            .deliveries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Delivery {
                from: addr_from.to_string(),
                to: self.addr.clone(),
                tx_hash: tx.hash_hex(),
            });
        node.handle_transaction(origin, addr_from, tx.clone())
    }
}
