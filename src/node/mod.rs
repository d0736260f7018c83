//! Ledger node
//!
//! Composes the chain, the mempool and the peer table, and answers the two
//! peer calls: `handshake` and `handle_transaction`. Discovery dials and
//! transaction relays run on their own threads so an inbound call is never
//! held up by downstream peers.

pub mod validator;

pub use validator::ValidatorHandle;

use crate::config::Config;
use crate::core::{verify_transaction, Chain, Transaction};
use crate::crypto::PrivateKey;
use crate::error::{LedgerError, Result};
use crate::network::{Dialer, PeerEntry, PeerState, PeerTable, Version};
use crate::storage::Mempool;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

pub struct Node {
    listen_addr: String,
    version: String,
    block_time: Duration,
    chain: Chain,
    mempool: Mempool,
    peers: PeerTable,
    dialer: Arc<dyn Dialer>,
    validator_key: Option<PrivateKey>,
    this: Weak<Node>,
}

impl Node {
    pub fn new(config: &Config, chain: Chain, dialer: Arc<dyn Dialer>) -> Result<Arc<Node>> {
        config.validate()?;
        let validator_key = config.validator_key()?;
        if let Some(key) = &validator_key {
            info!("Validator address: {}", key.public().address());
        }
        Ok(Arc::new_cyclic(|this| Node {
            listen_addr: config.listen_addr.clone(),
            version: config.version.clone(),
            block_time: config.block_time(),
            chain,
            mempool: Mempool::new(),
            peers: PeerTable::new(&config.listen_addr),
            dialer,
            validator_key,
            this: this.clone(),
        }))
    }

    /// Opens the chain in `config.data_dir`, or in memory when unset.
    pub fn from_config(config: &Config, dialer: Arc<dyn Dialer>) -> Result<Arc<Node>> {
        let chain = match &config.data_dir {
            Some(dir) => Chain::open(dir)?,
            None => Chain::in_memory()?,
        };
        Node::new(config, chain, dialer)
    }

    fn spawn<F>(&self, name: &str, task: F)
    where
        F: FnOnce(Arc<Node>) + Send + 'static,
    {
        let Some(node) = self.this.upgrade() else {
            return;
        };
        if let Err(e) = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || task(node))
        {
            error!("Failed to spawn {name} task: {e}");
        }
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn is_validator(&self) -> bool {
        self.validator_key.is_some()
    }

    pub fn version(&self) -> Version {
        Version {
            version: self.version.clone(),
            height: self.chain.height() as i64,
            listen_addr: self.listen_addr.clone(),
            peer_list: self.peers.peer_list(),
        }
    }

    pub fn peer_list(&self) -> Vec<String> {
        self.peers.peer_list()
    }

    pub fn peer_state(&self, addr: &str) -> PeerState {
        self.peers.state(addr)
    }

    pub fn peer_version(&self, addr: &str) -> Option<Version> {
        self.peers.get(addr).map(|entry| entry.version)
    }

    fn check_remote(&self, remote: &Version) -> std::result::Result<(), String> {
        if remote.listen_addr.is_empty() {
            return Err("empty listen address".to_string());
        }
        if remote.listen_addr == self.listen_addr {
            return Err("refusing connection to self".to_string());
        }
        if remote.version != self.version {
            return Err(format!(
                "incompatible version {} (local {})",
                remote.version, self.version
            ));
        }
        Ok(())
    }

    /// Inbound handshake. Registers the remote under its listen address and
    /// dials any peer it advertises that we do not know yet.
    pub fn handshake(&self, remote: Version) -> Result<Version> {
        let addr = remote.listen_addr.clone();
        self.check_remote(&remote)
            .map_err(|reason| LedgerError::HandshakeFailed {
                addr: addr.clone(),
                reason,
            })?;

        if self.peers.get(&addr).is_none() {
            let client = self
                .dialer
                .dial(&addr)
                .map_err(|e| LedgerError::HandshakeFailed {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })?;
            let entry = PeerEntry {
                client,
                version: remote.clone(),
            };
            if self.peers.register(&addr, entry) {
                info!("Accepted peer {addr} at height {}", remote.height);
            }
        }

        self.discover(&remote);
        Ok(self.version())
    }

    fn discover(&self, remote: &Version) {
        let unknown: Vec<String> = remote
            .peer_list
            .iter()
            .filter(|addr| !self.peers.is_known(addr))
            .cloned()
            .collect();
        if unknown.is_empty() {
            return;
        }
        debug!(
            "Discovered {} new peer(s) via {}",
            unknown.len(),
            remote.listen_addr
        );
        let via = remote.listen_addr.clone();
        self.spawn("discovery", move |node| {
            if let Err(e) = node.bootstrap(&unknown) {
                warn!("Discovery via {via}: {e}");
            }
        });
    }

    /// Dials one address and exchanges versions. Returns `Ok` without
    /// dialing when the address is self, connected, or already being dialed.
    pub fn connect(&self, addr: &str) -> Result<()> {
        if !self.peers.begin_dial(addr) {
            debug!("Skipping {addr}: already known");
            return Ok(());
        }
        match self.dial_and_handshake(addr) {
            Ok(remote) => {
                self.discover(&remote);
                Ok(())
            }
            Err(e) => {
                self.peers.abandon(addr);
                warn!("Failed to connect to {addr}: {e}");
                Err(e)
            }
        }
    }

    fn dial_and_handshake(&self, addr: &str) -> Result<Version> {
        let fail = |reason: String| LedgerError::HandshakeFailed {
            addr: addr.to_string(),
            reason,
        };
        let client = self.dialer.dial(addr).map_err(|e| fail(e.to_string()))?;
        self.peers.set_handshaking(addr);
        let remote = client
            .handshake(&self.version())
            .map_err(|e| fail(e.to_string()))?;
        if remote.version != self.version {
            return Err(fail(format!("incompatible version {}", remote.version)));
        }
        let entry = PeerEntry {
            client,
            version: remote.clone(),
        };
        if self.peers.register(addr, entry) {
            info!("Connected to peer {addr} at height {}", remote.height);
        }
        Ok(remote)
    }

    /// Dials every candidate concurrently. A failed address does not stop
    /// the others; all failures come back in `LedgerError::Bootstrap`.
    pub fn bootstrap(&self, addrs: &[String]) -> Result<()> {
        let mut seen = HashSet::new();
        let candidates: Vec<&str> = addrs
            .iter()
            .map(String::as_str)
            .filter(|addr| seen.insert(*addr))
            .filter(|addr| !self.peers.is_known(addr))
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let failures: Vec<(String, String)> = thread::scope(|scope| {
            let dials: Vec<_> = candidates
                .iter()
                .map(|addr| (*addr, scope.spawn(move || self.connect(addr))))
                .collect();
            dials
                .into_iter()
                .filter_map(|(addr, dial)| match dial.join() {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some((addr.to_string(), e.to_string())),
                    Err(_) => Some((addr.to_string(), "dial task panicked".to_string())),
                })
                .collect()
        });

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Bootstrap(failures))
        }
    }

    /// Entry point for a transaction created on this node.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        self.handle_transaction(&self.listen_addr, &self.listen_addr, tx)
    }

    /// Pools a relayed transaction and, only if it was new, relays it to
    /// every peer except `origin` and `addr_from`.
    pub fn handle_transaction(
        &self,
        origin: &str,
        addr_from: &str,
        tx: Transaction,
    ) -> Result<()> {
        if !verify_transaction(&tx) {
            warn!("Rejected transaction from {addr_from}: invalid signature");
            return Err(LedgerError::InvalidTransactionSignature);
        }

        let hash = tx.hash_hex();
        if self.chain.get_transaction(&hash).is_ok() {
            debug!("Transaction {hash} already confirmed");
            return Ok(());
        }
        if !self.mempool.add(tx.clone()) {
            debug!("Transaction {hash} already pending");
            return Ok(());
        }
        info!("Accepted transaction {hash} from {addr_from}");

        let origin = origin.to_string();
        let from = addr_from.to_string();
        self.spawn("broadcast", move |node| {
            if let Err(e) = node.broadcast(&tx, &origin, &[&origin, &from]) {
                warn!("Relay of {hash}: {e}");
            }
        });
        Ok(())
    }

    /// Sends `tx` to every connected peer not in `exclude`. A peer that
    /// cannot be reached is evicted; the rest still get the transaction.
    pub fn broadcast(&self, tx: &Transaction, origin: &str, exclude: &[&str]) -> Result<()> {
        let targets: Vec<_> = self
            .peers
            .clients()
            .into_iter()
            .filter(|(addr, _)| !exclude.contains(&addr.as_str()))
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        let failures: Vec<(String, String)> = thread::scope(|scope| {
            let sends: Vec<_> = targets
                .iter()
                .map(|(addr, client)| {
                    let send = scope.spawn(move || {
                        client.handle_transaction(origin, &self.listen_addr, tx)
                    });
                    (addr, send)
                })
                .collect();
            sends
                .into_iter()
                .filter_map(|(addr, send)| match send.join() {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some((addr.clone(), e.to_string())),
                    Err(_) => Some((addr.clone(), "send task panicked".to_string())),
                })
                .collect()
        });

        for (addr, reason) in &failures {
            warn!("Evicting peer {addr}: {reason}");
            self.peers.evict(addr);
        }
        debug!(
            "Relayed {} to {} of {} peer(s)",
            tx.hash_hex(),
            targets.len() - failures.len(),
            targets.len()
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Broadcast(failures))
        }
    }
}
