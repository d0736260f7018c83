use crate::network::{PeerClient, Version};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    Unknown,
    Dialing,
    Handshaking,
    Connected,
    Disconnected,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::Unknown => "unknown",
            PeerState::Dialing => "dialing",
            PeerState::Handshaking => "handshaking",
            PeerState::Connected => "connected",
            PeerState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct PeerEntry {
    pub client: Arc<dyn PeerClient>,
    pub version: Version,
}

impl fmt::Debug for PeerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerEntry")
            .field("addr", &self.client.addr())
            .field("version", &self.version)
            .finish()
    }
}

/// Most recently dropped addresses remembered as `Disconnected`. Older ones
/// fall back to `Unknown`.
pub const MAX_DISCONNECTED: usize = 256;

#[derive(Default)]
struct Inner {
    connected: HashMap<String, PeerEntry>,
    pending: HashMap<String, PeerState>,
    // Oldest first.
    disconnected: VecDeque<String>,
}

impl Inner {
    fn forget(&mut self, addr: &str) {
        self.disconnected.retain(|a| a != addr);
    }

    fn mark_disconnected(&mut self, addr: &str) {
        self.forget(addr);
        self.disconnected.push_back(addr.to_string());
        while self.disconnected.len() > MAX_DISCONNECTED {
            self.disconnected.pop_front();
        }
    }
}

/// Peers keyed by advertised listen address. Dials in flight are tracked
/// next to the connected set so one address is never dialed twice at once.
pub struct PeerTable {
    local_addr: String,
    inner: RwLock<Inner>,
}

impl PeerTable {
    pub fn new(local_addr: &str) -> PeerTable {
        PeerTable {
            local_addr: local_addr.to_string(),
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Self, connected, or being dialed.
    pub fn is_known(&self, addr: &str) -> bool {
        if addr == self.local_addr {
            return true;
        }
        let inner = self.read();
        inner.connected.contains_key(addr) || inner.pending.contains_key(addr)
    }

    /// Claims `addr` for an outbound dial. False if it is self, already
    /// connected, or already being dialed.
    pub fn begin_dial(&self, addr: &str) -> bool {
        if addr == self.local_addr {
            return false;
        }
        let mut inner = self.write();
        if inner.connected.contains_key(addr) || inner.pending.contains_key(addr) {
            return false;
        }
        inner.forget(addr);
        inner.pending.insert(addr.to_string(), PeerState::Dialing);
        true
    }

    pub fn set_handshaking(&self, addr: &str) {
        if let Some(state) = self.write().pending.get_mut(addr) {
            *state = PeerState::Handshaking;
        }
    }

    /// Drops a failed in-flight dial.
    pub fn abandon(&self, addr: &str) {
        let mut inner = self.write();
        if inner.pending.remove(addr).is_some() {
            inner.mark_disconnected(addr);
        }
    }

    /// True if `addr` was not connected before.
    pub fn register(&self, addr: &str, entry: PeerEntry) -> bool {
        let mut inner = self.write();
        inner.pending.remove(addr);
        inner.forget(addr);
        if inner.connected.contains_key(addr) {
            return false;
        }
        inner.connected.insert(addr.to_string(), entry);
        true
    }

    pub fn evict(&self, addr: &str) -> Option<PeerEntry> {
        let mut inner = self.write();
        let removed = inner.connected.remove(addr);
        if removed.is_some() {
            inner.mark_disconnected(addr);
        }
        removed
    }

    pub fn state(&self, addr: &str) -> PeerState {
        let inner = self.read();
        if inner.connected.contains_key(addr) {
            PeerState::Connected
        } else if let Some(state) = inner.pending.get(addr) {
            *state
        } else if inner.disconnected.iter().any(|a| a == addr) {
            PeerState::Disconnected
        } else {
            PeerState::Unknown
        }
    }

    pub fn get(&self, addr: &str) -> Option<PeerEntry> {
        self.read().connected.get(addr).cloned()
    }

    /// Sorted listen addresses of connected peers.
    pub fn peer_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self.read().connected.keys().cloned().collect();
        list.sort();
        list
    }

    /// Snapshot of connected clients, taken so no lock is held during calls.
    pub fn clients(&self) -> Vec<(String, Arc<dyn PeerClient>)> {
        self.read()
            .connected
            .iter()
            .map(|(addr, entry)| (addr.clone(), Arc::clone(&entry.client)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().connected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
