//! Line relay: assigns ids, tags every inbound line with its sender and fans it
//! out to every other connection. No game logic lives here.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::protocol::{tag_with_sender, Command};
use crate::game::PeerId;

/// Relay errors
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("All {0} connection slots are taken")]
    Full(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connected peers and their outbound queues
pub struct RelayState {
    peers: DashMap<PeerId, mpsc::UnboundedSender<String>>,
    max_connections: usize,
}

impl RelayState {
    pub fn new(max_connections: usize) -> Self {
        Self {
            peers: DashMap::new(),
            max_connections,
        }
    }

    /// Take the lowest free slot, starting at 1. START and USERS are queued on
    /// `tx` before the slot joins the fan-out, so they are always its first lines.
    pub fn register(&self, tx: mpsc::UnboundedSender<String>) -> Result<PeerId, RelayError> {
        // Collected up front: iterating while holding an entry guard deadlocks.
        let mut present = self.connected_ids();
        for id in 1..=self.max_connections as PeerId {
            if let Entry::Vacant(slot) = self.peers.entry(id) {
                present.push(id);
                present.sort_unstable();
                let _ = tx.send(Command::Start { assigned_id: id }.to_string());
                let _ = tx.send(Command::Users(present).to_string());
                slot.insert(tx);
                return Ok(id);
            }
        }
        Err(RelayError::Full(self.max_connections))
    }

    pub fn unregister(&self, id: PeerId) -> bool {
        self.peers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn connected_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Forward a peer's line to everyone else with the sender id appended
    pub fn broadcast_from(&self, sender: PeerId, line: &str) {
        self.announce(sender, &tag_with_sender(line, sender));
    }

    /// Send a relay-originated line to everyone except `except`
    pub fn announce(&self, except: PeerId, line: &str) {
        for entry in self.peers.iter() {
            if *entry.key() != except {
                let _ = entry.value().send(line.to_string());
            }
        }
    }

    pub fn send_to(&self, id: PeerId, line: String) -> bool {
        match self.peers.get(&id) {
            Some(tx) => tx.send(line).is_ok(),
            None => false,
        }
    }
}

/// Shared relay state
pub type SharedRelayState = Arc<RelayState>;

pub struct RelayServer {
    listener: TcpListener,
    state: SharedRelayState,
}

impl RelayServer {
    pub async fn bind(addr: SocketAddr, max_connections: usize) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(RelayState::new(max_connections)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> SharedRelayState {
        self.state.clone()
    }

    /// Accept connections until the task is dropped
    pub async fn run(self) -> Result<(), RelayError> {
        info!(addr = ?self.listener.local_addr().ok(), "Relay listening");
        loop {
            let (stream, remote) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    continue;
                }
            };
            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, remote, state).await {
                    warn!(remote = %remote, error = %e, "Connection ended with error");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    remote: SocketAddr,
    state: SharedRelayState,
) -> Result<(), RelayError> {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let id = match state.register(tx) {
        Ok(id) => id,
        Err(e) => {
            warn!(remote = %remote, error = %e, "Rejecting connection");
            return Ok(());
        }
    };
    info!(peer_id = id, remote = %remote, connected = state.len(), "Peer connected");

    state.announce(id, &Command::Enter { id }.to_string());

    // Writer task: queued lines -> socket
    let writer = tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            if let Err(e) = write_half.write_all(line.as_bytes()).await {
                debug!(peer_id = id, error = %e, "Write failed");
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    let result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                state.broadcast_from(id, line);
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(RelayError::Io(e)),
        }
    };

    state.unregister(id);
    writer.abort();
    state.announce(id, &Command::Leave { id }.to_string());
    info!(peer_id = id, connected = state.len(), "Peer disconnected");

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_register_takes_lowest_free_slot() {
        let state = RelayState::new(3);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(state.register(tx.clone()).unwrap(), 1);
        assert_eq!(state.register(tx.clone()).unwrap(), 2);
        assert_eq!(state.register(tx.clone()).unwrap(), 3);
        assert!(matches!(state.register(tx.clone()), Err(RelayError::Full(3))));

        assert!(state.unregister(2));
        assert_eq!(state.register(tx).unwrap(), 2);
        assert_eq!(state.connected_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_broadcast_tags_sender_and_skips_it() {
        let state = RelayState::new(4);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        let a = state.register(tx1).unwrap();
        state.register(tx2).unwrap();
        state.register(tx3).unwrap();
        drain(&mut rx1);
        drain(&mut rx2);
        drain(&mut rx3);

        state.broadcast_from(a, "BULLET_HIT 42");

        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), "BULLET_HIT 42 1");
        assert_eq!(rx3.try_recv().unwrap(), "BULLET_HIT 42 1");
    }

    #[test]
    fn test_start_and_users_precede_fanout() {
        let state = RelayState::new(3);
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let a = state.register(tx1).unwrap();
        assert_eq!(drain(&mut rx1), vec!["START 1", "USERS 1"]);

        state.register(tx2).unwrap();
        state.broadcast_from(a, "MOVE 1 2");
        assert_eq!(drain(&mut rx2), vec!["START 2", "USERS 1 2", "MOVE 1 2 1"]);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_send_to_missing_peer() {
        let state = RelayState::new(2);
        assert!(!state.send_to(9, "START 9".to_string()));
        assert!(state.is_empty());
    }

    #[test]
    fn test_closed_receiver_does_not_block_fanout() {
        let state = RelayState::new(3);
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        state.register(tx1).unwrap();
        state.register(tx2).unwrap();
        drop(rx1);
        drain(&mut rx2);

        state.announce(0, "ENTER 3");
        assert_eq!(rx2.try_recv().unwrap(), "ENTER 3");
    }
}
