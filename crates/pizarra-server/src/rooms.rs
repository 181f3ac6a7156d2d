//! Room state: peers, broadcast channel and record history.

use std::collections::{HashSet, VecDeque};

use dashmap::DashMap;
use pizarra_core::protocol::ServerMessage;
use pizarra_core::records::Record;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::ServerConfig;

/// A message fanned out to a room, tagged with the peer that caused it.
pub type RoomEvent = (String, ServerMessage);

/// Append-only record log of one room.
///
/// Every record gets the next sequence key. A clear drops everything
/// before it, and the oldest records are evicted beyond `limit`.
#[derive(Debug)]
pub struct RoomHistory {
    entries: VecDeque<(u64, Record)>,
    head: u64,
    limit: usize,
}

impl RoomHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            head: 0,
            limit,
        }
    }

    pub fn append(&mut self, record: Record) -> u64 {
        self.head += 1;
        if matches!(record, Record::Clear(_)) {
            let dropped = self.entries.len();
            self.entries.clear();
            debug!(dropped, "clear compacted history");
        }
        self.entries.push_back((self.head, record));
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.head
    }

    /// Records with a key above `after` (all of them for `None`).
    pub fn since(&self, after: Option<u64>) -> Vec<(u64, Record)> {
        let after = after.unwrap_or(0);
        self.entries
            .iter()
            .filter(|(seq, _)| *seq > after)
            .cloned()
            .collect()
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Room state
pub struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<RoomEvent>,
    /// Connected peer IDs
    peers: HashSet<String>,
    history: RoomHistory,
}

impl Room {
    fn new(config: &ServerConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity);
        Self {
            tx,
            peers: HashSet::new(),
            history: RoomHistory::new(config.history_limit),
        }
    }
}

/// What a peer gets back from joining a room.
pub struct Joined {
    pub rx: broadcast::Receiver<RoomEvent>,
    /// Records to replay before anything from `rx`.
    pub backlog: Vec<(u64, Record)>,
    /// Other peers already in the room.
    pub peer_count: usize,
    pub head: u64,
    /// Resume point actually honored. A `since` past the head (the room's
    /// history was lost) is dropped and the whole history is replayed.
    pub since: Option<u64>,
}

/// Shared application state
pub struct AppState {
    /// Rooms live as long as the server; their history outlives their peers.
    rooms: DashMap<String, Room>,
    config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    /// Add peer to room.
    ///
    /// The receiver is subscribed under the same lock the backlog is read
    /// under, so every record is either in the backlog or on the receiver.
    pub fn join_room(&self, room_id: &str, peer_id: &str, since: Option<u64>) -> Joined {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(&self.config));
        let head = room.history.head();
        let since = since.filter(|after| *after <= head);
        let peer_count = room.peers.len();
        room.peers.insert(peer_id.to_string());
        Joined {
            rx: room.tx.subscribe(),
            backlog: room.history.since(since),
            peer_count,
            head,
            since,
        }
    }

    /// Remove peer from room
    pub fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
        }
    }

    /// Append a record and fan it out to every peer, the publisher included.
    pub fn publish(&self, room_id: &str, peer_id: &str, record: Record) -> Option<u64> {
        let mut room = self.rooms.get_mut(room_id)?;
        let seq = room.history.append(record.clone());
        debug!(room = room_id, seq, kept = room.history.len(), "record appended");
        let _ = room.tx.send((peer_id.to_string(), ServerMessage::Record { seq, record }));
        Some(seq)
    }

    /// Records a lagging peer missed.
    pub fn backlog(&self, room_id: &str, after: Option<u64>) -> Vec<(u64, Record)> {
        self.rooms
            .get(room_id)
            .map(|room| room.history.since(after))
            .unwrap_or_default()
    }

    /// Broadcast message to room
    pub fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|room| room.peers.len()).unwrap_or(0)
    }
}
