//! Replication through the relay server.

use std::collections::VecDeque;

use super::{ClearHandler, ReplicationChannel, ReplicationError, StrokeHandler, Subscriptions, TextHandler};
use crate::config::ClientConfig;
use crate::protocol::ClientMessage;
use crate::records::{ClearSignal, ClientId, Record, StrokeSegment, TextAnnotation};
use crate::sync::{ConnectionState, PlatformWebSocket, SyncEvent, Transport};

/// Default number of publishes buffered while not joined.
pub const DEFAULT_OUTBOX_LIMIT: usize = 512;

/// A [`ReplicationChannel`] speaking the relay protocol over a [`Transport`].
///
/// Publishes made before the room is joined (or while reconnecting) wait in
/// a bounded outbox and are sent once the server confirms the join. On
/// (re)join the channel asks only for records newer than the last one it
/// saw.
pub struct WebSocketChannel<T: Transport = PlatformWebSocket> {
    transport: T,
    config: ClientConfig,
    subs: Subscriptions,
    outbox: VecDeque<Record>,
    joined: bool,
    peer_count: usize,
}

impl WebSocketChannel<PlatformWebSocket> {
    pub fn new(config: ClientConfig, local_id: ClientId) -> Self {
        Self::with_transport(PlatformWebSocket::new(), config, local_id)
    }
}

impl<T: Transport> WebSocketChannel<T> {
    pub fn with_transport(transport: T, config: ClientConfig, local_id: ClientId) -> Self {
        Self {
            transport,
            config,
            subs: Subscriptions::new(local_id),
            outbox: VecDeque::new(),
            joined: false,
            peer_count: 0,
        }
    }

    /// Start connecting to the configured server. The room is joined
    /// automatically once the socket opens.
    pub fn connect(&mut self) -> Result<(), ReplicationError> {
        log::info!("Connecting to {} (room {})", self.config.server_url, self.config.room);
        self.transport.connect(&self.config.server_url)
    }

    pub fn disconnect(&mut self) {
        if self.joined {
            let _ = self.send_message(&ClientMessage::Leave);
        }
        self.transport.disconnect();
        self.joined = false;
        self.peer_count = 0;
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Other clients in the room, as last reported by the server.
    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    pub fn room(&self) -> &str {
        &self.config.room
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send_message(&self, msg: &ClientMessage) -> Result<(), ReplicationError> {
        let json = serde_json::to_string(msg).map_err(|e| ReplicationError::Encode(e.to_string()))?;
        self.transport.send(&json)
    }

    fn publish(&mut self, record: Record) {
        if self.joined {
            let msg = ClientMessage::Publish { record };
            match self.send_message(&msg) {
                Ok(()) => return,
                Err(e) => {
                    log::warn!("Publish failed, queueing: {}", e);
                    let ClientMessage::Publish { record } = msg else { return };
                    self.joined = false;
                    self.enqueue(record);
                }
            }
        } else {
            self.enqueue(record);
        }
    }

    fn enqueue(&mut self, record: Record) {
        if self.config.outbox_limit == 0 {
            log::warn!("Dropping {} record: not connected", record.collection().name());
            return;
        }
        while self.outbox.len() >= self.config.outbox_limit {
            if let Some(dropped) = self.outbox.pop_front() {
                log::warn!("Outbox full, dropping oldest {} record", dropped.collection().name());
            }
        }
        self.outbox.push_back(record);
    }

    fn flush_outbox(&mut self) {
        if !self.outbox.is_empty() {
            log::info!("Flushing {} queued records", self.outbox.len());
        }
        while let Some(record) = self.outbox.pop_front() {
            let msg = ClientMessage::Publish { record };
            if let Err(e) = self.send_message(&msg) {
                log::warn!("Flush interrupted: {}", e);
                if let ClientMessage::Publish { record } = msg {
                    self.outbox.push_front(record);
                }
                break;
            }
        }
    }

    fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Connected => {
                let join = ClientMessage::Join {
                    room: self.config.room.clone(),
                    since: self.subs.last_seq(),
                };
                if let Err(e) = self.send_message(&join) {
                    log::error!("Failed to join {}: {}", self.config.room, e);
                }
            }
            SyncEvent::Joined { room, peer_count, head } => {
                log::info!("Joined {} ({} peers, head #{})", room, peer_count, head);
                if let Some(last) = self.subs.last_seq().filter(|last| head < *last) {
                    log::warn!("Relay head #{} is behind #{}; history was reset", head, last);
                    self.subs.reset_cursors();
                }
                self.joined = true;
                self.peer_count = peer_count;
                self.flush_outbox();
            }
            SyncEvent::PeerJoined { peer_id } => {
                log::debug!("Peer joined: {}", peer_id);
                self.peer_count += 1;
            }
            SyncEvent::PeerLeft { peer_id } => {
                log::debug!("Peer left: {}", peer_id);
                self.peer_count = self.peer_count.saturating_sub(1);
            }
            SyncEvent::Record { seq, record } => {
                self.subs.dispatch(seq, record);
            }
            SyncEvent::Disconnected => {
                log::info!("Disconnected from {}", self.config.server_url);
                self.joined = false;
                self.peer_count = 0;
                self.transport.disconnect();
            }
            SyncEvent::Error { message } => {
                log::warn!("Replication error: {}", message);
                // Before the join completes an error means the connection
                // never came up; release the transport so `connect` can retry.
                if !self.joined {
                    self.transport.disconnect();
                }
            }
        }
    }
}

impl<T: Transport> ReplicationChannel for WebSocketChannel<T> {
    fn local_id(&self) -> &ClientId {
        self.subs.local_id()
    }

    fn publish_stroke(&mut self, segment: StrokeSegment) {
        self.publish(Record::Stroke(segment));
    }

    fn publish_text(&mut self, annotation: TextAnnotation) {
        self.publish(Record::Text(annotation));
    }

    fn publish_clear(&mut self, signal: ClearSignal) {
        self.publish(Record::Clear(signal));
    }

    fn subscribe_strokes(&mut self, handler: StrokeHandler) {
        self.subs.add_stroke_handler(handler);
    }

    fn subscribe_texts(&mut self, handler: TextHandler) {
        self.subs.add_text_handler(handler);
    }

    fn subscribe_clears(&mut self, handler: ClearHandler) {
        self.subs.add_clear_handler(handler);
    }

    fn poll(&mut self) {
        for event in self.transport.poll_events() {
            self.handle_event(event);
        }
    }
}
