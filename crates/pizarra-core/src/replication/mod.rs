//! Replication channel: publish local records, receive everyone else's.
//!
//! Publishing is fire-and-forget. Subscribers receive each record appended to
//! the room exactly once, in the store's append order, and never receive
//! records that carry their own [`ClientId`].

mod memory;
mod websocket;

pub use memory::{MemoryChannel, MemoryStore};
pub use websocket::{DEFAULT_OUTBOX_LIMIT, WebSocketChannel};

use std::collections::HashMap;

use thiserror::Error;

use crate::records::{ClearSignal, ClientId, Collection, Record, RecordError, StrokeSegment, TextAnnotation};

/// Transport-level replication errors.
///
/// The fire-and-forget publish paths log these instead of returning them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    #[error("store is unreachable")]
    Offline,
    #[error("not connected")]
    NotConnected,
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("encoding error: {0}")]
    Encode(String),
}

pub type StrokeHandler = Box<dyn FnMut(&StrokeSegment)>;
pub type TextHandler = Box<dyn FnMut(&TextAnnotation)>;
pub type ClearHandler = Box<dyn FnMut(&ClearSignal)>;

/// Capability set of a remote store.
pub trait ReplicationChannel {
    /// Identity this channel publishes under and filters out on receipt.
    fn local_id(&self) -> &ClientId;

    fn publish_stroke(&mut self, segment: StrokeSegment);

    fn publish_text(&mut self, annotation: TextAnnotation);

    fn publish_clear(&mut self, signal: ClearSignal);

    fn subscribe_strokes(&mut self, handler: StrokeHandler);

    fn subscribe_texts(&mut self, handler: TextHandler);

    fn subscribe_clears(&mut self, handler: ClearHandler);

    /// Deliver whatever arrived since the last call to the subscribed
    /// handlers. Hosts call this from their event loop.
    fn poll(&mut self);
}

/// What [`Subscriptions::dispatch`] did with a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Delivered,
    /// Already seen (at-least-once redelivery).
    Duplicate,
    /// Published by this client.
    SelfEcho,
    Malformed(RecordError),
}

/// Subscriber-side bookkeeping shared by channel implementations: handler
/// lists, per-collection cursors, self-echo and malformed-record filtering.
pub struct Subscriptions {
    local_id: ClientId,
    strokes: Vec<StrokeHandler>,
    texts: Vec<TextHandler>,
    clears: Vec<ClearHandler>,
    cursors: HashMap<Collection, u64>,
}

impl Subscriptions {
    pub fn new(local_id: ClientId) -> Self {
        Self {
            local_id,
            strokes: Vec::new(),
            texts: Vec::new(),
            clears: Vec::new(),
            cursors: HashMap::new(),
        }
    }

    pub fn local_id(&self) -> &ClientId {
        &self.local_id
    }

    pub fn add_stroke_handler(&mut self, handler: StrokeHandler) {
        self.strokes.push(handler);
    }

    pub fn add_text_handler(&mut self, handler: TextHandler) {
        self.texts.push(handler);
    }

    pub fn add_clear_handler(&mut self, handler: ClearHandler) {
        self.clears.push(handler);
    }

    /// Highest sequence key seen in any collection.
    pub fn last_seq(&self) -> Option<u64> {
        self.cursors.values().copied().max()
    }

    /// Forget every cursor, so the next records are treated as new.
    ///
    /// Needed when the relay reports a head below what this client has
    /// seen, i.e. its history was lost and sequence keys start over.
    pub fn reset_cursors(&mut self) {
        self.cursors.clear();
    }

    /// Route one appended record to the handlers of its collection.
    pub fn dispatch(&mut self, seq: u64, record: Record) -> Delivery {
        let collection = record.collection();
        let cursor = self.cursors.entry(collection).or_default();
        if seq <= *cursor && *cursor != 0 {
            return Delivery::Duplicate;
        }
        *cursor = seq;

        if record.origin_id() == &self.local_id {
            return Delivery::SelfEcho;
        }
        if let Err(e) = record.validate() {
            log::warn!("Ignoring malformed {} record #{}: {}", collection.name(), seq, e);
            return Delivery::Malformed(e);
        }

        match &record {
            Record::Stroke(segment) => self.strokes.iter_mut().for_each(|h| h(segment)),
            Record::Text(annotation) => self.texts.iter_mut().for_each(|h| h(annotation)),
            Record::Clear(signal) => self.clears.iter_mut().for_each(|h| h(signal)),
        }
        Delivery::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Rgb;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn stroke(origin: &str) -> Record {
        Record::Stroke(StrokeSegment {
            x0: 0.1,
            y0: 0.1,
            x1: 0.2,
            y1: 0.2,
            color: Rgb::BLACK,
            width: 2.0,
            origin_id: ClientId::from(origin),
            timestamp: 0,
        })
    }

    fn counting(subs: &mut Subscriptions) -> Rc<RefCell<usize>> {
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        subs.add_stroke_handler(Box::new(move |_| *c.borrow_mut() += 1));
        count
    }

    #[test]
    fn test_self_echo_suppressed() {
        let mut subs = Subscriptions::new(ClientId::from("A"));
        let count = counting(&mut subs);
        assert_eq!(subs.dispatch(1, stroke("A")), Delivery::SelfEcho);
        assert_eq!(subs.dispatch(2, stroke("B")), Delivery::Delivered);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_duplicates_delivered_once() {
        let mut subs = Subscriptions::new(ClientId::from("A"));
        let count = counting(&mut subs);
        assert_eq!(subs.dispatch(5, stroke("B")), Delivery::Delivered);
        assert_eq!(subs.dispatch(5, stroke("B")), Delivery::Duplicate);
        assert_eq!(subs.dispatch(4, stroke("B")), Delivery::Duplicate);
        assert_eq!(subs.dispatch(6, stroke("B")), Delivery::Delivered);
        assert_eq!(*count.borrow(), 2);
        assert_eq!(subs.last_seq(), Some(6));
    }

    #[test]
    fn test_reset_cursors_accepts_restarted_keys() {
        let mut subs = Subscriptions::new(ClientId::from("A"));
        let count = counting(&mut subs);
        assert_eq!(subs.dispatch(7, stroke("B")), Delivery::Delivered);
        subs.reset_cursors();
        assert_eq!(subs.last_seq(), None);
        assert_eq!(subs.dispatch(1, stroke("B")), Delivery::Delivered);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_malformed_ignored() {
        let mut subs = Subscriptions::new(ClientId::from("A"));
        let count = counting(&mut subs);
        let Record::Stroke(mut bad) = stroke("B") else { unreachable!() };
        bad.width = -1.0;
        assert!(matches!(subs.dispatch(1, Record::Stroke(bad)), Delivery::Malformed(_)));
        assert_eq!(subs.dispatch(2, stroke("B")), Delivery::Delivered);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_collections_routed_separately() {
        let mut subs = Subscriptions::new(ClientId::from("A"));
        let strokes = counting(&mut subs);
        let clears = Rc::new(RefCell::new(Vec::new()));
        let c = clears.clone();
        subs.add_clear_handler(Box::new(move |signal| c.borrow_mut().push(signal.origin_id.clone())));

        subs.dispatch(1, stroke("B"));
        subs.dispatch(
            2,
            Record::Clear(ClearSignal {
                origin_id: ClientId::from("B"),
                timestamp: 0,
            }),
        );
        assert_eq!(*strokes.borrow(), 1);
        assert_eq!(clears.borrow().as_slice(), &[ClientId::from("B")]);
    }
}
