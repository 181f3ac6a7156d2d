//! In-process store shared by any number of channels.
//!
//! Useful for tests, demos and single-process hosts. Channels connected to
//! the same [`MemoryStore`] see each other's records on their next `poll()`.

use std::cell::RefCell;
use std::rc::Rc;

use super::{ClearHandler, ReplicationChannel, ReplicationError, StrokeHandler, Subscriptions, TextHandler};
use crate::records::{ClearSignal, ClientId, Record, StrokeSegment, TextAnnotation};

#[derive(Debug, Default)]
struct StoreState {
    next_seq: u64,
    drawings: Vec<(u64, StrokeSegment)>,
    texts: Vec<(u64, TextAnnotation)>,
    /// Only the most recent clear is kept.
    clear: Option<(u64, ClearSignal)>,
}

impl StoreState {
    fn append(&mut self, record: Record) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        match record {
            Record::Stroke(segment) => self.drawings.push((seq, segment)),
            Record::Text(annotation) => self.texts.push((seq, annotation)),
            Record::Clear(signal) => self.clear = Some((seq, signal)),
        }
        seq
    }

    /// Records with a key above `after`, in append order.
    fn since(&self, after: u64) -> Vec<(u64, Record)> {
        let mut out: Vec<(u64, Record)> = self
            .drawings
            .iter()
            .filter(|(seq, _)| *seq > after)
            .map(|(seq, s)| (*seq, Record::Stroke(s.clone())))
            .chain(
                self.texts
                    .iter()
                    .filter(|(seq, _)| *seq > after)
                    .map(|(seq, t)| (*seq, Record::Text(t.clone()))),
            )
            .chain(
                self.clear
                    .iter()
                    .filter(|(seq, _)| *seq > after)
                    .map(|(seq, c)| (*seq, Record::Clear(c.clone()))),
            )
            .collect();
        out.sort_by_key(|(seq, _)| *seq);
        out
    }
}

/// A room held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel publishing as `local_id`. The channel replays the
    /// whole room on its first poll.
    pub fn connect(&self, local_id: ClientId) -> MemoryChannel {
        MemoryChannel {
            store: self.clone(),
            subs: Subscriptions::new(local_id),
            cursor: 0,
            offline: false,
            published: Vec::new(),
        }
    }

    /// Append a record without any checks, as a foreign writer would.
    pub fn inject(&self, record: Record) -> u64 {
        self.state.borrow_mut().append(record)
    }

    /// Highest key assigned so far.
    pub fn head(&self) -> u64 {
        self.state.borrow().next_seq
    }

    pub fn drawing_count(&self) -> usize {
        self.state.borrow().drawings.len()
    }

    pub fn text_count(&self) -> usize {
        self.state.borrow().texts.len()
    }

    pub fn last_clear(&self) -> Option<ClearSignal> {
        self.state.borrow().clear.as_ref().map(|(_, c)| c.clone())
    }
}

/// A [`ReplicationChannel`] backed by a [`MemoryStore`].
pub struct MemoryChannel {
    store: MemoryStore,
    subs: Subscriptions,
    cursor: u64,
    offline: bool,
    /// Every publish attempt, whether or not it reached the store.
    published: Vec<Record>,
}

impl MemoryChannel {
    /// Simulate losing (or regaining) the store.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn published(&self) -> &[Record] {
        &self.published
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn publish(&mut self, record: Record) {
        self.published.push(record.clone());
        match self.try_append(record) {
            Ok(seq) => log::trace!("Appended record #{}", seq),
            Err(e) => log::warn!("Publish failed: {}", e),
        }
    }

    fn try_append(&self, record: Record) -> Result<u64, ReplicationError> {
        if self.offline {
            return Err(ReplicationError::Offline);
        }
        Ok(self.store.inject(record))
    }
}

impl ReplicationChannel for MemoryChannel {
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
        if self.offline {
            return;
        }
        // Collect first: handlers may publish back into the store.
        let pending = self.store.state.borrow().since(self.cursor);
        for (seq, record) in pending {
            self.cursor = seq;
            self.subs.dispatch(seq, record);
        }
    }
}
