//! JSON messages exchanged with the relay server.
//!
//! ```json
//! { "type": "join", "room": "sala-principal", "since": 41 }
//! { "type": "publish", "record": { "collection": "drawings", "x0": 0.02, ... } }
//! { "type": "record", "seq": 42, "record": { "collection": "clear", "userId": "user_x", "timestamp": 1 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::records::Record;

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room, replaying every record with a sequence key above `since`.
    Join {
        room: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        since: Option<u64>,
    },
    /// Leave the current room.
    Leave,
    /// Append a record to one of the room's collections.
    Publish { record: Record },
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room joined; the backlog follows as `record` messages.
    Joined {
        room: String,
        /// Other peers already in the room.
        peer_count: usize,
        /// Highest sequence key assigned in the room so far.
        head: u64,
    },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    /// A record appended to the room, with its server-assigned arrival key.
    Record { seq: u64, record: Record },
    Error { message: String },
}
