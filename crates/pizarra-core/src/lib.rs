//! Pizarra Core Library
//!
//! Platform-agnostic core of the Pizarra shared whiteboard: view transform,
//! coordinate normalization, replicated records, the interaction mode
//! controller and the replication channels.

pub mod camera;
pub mod config;
pub mod controller;
pub mod input;
pub mod normalize;
pub mod protocol;
pub mod records;
pub mod replication;
pub mod surface;
pub mod sync;
pub mod tools;
pub mod whiteboard;

pub use camera::{ViewState, MAX_SCALE, MIN_SCALE};
pub use config::{ClientConfig, ConfigError};
pub use controller::{LocalEdit, Mode, ModeController, ModeKind, TextPrompt};
pub use input::{Gesture, MouseButton, PointerEvent, PointerPhase, TextKey, TouchTracker};
pub use normalize::{from_fraction, to_fraction, SURFACE_SIZE};
pub use protocol::{ClientMessage, ServerMessage};
pub use records::{ClearSignal, ClientId, Record, RecordError, Rgb, StrokeSegment, TextAnnotation};
pub use replication::{MemoryChannel, MemoryStore, ReplicationChannel, ReplicationError, WebSocketChannel};
pub use surface::{DisplayList, DrawCommand, RenderSurface};
pub use sync::{ConnectionState, PlatformWebSocket, SyncEvent, Transport};
pub use tools::ToolSettings;
pub use whiteboard::Whiteboard;
