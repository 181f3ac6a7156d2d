//! WebSocket transports for the relay server.
//!
//! The browser build wraps `web_sys::WebSocket`; native builds run a
//! blocking `tungstenite` socket on its own thread. Either way, frames are
//! decoded into [`SyncEvent`]s that the owner drains with
//! [`Transport::poll_events`].

use crate::protocol::ServerMessage;
use crate::records::Record;
use crate::replication::ReplicationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// State after `event` has been observed.
    fn after(self, event: &SyncEvent) -> Self {
        match event {
            SyncEvent::Connected => ConnectionState::Connected,
            SyncEvent::Disconnected => ConnectionState::Disconnected,
            SyncEvent::Error { .. } => ConnectionState::Error,
            _ => self,
        }
    }
}

/// What a transport reports back: socket lifecycle plus decoded server
/// messages.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    Joined { room: String, peer_count: usize, head: u64 },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Record { seq: u64, record: Record },
    Error { message: String },
}

impl From<ServerMessage> for SyncEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Joined { room, peer_count, head } => SyncEvent::Joined { room, peer_count, head },
            ServerMessage::PeerJoined { peer_id } => SyncEvent::PeerJoined { peer_id },
            ServerMessage::PeerLeft { peer_id } => SyncEvent::PeerLeft { peer_id },
            ServerMessage::Record { seq, record } => SyncEvent::Record { seq, record },
            ServerMessage::Error { message } => SyncEvent::Error { message },
        }
    }
}

/// Decode a text frame from the server.
///
/// Frames that do not parse (including records with missing fields) are
/// logged and dropped.
pub fn decode_server_frame(text: &str) -> Option<SyncEvent> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(msg) => Some(msg.into()),
        Err(e) => {
            log::warn!("Ignoring malformed server message ({}): {}", e, preview(text));
            None
        }
    }
}

/// First 100 characters of a frame, for logging.
fn preview(text: &str) -> &str {
    let cut = text.char_indices().nth(100).map_or(text.len(), |(i, _)| i);
    &text[..cut]
}

/// A message pipe to the relay server.
pub trait Transport {
    /// Start connecting. Completion is reported as [`SyncEvent::Connected`].
    fn connect(&mut self, url: &str) -> Result<(), ReplicationError>;

    fn disconnect(&mut self);

    /// Queue a text frame.
    fn send(&self, msg: &str) -> Result<(), ReplicationError>;

    /// Drain pending events without blocking.
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    fn state(&self) -> ConnectionState;
}

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    type Inbox = Rc<RefCell<Vec<SyncEvent>>>;

    /// Browser callbacks; they must outlive the socket they are attached to.
    struct Callbacks {
        _open: Closure<dyn Fn()>,
        _message: Closure<dyn Fn(MessageEvent)>,
        _close: Closure<dyn Fn(CloseEvent)>,
        _error: Closure<dyn Fn(ErrorEvent)>,
    }

    impl Callbacks {
        fn attach(ws: &WebSocket, inbox: &Inbox) -> Self {
            let tx = inbox.clone();
            let open = Closure::wrap(Box::new(move || tx.borrow_mut().push(SyncEvent::Connected)) as Box<dyn Fn()>);

            let tx = inbox.clone();
            let message = Closure::wrap(Box::new(move |e: MessageEvent| {
                let Ok(text) = e.data().dyn_into::<js_sys::JsString>() else {
                    return;
                };
                if let Some(event) = decode_server_frame(&String::from(text)) {
                    tx.borrow_mut().push(event);
                }
            }) as Box<dyn Fn(MessageEvent)>);

            let tx = inbox.clone();
            let close = Closure::wrap(
                Box::new(move |_: CloseEvent| tx.borrow_mut().push(SyncEvent::Disconnected)) as Box<dyn Fn(CloseEvent)>,
            );

            let tx = inbox.clone();
            let error = Closure::wrap(Box::new(move |_: ErrorEvent| {
                tx.borrow_mut().push(SyncEvent::Error {
                    message: "WebSocket error".to_string(),
                });
            }) as Box<dyn Fn(ErrorEvent)>);

            ws.set_onopen(Some(open.as_ref().unchecked_ref()));
            ws.set_onmessage(Some(message.as_ref().unchecked_ref()));
            ws.set_onclose(Some(close.as_ref().unchecked_ref()));
            ws.set_onerror(Some(error.as_ref().unchecked_ref()));

            Self {
                _open: open,
                _message: message,
                _close: close,
                _error: error,
            }
        }
    }

    /// Browser `WebSocket` transport.
    #[derive(Default)]
    pub struct WasmWebSocket {
        socket: Option<(WebSocket, Callbacks)>,
        state: ConnectionState,
        inbox: Inbox,
    }

    impl WasmWebSocket {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Transport for WasmWebSocket {
        fn connect(&mut self, url: &str) -> Result<(), ReplicationError> {
            if self.socket.is_some() {
                return Err(ReplicationError::Transport("Already connected".to_string()));
            }
            let ws = WebSocket::new(url)
                .map_err(|e| ReplicationError::Transport(format!("Failed to create WebSocket: {:?}", e)))?;
            ws.set_binary_type(web_sys::BinaryType::Arraybuffer);
            let callbacks = Callbacks::attach(&ws, &self.inbox);
            self.socket = Some((ws, callbacks));
            self.state = ConnectionState::Connecting;
            Ok(())
        }

        fn disconnect(&mut self) {
            if let Some((ws, _)) = self.socket.take() {
                let _ = ws.close();
            }
            self.state = ConnectionState::Disconnected;
        }

        fn send(&self, msg: &str) -> Result<(), ReplicationError> {
            let (ws, _) = self.socket.as_ref().ok_or(ReplicationError::NotConnected)?;
            ws.send_with_str(msg)
                .map_err(|e| ReplicationError::Transport(format!("Send failed: {:?}", e)))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let events = std::mem::take(&mut *self.inbox.borrow_mut());
            self.state = events.iter().fold(self.state, ConnectionState::after);
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmWebSocket;

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, WebSocket};
    use url::Url;

    type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

    enum Outgoing {
        Text(String),
        Close,
    }

    /// Blocking `tungstenite` socket driven from a background thread.
    ///
    /// Outgoing frames travel to the thread over one channel, decoded events
    /// come back over another.
    pub struct NativeWebSocket {
        state: ConnectionState,
        outgoing: Option<Sender<Outgoing>>,
        incoming: Option<Receiver<SyncEvent>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                outgoing: None,
                incoming: None,
            }
        }
    }

    fn parse_ws_url(url: &str) -> Result<Url, ReplicationError> {
        let parsed = Url::parse(url).map_err(|e| ReplicationError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(parsed),
            other => Err(ReplicationError::InvalidUrl(format!("Invalid WebSocket URL scheme: {}", other))),
        }
    }

    /// Send whatever the owner queued. Returns false once the loop should stop.
    fn drain_outgoing(socket: &mut Socket, outgoing: &Receiver<Outgoing>) -> bool {
        loop {
            match outgoing.try_recv() {
                Ok(Outgoing::Text(text)) => {
                    log::debug!("Sending: {}", preview(&text));
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("WebSocket send error: {}", e);
                        return false;
                    }
                }
                Ok(Outgoing::Close) => {
                    let _ = socket.close(None);
                    return false;
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn run_socket(url: Url, outgoing: Receiver<Outgoing>, events: Sender<SyncEvent>) {
        let mut socket = match tungstenite::connect(url.as_str()) {
            Ok((socket, response)) => {
                log::info!("Connected to {} ({})", url, response.status());
                socket
            }
            Err(e) => {
                log::error!("Connection to {} failed: {}", url, e);
                let _ = events.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                return;
            }
        };
        let _ = events.send(SyncEvent::Connected);

        // Reads time out quickly so queued sends are not starved.
        if let MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }

        while drain_outgoing(&mut socket, &outgoing) {
            match socket.read() {
                Ok(Message::Text(text)) => {
                    if let Some(event) = decode_server_frame(&text) {
                        let _ = events.send(event);
                    }
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {}
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    break;
                }
            }
        }

        log::info!("Socket to {} closed", url);
        let _ = events.send(SyncEvent::Disconnected);
    }

    impl Transport for NativeWebSocket {
        fn connect(&mut self, url: &str) -> Result<(), ReplicationError> {
            if self.outgoing.is_some() {
                return Err(ReplicationError::Transport("Already connected".to_string()));
            }
            let url = parse_ws_url(url)?;

            let (out_tx, out_rx) = channel();
            let (event_tx, event_rx) = channel();
            std::thread::spawn(move || run_socket(url, out_rx, event_tx));

            self.outgoing = Some(out_tx);
            self.incoming = Some(event_rx);
            self.state = ConnectionState::Connecting;
            Ok(())
        }

        fn disconnect(&mut self) {
            if let Some(tx) = self.outgoing.take() {
                let _ = tx.send(Outgoing::Close);
            }
            self.incoming = None;
            self.state = ConnectionState::Disconnected;
        }

        fn send(&self, msg: &str) -> Result<(), ReplicationError> {
            let tx = self.outgoing.as_ref().ok_or(ReplicationError::NotConnected)?;
            tx.send(Outgoing::Text(msg.to_string()))
                .map_err(|e| ReplicationError::Transport(format!("Send failed: {}", e)))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let events: Vec<SyncEvent> = match &self.incoming {
                Some(rx) => rx.try_iter().collect(),
                None => Vec::new(),
            };
            self.state = events.iter().fold(self.state, ConnectionState::after);
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;

#[cfg(target_arch = "wasm32")]
pub type PlatformWebSocket = WasmWebSocket;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformWebSocket = NativeWebSocket;
