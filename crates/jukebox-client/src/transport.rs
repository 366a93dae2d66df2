//! TransportManager: owns the single WebSocket connection.
//!
//! ```text
//!   start()
//!     └── connection task (one per generation)
//!            ├── outbound: mpsc<String> → socket
//!            └── inbound:  socket → ClientEvent::Transport(Frame)
//! ```
//!
//! Every `start()` bumps the connection generation; events carrying an older
//! generation are ignored, so a late close from a dead socket can never tear
//! down its replacement.  Polling timers belong to the current connection:
//! they are cancelled before a new set is armed and whenever the connection
//! drops.  A fixed-interval health check restarts the connection while it
//! is down.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jukebox_proto::config::PollingConfig;
use jukebox_proto::protocol::Opcode;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;
use crate::event::{ClientEvent, TransportEvent};

pub const WS_PATH: &str = "/ws";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "offline",
            Self::Connecting => "connecting",
            Self::Connected => "online",
        }
    }
}

/// WebSocket endpoint for a server base URL: `wss` when the base is served
/// securely, `ws` otherwise, on the same host and port, at `/ws`.
pub fn websocket_endpoint(base: &Url) -> Result<Url, ClientError> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    let host = base.host_str().ok_or_else(|| ClientError::Endpoint {
        url: base.to_string(),
        reason: "no host".to_string(),
    })?;
    let mut endpoint = format!("{}://{}", scheme, host);
    if let Some(port) = base.port() {
        endpoint.push_str(&format!(":{}", port));
    }
    endpoint.push_str(WS_PATH);
    Url::parse(&endpoint).map_err(|e| ClientError::Endpoint {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// Where writes go.  Implemented by the transport; tests substitute a
/// recorder.
pub trait FrameSink {
    fn send_text(&mut self, text: String) -> Result<(), ClientError>;
}

// ── Polling timers ────────────────────────────────────────────────────────────

/// The periodic request loops of one connection.
#[derive(Debug, Default)]
pub struct PollTimers {
    handles: Vec<JoinHandle<()>>,
}

impl PollTimers {
    /// Cancel every running loop, then start one per schedule entry.  Each
    /// loop fires immediately and then once per interval.
    pub fn arm(
        &mut self,
        schedule: &[(Opcode, Duration)],
        events: &mpsc::UnboundedSender<ClientEvent>,
    ) {
        self.cancel();
        for &(opcode, period) in schedule {
            let tx = events.clone();
            self.handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if tx.send(ClientEvent::Poll(opcode)).is_err() {
                        break;
                    }
                }
            }));
        }
    }

    pub fn cancel(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    pub fn armed(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for PollTimers {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── TransportManager ─────────────────────────────────────────────────────────

pub struct TransportManager {
    endpoint: Url,
    state: ConnectionState,
    generation: u64,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    connection_task: Option<JoinHandle<()>>,
    health_task: Option<JoinHandle<()>>,
    timers: PollTimers,
    schedule: Vec<(Opcode, Duration)>,
    health_interval: Duration,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl TransportManager {
    pub fn new(
        endpoint: Url,
        polling: &PollingConfig,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let schedule = vec![
            (Opcode::NowPlaying, Duration::from_millis(polling.now_playing_ms.max(1))),
            (Opcode::Queue, Duration::from_millis(polling.queue_ms.max(1))),
            (Opcode::Playlist, Duration::from_millis(polling.playlist_ms.max(1))),
            (Opcode::Artists, Duration::from_millis(polling.artists_ms.max(1))),
        ];
        Self {
            endpoint,
            state: ConnectionState::Disconnected,
            generation: 0,
            outgoing: None,
            connection_task: None,
            health_task: None,
            timers: PollTimers::default(),
            schedule,
            health_interval: Duration::from_millis(polling.health_check_ms.max(1)),
            events,
        }
    }

    /// Open a connection unless one is already open or being opened.
    /// Returns whether a new attempt was started.
    pub fn start(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            debug!("transport: start ignored while {:?}", self.state);
            return false;
        }
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        info!(
            "transport: connecting to {} (generation {})",
            self.endpoint, self.generation
        );

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        self.outgoing = Some(out_tx);
        self.connection_task = Some(tokio::spawn(run_connection(
            self.endpoint.clone(),
            self.generation,
            out_rx,
            self.events.clone(),
        )));
        true
    }

    /// Start the fixed-interval reconnect check (idempotent).
    pub fn spawn_health_check(&mut self) {
        if self.health_task.is_some() {
            return;
        }
        let tx = self.events.clone();
        let period = self.health_interval;
        self.health_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(ClientEvent::HealthCheck).is_err() {
                    break;
                }
            }
        }));
    }

    /// Health check fired: restart if the connection is down.
    pub fn on_health_check(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            info!("transport: health check found connection down, reconnecting");
            return self.start();
        }
        false
    }

    /// The socket of `generation` opened.  Re-arms polling.  Returns `false`
    /// for stale generations.
    pub fn on_opened(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!("transport: ignoring open of stale generation {}", generation);
            return false;
        }
        self.state = ConnectionState::Connected;
        self.timers.arm(&self.schedule, &self.events);
        info!(
            "transport: connected (generation {}, {} polling timers)",
            generation,
            self.timers.armed()
        );
        true
    }

    /// The socket of `generation` closed or failed to open.  Returns `false`
    /// for stale generations or if already down.
    pub fn on_closed(&mut self, generation: u64, reason: &str) -> bool {
        if generation != self.generation || self.state == ConnectionState::Disconnected {
            debug!("transport: ignoring close of stale generation {}", generation);
            return false;
        }
        warn!("transport: connection lost: {}", reason);
        self.state = ConnectionState::Disconnected;
        self.outgoing = None;
        self.timers.cancel();
        true
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn armed_timers(&self) -> usize {
        self.timers.armed()
    }

    pub fn shutdown(&mut self) {
        self.timers.cancel();
        self.outgoing = None;
        for task in [self.connection_task.take(), self.health_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        self.state = ConnectionState::Disconnected;
    }
}

impl FrameSink for TransportManager {
    fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        if self.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let outgoing = self.outgoing.as_ref().ok_or(ClientError::NotConnected)?;
        outgoing.send(text).map_err(|_| ClientError::NotConnected)
    }
}

impl Drop for TransportManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_connection(
    endpoint: Url,
    generation: u64,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    let closed = |reason: String| ClientEvent::Transport(TransportEvent::Closed { generation, reason });

    let socket = match tokio_tungstenite::connect_async(endpoint.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(e) => {
            let _ = events.send(closed(format!("connect failed: {}", e)));
            return;
        }
    };
    if events
        .send(ClientEvent::Transport(TransportEvent::Opened { generation }))
        .is_err()
    {
        return;
    }

    let (mut sink, mut stream) = socket.split();
    let reason = loop {
        tokio::select! {
            outbound = outgoing.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break format!("write failed: {}", e);
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break "closed locally".to_string();
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let frame = TransportEvent::Frame { generation, text };
                    if events.send(ClientEvent::Transport(frame)).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(f) if !f.reason.is_empty() => format!("closed by server: {}", f.reason),
                        _ => "closed by server".to_string(),
                    };
                }
                Some(Ok(other)) => debug!("transport: ignoring non-text frame ({} bytes)", other.len()),
                Some(Err(e)) => break format!("read failed: {}", e),
                None => break "connection closed".to_string(),
            },
        }
    };
    let _ = events.send(closed(reason));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_follows_page_scheme() {
        let secure = Url::parse("https://radio.example.org/player/index.html").unwrap();
        assert_eq!(
            websocket_endpoint(&secure).unwrap().as_str(),
            "wss://radio.example.org/ws"
        );

        let plain = Url::parse("http://10.0.0.5:8080/").unwrap();
        assert_eq!(
            websocket_endpoint(&plain).unwrap().as_str(),
            "ws://10.0.0.5:8080/ws"
        );
    }

    #[test]
    fn test_endpoint_needs_host() {
        let url = Url::parse("file:///tmp/index.html").unwrap();
        assert!(websocket_endpoint(&url).is_err());
    }

    fn drain_polls(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Vec<Opcode> {
        let mut polls = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let ClientEvent::Poll(op) = ev {
                polls.push(op);
            }
        }
        polls
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_leaves_one_loop_per_opcode() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let schedule = [(Opcode::NowPlaying, Duration::from_millis(500))];
        let mut timers = PollTimers::default();

        timers.arm(&schedule, &tx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        timers.arm(&schedule, &tx);
        timers.arm(&schedule, &tx);
        assert_eq!(timers.armed(), 1);
        drain_polls(&mut rx);

        // Only the last loop survives: immediate tick plus 500ms and 1000ms.
        tokio::time::sleep(Duration::from_millis(1250)).await;
        assert_eq!(drain_polls(&mut rx).len(), 3);

        timers.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(drain_polls(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_and_close_manage_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let polling = PollingConfig::default();
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let mut transport = TransportManager::new(url, &polling, tx);

        assert!(transport.send_text("x".into()).is_err());

        // Simulate the lifecycle without touching the connection task.
        transport.state = ConnectionState::Connecting;
        transport.generation = 3;
        assert!(!transport.on_opened(2));
        assert!(transport.on_opened(3));
        assert!(transport.is_connected());
        assert_eq!(transport.armed_timers(), 4);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let polls = drain_polls(&mut rx);
        for op in [Opcode::NowPlaying, Opcode::Queue, Opcode::Playlist, Opcode::Artists] {
            assert!(polls.contains(&op), "missing {op}");
        }

        assert!(!transport.on_closed(2, "stale"));
        assert!(transport.is_connected());
        assert!(transport.on_closed(3, "reset by peer"));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert_eq!(transport.armed_timers(), 0);
        assert!(!transport.on_closed(3, "again"));
    }
}
