//! Session: the one object owning all client state.
//!
//! Constructed once by the composing application.  Background tasks talk to
//! it only through the `ClientEvent` channel returned by [`Session::new`];
//! the owner drains that channel into [`Session::handle_event`] and feeds
//! user input through [`Session::dispatch`].  Every state change is
//! announced on the broadcast event port.

use std::time::Duration;

use jukebox_proto::config::Config;
use jukebox_proto::naming::TrackNaming;
use jukebox_proto::protocol::{Opcode, Track};
use jukebox_proto::query;
use rand::rngs::StdRng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use url::Url;

use crate::dispatcher::RequestDispatcher;
use crate::error::ClientError;
use crate::event::{Action, ClientEvent, SessionEvent, TransportEvent};
use crate::notify::{Level, NotificationQueue};
use crate::paginator::{Paginator, Viewport, DEFAULT_PAGE_SIZE};
use crate::playlist::PlaylistIndex;
use crate::router::{ReplyRouter, RouteOutcome};
use crate::stores::{NowPlayingStore, QueueStore, SearchStore};
use crate::stream::{MediaElement, PlayAttempt, StreamToggle};
use crate::transport::{websocket_endpoint, ConnectionState, TransportManager};

const EVENT_PORT_CAPACITY: usize = 256;

/// The server-backed caches plus the notification slot; everything a reply
/// can change.
#[derive(Default)]
pub struct Stores {
    pub playlist: PlaylistIndex,
    pub now_playing: NowPlayingStore,
    pub queue: QueueStore,
    pub search: SearchStore,
    pub notifications: NotificationQueue,
}

pub struct Session<M> {
    transport: TransportManager,
    dispatcher: RequestDispatcher,
    router: ReplyRouter,
    stores: Stores,
    results: Paginator<Track>,
    results_revision: Option<u64>,
    viewport: Viewport,
    viewport_height: Option<u16>,
    stream: StreamToggle<M>,
    volume_step: f32,
    health_interval: Duration,
    /// Message shown for the current outage, until the connection is back.
    outage_notice: Option<String>,
    events: mpsc::UnboundedSender<ClientEvent>,
    port: broadcast::Sender<SessionEvent>,
}

impl<M: MediaElement> Session<M> {
    /// Build a session for `config`.  Nothing connects until [`start`].
    ///
    /// [`start`]: Session::start
    pub fn new(
        config: &Config,
        media: M,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), ClientError> {
        let base = Url::parse(&config.server.url).map_err(|e| ClientError::Endpoint {
            url: config.server.url.clone(),
            reason: e.to_string(),
        })?;
        let endpoint = websocket_endpoint(&base)?;
        let stream_url = base
            .join(&config.server.stream_path)
            .map_err(|e| ClientError::Endpoint {
                url: config.server.stream_path.clone(),
                reason: e.to_string(),
            })?;

        let (events, rx) = mpsc::unbounded_channel();
        let (port, _) = broadcast::channel(EVENT_PORT_CAPACITY);

        let stores = Stores {
            notifications: NotificationQueue::new(Duration::from_secs(
                config.notifications.timeout_secs,
            )),
            ..Stores::default()
        };

        let session = Self {
            transport: TransportManager::new(endpoint, &config.polling, events.clone()),
            dispatcher: RequestDispatcher::new(),
            router: ReplyRouter::new(config.tracks),
            stores,
            results: Paginator::new(DEFAULT_PAGE_SIZE),
            results_revision: None,
            viewport: Viewport::from(&config.viewport),
            viewport_height: None,
            stream: StreamToggle::new(media, stream_url, config.player.default_volume),
            volume_step: config.player.volume_step,
            health_interval: Duration::from_millis(config.polling.health_check_ms),
            outage_notice: None,
            events,
            port,
        };
        Ok((session, rx))
    }

    /// Seed random mode's shuffle (tests, reproducible sessions).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.stores.playlist = PlaylistIndex::with_rng(rng);
        self.results_revision = None;
        self.sync_results();
        self
    }

    /// Connect and start the reconnect health check.  Must run inside a
    /// tokio runtime.
    pub fn start(&mut self) {
        info!("session: starting against {}", self.transport.endpoint());
        if self.transport.start() {
            self.publish(SessionEvent::ConnectionChanged(ConnectionState::Connecting));
        }
        self.transport.spawn_health_check();
    }

    pub fn shutdown(&mut self) {
        if self.stream.is_playing() {
            self.stream.stop();
        }
        self.transport.shutdown();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.port.subscribe()
    }

    // ── Inputs ────────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Transport(TransportEvent::Opened { generation }) => {
                if !self.transport.on_opened(generation) {
                    return;
                }
                self.publish(SessionEvent::ConnectionChanged(ConnectionState::Connected));
                // Only retract the slot if it still shows this outage.
                let Some(notice) = self.outage_notice.take() else {
                    return;
                };
                let still_shown = self
                    .stores
                    .notifications
                    .current()
                    .is_some_and(|n| n.level == Level::Error && n.message == notice);
                if still_shown {
                    self.stores.notifications.info("Reconnected to server");
                    self.publish(SessionEvent::NotificationChanged);
                }
            }
            ClientEvent::Transport(TransportEvent::Frame { generation, text }) => {
                if generation != self.transport.generation() {
                    debug!("session: dropping frame from stale generation {}", generation);
                    return;
                }
                self.handle_frame(&text);
            }
            ClientEvent::Transport(TransportEvent::Closed { generation, reason }) => {
                if !self.transport.on_closed(generation, &reason) {
                    return;
                }
                let notice = format!(
                    "Lost connection to server ({}), retrying every {}s",
                    reason,
                    self.health_interval.as_secs().max(1)
                );
                self.stores.notifications.error(notice.clone());
                self.outage_notice = Some(notice);
                self.publish(SessionEvent::ConnectionChanged(ConnectionState::Disconnected));
                self.publish(SessionEvent::NotificationChanged);
            }
            ClientEvent::Poll(opcode) => self.request(opcode, None),
            ClientEvent::HealthCheck => {
                if self.transport.on_health_check() {
                    self.publish(SessionEvent::ConnectionChanged(ConnectionState::Connecting));
                }
            }
            ClientEvent::PlayFailed { attempt, error } => {
                self.stores
                    .notifications
                    .error(format!("Stream playback failed: {}", error));
                if self.stream.on_play_failed(attempt) {
                    self.publish(SessionEvent::StreamChanged(self.stream.state()));
                } else {
                    debug!("session: play attempt {} was already superseded", attempt);
                }
                self.publish(SessionEvent::NotificationChanged);
            }
        }
    }

    /// Route one inbound frame and announce what changed.
    pub fn handle_frame(&mut self, text: &str) -> RouteOutcome {
        let outcome = self.router.route(text, &mut self.stores);
        match &outcome {
            RouteOutcome::Applied(opcode) => {
                if let Some(id) = self.dispatcher.last_request(*opcode) {
                    debug!("session: {} reply (last request #{})", opcode, id);
                }
                self.announce(*opcode);
            }
            RouteOutcome::Rejected(opcode) => {
                if *opcode == Opcode::Search {
                    self.publish(SessionEvent::SearchChanged);
                }
                self.publish(SessionEvent::NotificationChanged);
            }
            RouteOutcome::Dropped(_) => {}
        }
        outcome
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!("session: action {:?}", action);
        match action {
            Action::Next => self.request(Opcode::Next, None),
            Action::Boo => self.request(Opcode::Boo, None),
            Action::Tune => self.request(Opcode::Tune, None),
            Action::Search(text) => {
                let text = text.trim();
                if text.is_empty() {
                    self.clear_search();
                } else {
                    self.request(Opcode::Search, Some(text.to_string()));
                }
            }
            Action::ClearSearch => self.clear_search(),
            Action::RequestTrack(identifier) => {
                self.request(Opcode::RequestTrack, Some(identifier));
                // A queued hit should not stay on screen to be queued twice.
                if !self.stores.search.hits().is_empty() {
                    self.clear_search();
                }
            }

            Action::FilterArtists(text) => {
                self.stores.playlist.filter_by_artist(&text);
                self.sync_results();
            }
            Action::SelectArtist(key) => match query::decode(&key) {
                Ok(name) => {
                    self.stores.playlist.filter_by_artist(&name);
                    self.sync_results();
                }
                Err(e) => warn!("session: ignoring artist key {:?}: {}", key, e),
            },
            Action::SortBy(column) => {
                self.stores.playlist.sort_by(column);
                self.sync_results();
            }
            Action::RandomMode => {
                self.stores.playlist.enable_random_mode();
                self.sync_results();
            }

            Action::FirstPage => self.move_cursor(|p| p.first()),
            Action::PreviousPage => self.move_cursor(|p| p.previous()),
            Action::NextPage => self.move_cursor(|p| p.next()),
            Action::LastPage => self.move_cursor(|p| p.last()),
            Action::GotoPage(page) => self.move_cursor(|p| p.goto(page)),
            Action::Viewport { height } => {
                self.viewport_height = Some(height);
                self.resize_pages();
            }

            Action::ToggleStream => {
                if let Some(attempt) = self.stream.toggle() {
                    self.spawn_play(attempt);
                }
                self.publish(SessionEvent::StreamChanged(self.stream.state()));
            }
            Action::Volume(volume) => {
                let v = self.stream.set_volume(volume);
                self.publish(SessionEvent::VolumeChanged(v));
            }
            Action::VolumePercent(percent) => {
                let v = self.stream.set_volume_percent(percent);
                self.publish(SessionEvent::VolumeChanged(v));
            }
            Action::VolumeUp => {
                let v = self.stream.step_volume(self.volume_step);
                self.publish(SessionEvent::VolumeChanged(v));
            }
            Action::VolumeDown => {
                let v = self.stream.step_volume(-self.volume_step);
                self.publish(SessionEvent::VolumeChanged(v));
            }

            Action::DismissNotification => {
                if self.stores.notifications.dismiss() {
                    self.publish(SessionEvent::NotificationChanged);
                }
            }
        }
    }

    /// Expire the notification slot.  Call on the front-end's tick.
    pub fn tick(&mut self) {
        if self.stores.notifications.tick() {
            self.publish(SessionEvent::NotificationChanged);
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn results(&self) -> &Paginator<Track> {
        &self.results
    }

    pub fn stream(&self) -> &StreamToggle<M> {
        &self.stream
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn naming(&self) -> &TrackNaming {
        self.router.naming()
    }

    pub fn router_mut(&mut self) -> &mut ReplyRouter {
        &mut self.router
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn request(&mut self, opcode: Opcode, payload: Option<String>) {
        if let Err(e) = self.dispatcher.send(&mut self.transport, opcode, payload) {
            debug!("session: {} request dropped: {}", opcode, e);
        }
    }

    fn clear_search(&mut self) {
        self.stores.search.clear();
        self.publish(SessionEvent::SearchChanged);
    }

    fn announce(&mut self, opcode: Opcode) {
        match opcode {
            Opcode::NowPlaying => self.publish(SessionEvent::NowPlayingChanged),
            Opcode::Queue => {
                self.publish(SessionEvent::QueueChanged);
                self.resize_pages();
            }
            Opcode::Playlist => {
                if self.sync_results() {
                    self.publish(SessionEvent::PlaylistChanged);
                }
            }
            Opcode::Artists => self.publish(SessionEvent::ArtistsChanged),
            Opcode::Search => self.publish(SessionEvent::SearchChanged),
            Opcode::Next | Opcode::Boo | Opcode::Tune | Opcode::RequestTrack => {
                self.publish(SessionEvent::NotificationChanged)
            }
        }
    }

    /// Reload the results pages if the playlist view changed since the last
    /// sync.  Returns whether it did.
    fn sync_results(&mut self) -> bool {
        let revision = self.stores.playlist.revision();
        if self.results_revision == Some(revision) {
            return false;
        }
        self.results_revision = Some(revision);
        let view = self.stores.playlist.view().into_iter().cloned().collect();
        self.results.set_items(view);
        self.publish(SessionEvent::PageChanged);
        true
    }

    fn resize_pages(&mut self) {
        let Some(height) = self.viewport_height else {
            return;
        };
        let size = self.viewport.page_size(height, self.stores.queue.len());
        if self.results.set_page_size(size) {
            debug!("session: {} results per page", size);
            self.publish(SessionEvent::PageChanged);
        }
    }

    fn move_cursor(&mut self, step: impl FnOnce(&mut Paginator<Track>) -> usize) {
        let before = self.results.cursor();
        if step(&mut self.results) != before {
            self.publish(SessionEvent::PageChanged);
        }
    }

    fn spawn_play(&self, PlayAttempt { attempt, future }: PlayAttempt) {
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(error) = future.await {
                let _ = events.send(ClientEvent::PlayFailed { attempt, error });
            }
        });
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.port.send(event);
    }
}

impl<M> Drop for Session<M> {
    fn drop(&mut self) {
        self.transport.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::SortColumn;
    use crate::stream::tests::FakeMedia;
    use crate::stream::StreamState;
    use rand::SeedableRng;
    use serde_json::json;

    fn session() -> (Session<FakeMedia>, mpsc::UnboundedReceiver<ClientEvent>) {
        let config = Config::default();
        let (session, rx) = Session::new(&config, FakeMedia::default()).unwrap();
        (session.with_rng(StdRng::seed_from_u64(7)), rx)
    }

    fn playlist_frame(n: usize) -> String {
        let tracks: Vec<_> = (0..n)
            .map(|i| {
                json!({
                    "filename": format!("Track {i:02}-abcdefghijk.mp3"),
                    "artist": if i % 2 == 0 { "Even" } else { "Odd" },
                    "title": format!("Song {i}"),
                    "duration": 100 + i,
                    "rating": i % 10,
                })
            })
            .collect();
        json!({"o": 107, "s": true, "d": tracks}).to_string()
    }

    fn drain(port: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        while let Ok(ev) = port.try_recv() {
            seen.push(ev);
        }
        seen
    }

    #[test]
    fn test_rejects_bad_server_url() {
        let mut config = Config::default();
        config.server.url = "not a url".into();
        assert!(matches!(
            Session::new(&config, FakeMedia::default()),
            Err(ClientError::Endpoint { .. })
        ));
    }

    #[test]
    fn test_stream_url_joins_base() {
        let mut config = Config::default();
        config.server.url = "https://radio.example.org/".into();
        let (session, _rx) = Session::new(&config, FakeMedia::default()).unwrap();
        assert_eq!(session.stream().stream_url(), "https://radio.example.org/stream.mp3");
    }

    #[test]
    fn test_playlist_reply_fills_pages() {
        let (mut session, _rx) = session();
        let mut port = session.subscribe();

        session.handle_frame(&playlist_frame(25));
        assert_eq!(session.results().len(), 25);
        assert_eq!(session.results().current().len(), DEFAULT_PAGE_SIZE);
        assert!(drain(&mut port).contains(&SessionEvent::PlaylistChanged));

        session.dispatch(Action::NextPage);
        session.dispatch(Action::NextPage);
        assert_eq!(session.results().cursor(), 2);
        assert_eq!(session.results().current().len(), 5);

        // An identical snapshot keeps the reader's place.
        session.handle_frame(&playlist_frame(25));
        assert_eq!(session.results().cursor(), 2);
        assert!(!drain(&mut port).contains(&SessionEvent::PlaylistChanged));

        // A changed one starts over.
        session.handle_frame(&playlist_frame(26));
        assert_eq!(session.results().cursor(), 0);
    }

    #[test]
    fn test_filter_and_sort_reset_cursor() {
        let (mut session, _rx) = session();
        session.handle_frame(&playlist_frame(30));
        session.dispatch(Action::LastPage);
        assert_eq!(session.results().cursor(), 2);

        session.dispatch(Action::FilterArtists("odd".into()));
        assert_eq!(session.results().len(), 15);
        assert_eq!(session.results().cursor(), 0);
        assert!(session.results().items().iter().all(|t| t.artist == "Odd"));

        session.dispatch(Action::SortBy(SortColumn::Duration));
        let durations: Vec<u64> = session.results().items().iter().map(|t| t.duration).collect();
        assert!(durations.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_select_artist_by_key() {
        let (mut session, _rx) = session();
        session.handle_frame(&playlist_frame(6));
        let key = session
            .stores()
            .playlist
            .artists()
            .iter()
            .find(|a| a.name == "Even")
            .map(|a| a.key.clone())
            .unwrap();

        session.dispatch(Action::SelectArtist(key));
        assert_eq!(session.results().len(), 3);

        session.dispatch(Action::SelectArtist("!!not base64!!".into()));
        assert_eq!(session.results().len(), 3);
    }

    #[test]
    fn test_queue_length_shrinks_pages() {
        let (mut session, _rx) = session();
        session.handle_frame(&playlist_frame(40));
        // 7 header rows, 2 spare rows.
        session.dispatch(Action::Viewport { height: 29 });
        assert_eq!(session.results().page_size(), 20);

        let queue = json!({"o": 106, "s": true, "d": {"0": "a.mp3", "1": "b.mp3", "2": "c.mp3"}});
        session.handle_frame(&queue.to_string());
        assert_eq!(session.results().page_size(), 16);
    }

    #[test]
    fn test_actions_while_disconnected_are_dropped() {
        let (mut session, _rx) = session();
        session.dispatch(Action::Next);
        session.dispatch(Action::Search("abba".into()));
        assert!(session.stores().notifications.current().is_none());
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_empty_search_clears_results() {
        let (mut session, _rx) = session();
        session.handle_frame(&json!({"o": 104, "s": true, "d": ["x-abcdefghijk.mp3"]}).to_string());
        assert_eq!(session.stores().search.hits().len(), 1);

        session.dispatch(Action::Search("   ".into()));
        assert!(session.stores().search.hits().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_play_reports_and_stops() {
        let media = FakeMedia {
            reject: true,
            ..FakeMedia::default()
        };
        let (mut session, mut rx) = Session::new(&Config::default(), media).unwrap();

        session.dispatch(Action::ToggleStream);
        assert_eq!(session.stream().state(), StreamState::Playing);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ClientEvent::PlayFailed { attempt: 1, .. }));
        session.handle_event(event);

        assert_eq!(session.stream().state(), StreamState::Stopped);
        let shown = session.stores().notifications.current().unwrap();
        assert_eq!(shown.level, Level::Error);
        assert!(shown.message.starts_with("Stream playback failed"));
    }

    #[tokio::test]
    async fn test_volume_survives_toggles() {
        let (mut session, _rx) = session();
        session.dispatch(Action::ToggleStream);
        session.dispatch(Action::VolumePercent(30));
        session.dispatch(Action::VolumeUp);
        session.dispatch(Action::ToggleStream);

        assert_eq!(session.stream().state(), StreamState::Stopped);
        assert!((session.stream().volume() - 0.4).abs() < 1e-6);
        assert_eq!(session.stream().media().source(), None);
        assert!((session.stream().media().volume - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_stale_close_is_ignored() {
        let (mut session, _rx) = session();
        session.handle_event(ClientEvent::Transport(TransportEvent::Closed {
            generation: 41,
            reason: "old socket".into(),
        }));
        assert!(session.stores().notifications.current().is_none());
    }

    #[test]
    fn test_requesting_a_track_clears_search() {
        let (mut session, _rx) = session();
        let mut port = session.subscribe();
        session.handle_frame(&json!({"o": 104, "s": true, "d": ["x-abcdefghijk.mp3"]}).to_string());
        assert_eq!(session.stores().search.hits().len(), 1);

        session.dispatch(Action::RequestTrack("abcdefghijk".into()));
        assert!(session.stores().search.hits().is_empty());
        assert!(drain(&mut port).contains(&SessionEvent::SearchChanged));
    }

    fn unreachable_session() -> (Session<FakeMedia>, mpsc::UnboundedReceiver<ClientEvent>) {
        let mut config = Config::default();
        config.server.url = "http://127.0.0.1:9".into();
        Session::new(&config, FakeMedia::default()).unwrap()
    }

    fn opened(generation: u64) -> ClientEvent {
        ClientEvent::Transport(TransportEvent::Opened { generation })
    }

    #[tokio::test]
    async fn test_first_connect_keeps_unrelated_error() {
        let (mut session, _rx) = unreachable_session();
        session.handle_event(ClientEvent::PlayFailed {
            attempt: 0,
            error: ClientError::PlaybackRejected("no audio device".into()),
        });

        session.start();
        session.handle_event(opened(1));
        assert!(session.is_connected());
        let shown = session.stores().notifications.current().unwrap();
        assert_eq!(shown.level, Level::Error);
        assert!(shown.message.contains("no audio device"));
    }

    #[tokio::test]
    async fn test_reconnect_retracts_outage_notice() {
        let (mut session, _rx) = unreachable_session();
        session.start();
        session.handle_event(opened(1));
        session.handle_event(ClientEvent::Transport(TransportEvent::Closed {
            generation: 1,
            reason: "reset by peer".into(),
        }));
        assert_eq!(session.stores().notifications.current().unwrap().level, Level::Error);

        session.handle_event(ClientEvent::HealthCheck);
        session.handle_event(opened(2));
        let shown = session.stores().notifications.current().unwrap();
        assert_eq!(shown.level, Level::Info);
        assert_eq!(shown.message, "Reconnected to server");
    }

    #[tokio::test]
    async fn test_reconnect_keeps_newer_error() {
        let (mut session, _rx) = unreachable_session();
        session.start();
        session.handle_event(opened(1));
        session.handle_event(ClientEvent::Transport(TransportEvent::Closed {
            generation: 1,
            reason: "reset by peer".into(),
        }));
        session.handle_event(ClientEvent::PlayFailed {
            attempt: 0,
            error: ClientError::PlaybackRejected("mpv exited".into()),
        });

        session.handle_event(ClientEvent::HealthCheck);
        session.handle_event(opened(2));
        let shown = session.stores().notifications.current().unwrap();
        assert_eq!(shown.level, Level::Error);
        assert!(shown.message.contains("mpv exited"));
    }
}
