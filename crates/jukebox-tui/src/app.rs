//! App: terminal event loop around a jukebox `Session`.
//!
//! Architecture:
//! - The `Session` owns all client state; the app only keeps UI state
//!   (focused pane, row selections, open prompts).
//! - Terminal input arrives on an mpsc channel fed by a blocking reader.
//! - Session background tasks post `ClientEvent`s on their own channel; the
//!   loop drains it into `Session::handle_event`.
//! - The session's event port tells the loop when to redraw.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jukebox_client::playlist::{SortColumn, ViewOrder};
use jukebox_client::{Action, ClientEvent, Session, SessionEvent};
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::mpv::MpvStream;
use crate::ui::{self, Pane};
use crate::widgets::filter_input::{FilterAction, FilterInput};
use crate::widgets::toast;

const MAX_DRAIN: usize = 256;

/// How long the input reader blocks before re-checking its stop flag.
const INPUT_POLL: Duration = Duration::from_millis(100);

pub struct App {
    session: Session<MpvStream>,
    port: broadcast::Receiver<SessionEvent>,
    focus: Pane,
    artist_row: usize,
    result_row: usize,
    search_row: usize,
    artist_filter: FilterInput,
    search_input: FilterInput,
    should_quit: bool,
}

impl App {
    pub fn new(session: Session<MpvStream>) -> Self {
        let port = session.subscribe();
        Self {
            session,
            port,
            focus: Pane::Results,
            artist_row: 0,
            result_row: 0,
            search_row: 0,
            artist_filter: FilterInput::new("/", "filter artists"),
            search_input: FilterInput::new("?", "search the server"),
            should_quit: false,
        }
    }

    pub async fn run(mut self, mut client_rx: mpsc::UnboundedReceiver<ClientEvent>) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal, &mut client_rx).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        self.session.shutdown();
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        info!("jukebox exiting");
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        client_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    ) -> anyhow::Result<()> {
        // ── Background task: keyboard events ─────────────────────────────────
        let (term_tx, mut term_rx) = mpsc::channel::<Event>(256);
        let _input = InputReader::spawn(term_tx);

        let size = terminal.size()?;
        self.session.dispatch(Action::Viewport { height: size.height });
        self.session.start();

        // Notification expiry + progress refresh.
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                return Ok(());
            }

            tokio::select! {
                Some(ev) = term_rx.recv() => {
                    needs_redraw = self.handle_terminal_event(ev);
                }
                Some(ev) = client_rx.recv() => {
                    self.session.handle_event(ev);
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = client_rx.try_recv() else { break };
                        self.session.handle_event(next);
                        drained += 1;
                    }
                }
                _ = tick.tick() => {
                    self.session.tick();
                }
            }
            needs_redraw |= self.drain_port();
        }
    }

    /// Consume session events; returns whether anything visible changed.
    fn drain_port(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.port.try_recv() {
                Ok(ev) => {
                    changed = true;
                    match ev {
                        SessionEvent::PageChanged => self.clamp_result_row(),
                        SessionEvent::ArtistsChanged | SessionEvent::PlaylistChanged => {
                            let n = self.session.stores().playlist.artists().len();
                            self.artist_row = self.artist_row.min(n.saturating_sub(1));
                        }
                        SessionEvent::SearchChanged => {
                            let n = self.session.stores().search.hits().len();
                            self.search_row = self.search_row.min(n.saturating_sub(1));
                            if n == 0 && self.focus == Pane::Search {
                                self.focus = Pane::Results;
                            }
                        }
                        _ => {}
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("session event port lagged by {} events", n);
                    changed = true;
                }
                Err(_) => break,
            }
        }
        changed
    }

    fn clamp_result_row(&mut self) {
        let n = self.session.results().current().len();
        self.result_row = self.result_row.min(n.saturating_sub(1));
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    fn handle_terminal_event(&mut self, ev: Event) -> bool {
        match ev {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                self.handle_key(key);
                true
            }
            Event::Resize(_, height) => {
                self.session.dispatch(Action::Viewport { height });
                true
            }
            _ => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.artist_filter.is_active() {
            match self.artist_filter.handle_key(key) {
                FilterAction::Changed(text) => self.session.dispatch(Action::FilterArtists(text)),
                FilterAction::Cancelled => self.session.dispatch(Action::FilterArtists(String::new())),
                FilterAction::Confirmed(_) | FilterAction::None => {}
            }
            return;
        }
        if self.search_input.is_active() {
            if let FilterAction::Confirmed(text) = self.search_input.handle_key(key) {
                self.session.dispatch(Action::Search(text));
                self.search_row = 0;
                self.focus = Pane::Search;
            }
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        let action = match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                None
            }
            KeyCode::Char(' ') => Some(Action::ToggleStream),
            KeyCode::Char('n') => Some(Action::Next),
            KeyCode::Char('b') => Some(Action::Boo),
            KeyCode::Char('t') => Some(Action::Tune),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::VolumeUp),
            KeyCode::Char('-') => Some(Action::VolumeDown),
            KeyCode::Char('/') => {
                self.artist_filter.activate();
                None
            }
            KeyCode::Char('?') => {
                self.search_input.activate();
                None
            }
            KeyCode::Char('s') => Some(Action::SortBy(self.next_sort_column())),
            KeyCode::Char('r') => Some(Action::RandomMode),
            KeyCode::Tab => {
                self.cycle_focus();
                None
            }
            KeyCode::Up => {
                self.move_selection(-1);
                None
            }
            KeyCode::Down => {
                self.move_selection(1);
                None
            }
            KeyCode::Left | KeyCode::PageUp => Some(Action::PreviousPage),
            KeyCode::Right | KeyCode::PageDown => Some(Action::NextPage),
            KeyCode::Home => Some(Action::FirstPage),
            KeyCode::End => Some(Action::LastPage),
            KeyCode::Enter => self.activate_selection(),
            KeyCode::Esc => Some(Action::DismissNotification),
            _ => None,
        };
        if let Some(action) = action {
            self.session.dispatch(action);
        }
    }

    fn next_sort_column(&self) -> SortColumn {
        match self.session.stores().playlist.order() {
            ViewOrder::Column(column) => column.next(),
            ViewOrder::Snapshot | ViewOrder::Random => SortColumn::Artist,
        }
    }

    fn cycle_focus(&mut self) {
        self.focus = self.focus.next();
        if self.focus == Pane::Search && self.session.stores().search.hits().is_empty() {
            self.focus = self.focus.next();
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let (row, len) = match self.focus {
            Pane::Artists => (&mut self.artist_row, self.session.stores().playlist.artists().len()),
            Pane::Results => (&mut self.result_row, self.session.results().current().len()),
            Pane::Search => (&mut self.search_row, self.session.stores().search.hits().len()),
        };
        if len == 0 {
            *row = 0;
            return;
        }
        *row = row.saturating_add_signed(delta).min(len - 1);
    }

    /// Enter on the focused pane: select an artist or request a track.
    fn activate_selection(&mut self) -> Option<Action> {
        let stores = self.session.stores();
        match self.focus {
            Pane::Artists => {
                let artist = stores.playlist.artists().get(self.artist_row)?;
                self.result_row = 0;
                Some(Action::SelectArtist(artist.key.clone()))
            }
            Pane::Results => {
                let track = self.session.results().current().get(self.result_row)?;
                let id = self.session.naming().identifier(&track.filename);
                if id.is_none() {
                    debug!("no identifier in {:?}", track.filename);
                }
                id.map(|id| Action::RequestTrack(id.to_string()))
            }
            Pane::Search => {
                let hit = stores.search.hits().get(self.search_row)?;
                hit.identifier.clone().map(Action::RequestTrack)
            }
        }
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&self, frame: &mut Frame) {
        let stores = self.session.stores();
        let show_search = !stores.search.hits().is_empty();
        let full = frame.area();
        let areas = ui::split(full, stores.queue.len(), show_search);

        ui::draw_now_playing(frame, areas.title, &self.session);
        ui::draw_progress_line(frame, areas.progress, &self.session);
        if self.search_input.is_active() {
            self.search_input.draw(frame, areas.prompt);
        } else {
            self.artist_filter.draw(frame, areas.prompt);
        }
        ui::draw_queue(frame, areas.queue, &stores.queue, self.session.naming());
        ui::draw_artists(
            frame,
            areas.artists,
            stores.playlist.artists(),
            self.artist_row,
            self.focus == Pane::Artists,
        );
        ui::draw_results(
            frame,
            areas.results,
            self.session.results(),
            stores.playlist.order().label(),
            self.result_row,
            self.focus == Pane::Results,
        );
        if show_search {
            ui::draw_search(
                frame,
                areas.search,
                stores.search.hits(),
                self.search_row,
                self.focus == Pane::Search,
            );
        }
        ui::draw_status(frame, areas.status, &self.session);
        toast::draw(frame, full, stores.notifications.current());
    }
}

// ── Terminal input ────────────────────────────────────────────────────────────

/// Blocking terminal reader.  Stops within `INPUT_POLL` once dropped, so the
/// runtime can shut down without waiting for another key press.
struct InputReader {
    stop: Arc<AtomicBool>,
}

impl InputReader {
    fn spawn(tx: mpsc::Sender<Event>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        tokio::task::spawn_blocking(move || pump_input(read_terminal, &tx, &flag));
        Self { stop }
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn read_terminal(timeout: Duration) -> io::Result<Option<Event>> {
    if event::poll(timeout)? {
        event::read().map(Some)
    } else {
        Ok(None)
    }
}

/// Forward events from `next` until `stop` is set, the receiver is gone or
/// reading fails.
fn pump_input<F>(mut next: F, tx: &mpsc::Sender<Event>, stop: &AtomicBool)
where
    F: FnMut(Duration) -> io::Result<Option<Event>>,
{
    while !stop.load(Ordering::Relaxed) {
        match next(INPUT_POLL) {
            Ok(Some(ev)) => {
                if tx.blocking_send(ev).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("terminal input failed: {}", e);
                break;
            }
        }
    }
    debug!("input reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    #[test]
    fn test_input_reader_stops_without_a_key_press() {
        let (tx, _rx) = mpsc::channel::<Event>(4);
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let reader = std::thread::spawn(move || {
            pump_input(
                |timeout| {
                    std::thread::sleep(timeout.min(Duration::from_millis(5)));
                    Ok(None)
                },
                &tx,
                &flag,
            )
        });

        std::thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();
    }

    #[test]
    fn test_input_reader_forwards_events() {
        let (tx, mut rx) = mpsc::channel::<Event>(4);
        let stop = AtomicBool::new(false);
        let mut pending = vec![Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE))];
        pump_input(
            |_| match pending.pop() {
                Some(ev) => Ok(Some(ev)),
                None => Err(io::Error::new(io::ErrorKind::Other, "closed")),
            },
            &tx,
            &stop,
        );
        match rx.try_recv() {
            Ok(Event::Key(key)) => assert_eq!(key.code, KeyCode::Char('q')),
            other => panic!("unexpected {other:?}"),
        }
    }
}
