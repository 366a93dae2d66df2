//! Frame layout and the read-only panels.
//!
//! ```text
//!   ┌ now playing · rating · stream ─────────────────────┐  title
//!   │ 1:02 ███████▌                                 3:20 │  progress
//!   │ / filter artists                                   │  filter / search prompt
//!   │ Up next (queue, only when non-empty)               │
//!   ├ artists ─┬ results ───────────────────┬ search ────┤
//!   │          │                            │            │
//!   └──────────┴────────────────────────────┴────────────┘
//!    status bar
//! ```

use jukebox_client::paginator::Paginator;
use jukebox_client::playlist::ArtistEntry;
use jukebox_client::stores::{QueueStore, SearchHit};
use jukebox_client::stream::{MediaElement, StreamState};
use jukebox_client::transport::ConnectionState;
use jukebox_client::Session;
use jukebox_proto::naming::TrackNaming;
use jukebox_proto::protocol::Track;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::theme::{
    style_border, style_default, style_muted, style_secondary, style_selected, style_title,
    C_CONNECTING, C_ERROR, C_PLAYING, C_STARS,
};
use crate::widgets::progress_bar::{draw_progress, fmt_time};

pub const ARTISTS_WIDTH: u16 = 26;
pub const SEARCH_WIDTH: u16 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Artists,
    Results,
    Search,
}

impl Pane {
    pub fn next(self) -> Self {
        match self {
            Pane::Artists => Pane::Results,
            Pane::Results => Pane::Search,
            Pane::Search => Pane::Artists,
        }
    }
}

pub struct Areas {
    pub title: Rect,
    pub progress: Rect,
    pub prompt: Rect,
    pub queue: Rect,
    pub artists: Rect,
    pub results: Rect,
    pub search: Rect,
    pub status: Rect,
}

pub fn split(area: Rect, queued: usize, show_search: bool) -> Areas {
    let queue_rows = if queued > 0 { queued as u16 + 1 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(queue_rows),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let search_w = if show_search { SEARCH_WIDTH } else { 0 };
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(ARTISTS_WIDTH),
            Constraint::Min(20),
            Constraint::Length(search_w),
        ])
        .split(rows[4]);

    Areas {
        title: rows[0],
        progress: rows[1],
        prompt: rows[2],
        queue: rows[3],
        artists: body[0],
        results: body[1],
        search: body[2],
        status: rows[5],
    }
}

// ── Header ────────────────────────────────────────────────────────────────────

pub fn draw_now_playing<M: MediaElement>(frame: &mut Frame, area: Rect, session: &Session<M>) {
    let naming = session.naming();
    let mut spans = vec![Span::styled(" ♪ ", style_title())];
    match session.stores().now_playing.get() {
        Some(np) => {
            spans.push(Span::styled(
                naming.display_name(&np.filename).to_string(),
                style_default(),
            ));
            spans.push(Span::styled(
                format!("  ★ {}/10", np.rating),
                Style::default().fg(C_STARS),
            ));
        }
        None => spans.push(Span::styled("nothing playing yet", style_muted())),
    }
    let stream = match session.stream().state() {
        StreamState::Playing => Span::styled("  ▶ listening", Style::default().fg(C_PLAYING)),
        StreamState::Stopped => Span::styled("  ■ muted", style_secondary()),
    };
    spans.push(stream);
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn draw_progress_line<M: MediaElement>(frame: &mut Frame, area: Rect, session: &Session<M>) {
    let store = &session.stores().now_playing;
    let (elapsed, duration) = store.get().map(|np| (np.elapsed, np.duration)).unwrap_or((0, 0));
    draw_progress(frame, area, store.progress(), elapsed, duration);
}

pub fn draw_queue(frame: &mut Frame, area: Rect, queue: &QueueStore, naming: &TrackNaming) {
    if area.height == 0 {
        return;
    }
    let mut lines = vec![Line::from(Span::styled(" Up next", style_title()))];
    for (pos, name) in queue.display_entries(naming) {
        lines.push(Line::from(vec![
            Span::styled(format!(" {:>3}. ", pos + 1), style_secondary()),
            Span::styled(name.to_string(), style_default()),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

// ── Body ──────────────────────────────────────────────────────────────────────

/// First row to show so that `selected` stays visible in `height` rows.
fn scroll_offset(selected: usize, height: usize) -> usize {
    if height == 0 {
        0
    } else {
        selected.saturating_sub(height - 1)
    }
}

pub fn draw_artists(
    frame: &mut Frame,
    area: Rect,
    artists: &[ArtistEntry],
    selected: usize,
    focused: bool,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border(focused))
        .title(Span::styled(format!(" artists ({}) ", artists.len()), style_title()));
    let inner_h = usize::from(area.height.saturating_sub(2));
    let offset = scroll_offset(selected, inner_h);
    let lines: Vec<Line> = artists
        .iter()
        .enumerate()
        .skip(offset)
        .take(inner_h)
        .map(|(i, artist)| {
            let style = if focused && i == selected {
                style_selected()
            } else {
                style_default()
            };
            Line::from(Span::styled(artist.name.clone(), style))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn draw_results(
    frame: &mut Frame,
    area: Rect,
    results: &Paginator<Track>,
    order_label: &str,
    selected: usize,
    focused: bool,
) {
    let pages: Vec<String> = results
        .page_window()
        .map(|p| {
            if p == results.cursor() {
                format!("[{}]", p + 1)
            } else {
                (p + 1).to_string()
            }
        })
        .collect();
    let title = format!(
        " results · {} · {} of {} ",
        order_label,
        pages.join(" "),
        results.page_count().max(1)
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border(focused))
        .title(Span::styled(title, style_title()));

    let header = Row::new(["Artist", "Title", "Time", "Rating"]).style(style_secondary());
    let rows: Vec<Row> = results
        .current()
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let style = if focused && i == selected {
                style_selected()
            } else {
                style_default()
            };
            Row::new(vec![
                Cell::from(track.artist.clone()),
                Cell::from(track.title.clone()),
                Cell::from(fmt_time(track.duration)),
                Cell::from(format!("{}/10", track.rating)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(35),
        Constraint::Percentage(45),
        Constraint::Length(8),
        Constraint::Length(7),
    ];
    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

pub fn draw_search(frame: &mut Frame, area: Rect, hits: &[SearchHit], selected: usize, focused: bool) {
    if area.width == 0 {
        return;
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(style_border(focused))
        .title(Span::styled(format!(" search ({}) ", hits.len()), style_title()));
    let inner_h = usize::from(area.height.saturating_sub(2));
    let offset = scroll_offset(selected, inner_h);
    let lines: Vec<Line> = hits
        .iter()
        .enumerate()
        .skip(offset)
        .take(inner_h)
        .map(|(i, hit)| {
            let style = if focused && i == selected {
                style_selected()
            } else if hit.identifier.is_none() {
                style_muted()
            } else {
                style_default()
            };
            Line::from(Span::styled(hit.display.clone(), style))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

// ── Status bar ────────────────────────────────────────────────────────────────

pub fn draw_status<M: MediaElement>(frame: &mut Frame, area: Rect, session: &Session<M>) {
    let state = session.connection_state();
    let color = match state {
        ConnectionState::Connected => C_PLAYING,
        ConnectionState::Connecting => C_CONNECTING,
        ConnectionState::Disconnected => C_ERROR,
    };
    let volume = (session.stream().volume() * 100.0).round() as u32;
    let spans = vec![
        Span::styled(format!(" ● {} ", state.label()), Style::default().fg(color)),
        Span::styled(format!(" vol {}% ", volume), style_secondary()),
        Span::styled(
            format!(" {} tracks ", session.stores().playlist.tracks().len()),
            style_secondary(),
        ),
        Span::styled(
            " space stream · n next · b/t boo/tune · / filter · ? search · s sort · r random · enter request · q quit",
            style_muted(),
        ),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_reserves_queue_rows() {
        let area = Rect::new(0, 0, 120, 40);
        let without = split(area, 0, false);
        let with = split(area, 3, true);
        assert_eq!(without.queue.height, 0);
        assert_eq!(with.queue.height, 4);
        assert_eq!(without.results.height - with.results.height, 4);
        assert_eq!(without.search.width, 0);
        assert_eq!(with.search.width, SEARCH_WIDTH);
    }

    #[test]
    fn test_scroll_offset_keeps_selection_visible() {
        assert_eq!(scroll_offset(0, 10), 0);
        assert_eq!(scroll_offset(9, 10), 0);
        assert_eq!(scroll_offset(15, 10), 6);
        assert_eq!(scroll_offset(3, 0), 0);
    }
}
