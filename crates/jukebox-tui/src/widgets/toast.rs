//! Toast: renders the session's single notification slot.

use jukebox_client::notify::{Level, Notification};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_WARNING};

fn color(level: Level) -> ratatui::style::Color {
    match level {
        Level::Info => C_TOAST_INFO,
        Level::Warning => C_TOAST_WARNING,
        Level::Error => C_TOAST_ERROR,
    }
}

fn icon(level: Level) -> &'static str {
    match level {
        Level::Info => "·",
        Level::Warning => "!",
        Level::Error => "✗",
    }
}

/// Render `notification` in the top-right corner of `area`.
pub fn draw(frame: &mut Frame, area: Rect, notification: Option<&Notification>) {
    let Some(n) = notification else {
        return;
    };
    if area.height < 2 || area.width < 8 {
        return;
    }
    let max_width = (area.width / 2).clamp(30, 70).min(area.width);
    let text = format!(" {} {} ", icon(n.level), n.message);
    let w = (text.width() as u16).min(max_width);
    let toast_area = Rect {
        x: area.x + area.width.saturating_sub(w + 1),
        y: area.y + 1,
        width: w,
        height: 1,
    };
    frame.render_widget(Clear, toast_area);
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        text,
        Style::default()
            .fg(color(n.level))
            .add_modifier(Modifier::BOLD),
    )]));
    frame.render_widget(paragraph, toast_area);
}
