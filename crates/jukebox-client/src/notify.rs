//! Single-slot notification surface.
//!
//! A new notification always replaces the one on display.  Info and warning
//! notifications expire after the configured timeout; errors stay until
//! dismissed or replaced, since they describe ongoing conditions such as a
//! lost connection.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub shown_at: Instant,
}

#[derive(Debug)]
pub struct NotificationQueue {
    current: Option<Notification>,
    timeout: Duration,
}

impl NotificationQueue {
    pub fn new(timeout: Duration) -> Self {
        Self {
            current: None,
            timeout,
        }
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.push_at(level, message, Instant::now());
    }

    pub fn push_at(&mut self, level: Level, message: impl Into<String>, now: Instant) {
        let message = message.into();
        match level {
            Level::Info => info!("notify: {}", message),
            Level::Warning => warn!("notify: {}", message),
            Level::Error => error!("notify: {}", message),
        }
        self.current = Some(Notification {
            level,
            message,
            shown_at: now,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Level::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message);
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// When the current notification auto-dismisses; `None` for errors.
    pub fn expires_at(&self) -> Option<Instant> {
        match &self.current {
            Some(n) if n.level != Level::Error => Some(n.shown_at + self.timeout),
            _ => None,
        }
    }

    /// Drop the current notification if it has expired.  Returns `true` if
    /// the slot was cleared.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        match self.expires_at() {
            Some(deadline) if now >= deadline => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn dismiss(&mut self) -> bool {
        self.current.take().is_some()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_preempts() {
        let mut q = NotificationQueue::default();
        q.error("connection lost");
        q.info("skipped");
        let n = q.current().unwrap();
        assert_eq!(n.level, Level::Info);
        assert_eq!(n.message, "skipped");
    }

    #[test]
    fn test_info_and_warning_expire() {
        let mut q = NotificationQueue::new(Duration::from_secs(10));
        let t0 = Instant::now();
        q.push_at(Level::Warning, "rating failed", t0);
        assert!(!q.tick_at(t0 + Duration::from_secs(9)));
        assert!(q.current().is_some());
        assert!(q.tick_at(t0 + Duration::from_secs(10)));
        assert!(q.current().is_none());
    }

    #[test]
    fn test_error_persists_until_dismissed() {
        let mut q = NotificationQueue::new(Duration::from_secs(10));
        let t0 = Instant::now();
        q.push_at(Level::Error, "connection lost", t0);
        assert!(q.expires_at().is_none());
        assert!(!q.tick_at(t0 + Duration::from_secs(3600)));
        assert!(q.current().is_some());
        assert!(q.dismiss());
        assert!(q.current().is_none());
        assert!(!q.dismiss());
    }
}
