//! Fixed-size pages over a result list.
//!
//! `last()` is `floor(N/P) - 1`, the last *full* page, while `next()` and
//! `goto()` clamp to the final populated page `ceil(N/P) - 1`.  The two only
//! differ when the last page is partial; that page is reachable with `next()`.

use std::ops::Range;

use jukebox_proto::config::ViewportConfig;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Maximum number of page links in a pagination bar.
pub const MAX_PAGE_LINKS: usize = 10;

#[derive(Debug, Clone)]
pub struct Paginator<T> {
    items: Vec<T>,
    page_size: usize,
    cursor: usize,
}

impl<T> Paginator<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            page_size: page_size.max(1),
            cursor: 0,
        }
    }

    /// Set the page size (0 is treated as 1).  Resets the cursor when the
    /// size actually changes; returns whether it did.
    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        let page_size = page_size.max(1);
        if page_size == self.page_size {
            return false;
        }
        self.page_size = page_size;
        self.cursor = 0;
        true
    }

    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.cursor = 0;
    }

    /// Items `[index*P, index*P + P)`, clamped to what exists.
    pub fn page(&self, index: usize) -> &[T] {
        let start = index.saturating_mul(self.page_size).min(self.items.len());
        let end = start.saturating_add(self.page_size).min(self.items.len());
        &self.items[start..end]
    }

    pub fn current(&self) -> &[T] {
        self.page(self.cursor)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.items.len().div_ceil(self.page_size)
    }

    fn final_page(&self) -> usize {
        self.page_count().saturating_sub(1)
    }

    pub fn first(&mut self) -> usize {
        self.cursor = 0;
        self.cursor
    }

    pub fn previous(&mut self) -> usize {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor
    }

    pub fn next(&mut self) -> usize {
        self.cursor = (self.cursor + 1).min(self.final_page());
        self.cursor
    }

    pub fn goto(&mut self, page: usize) -> usize {
        self.cursor = page.min(self.final_page());
        self.cursor
    }

    pub fn last(&mut self) -> usize {
        self.cursor = (self.items.len() / self.page_size).saturating_sub(1);
        self.cursor
    }

    /// Page numbers to show in a pagination bar: everything when there are
    /// few pages, otherwise a window of `MAX_PAGE_LINKS` around the cursor.
    pub fn page_window(&self) -> Range<usize> {
        let count = self.page_count();
        let half = MAX_PAGE_LINKS / 2;
        if count <= MAX_PAGE_LINKS {
            0..count
        } else if self.cursor < half {
            0..MAX_PAGE_LINKS
        } else if count - self.cursor < half {
            count - MAX_PAGE_LINKS..count
        } else {
            self.cursor - half..self.cursor + half
        }
    }
}

impl<T> Default for Paginator<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Derives the page size from the display height: the header is reserved,
/// the queue panel takes one row per entry plus a title row when non-empty,
/// and a few spare rows are kept free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub header_rows: u16,
    pub row_height: u16,
    pub spare_rows: u16,
}

impl Viewport {
    pub fn page_size(&self, available_height: u16, queued: usize) -> usize {
        let row = usize::from(self.row_height.max(1));
        let content = usize::from(available_height.saturating_sub(self.header_rows));
        let queue_panel = if queued > 0 { (queued + 1) * row } else { 0 };
        let rows = content.saturating_sub(queue_panel) / row;
        rows.saturating_sub(usize::from(self.spare_rows)).max(1)
    }
}

impl From<&ViewportConfig> for Viewport {
    fn from(config: &ViewportConfig) -> Self {
        Self {
            header_rows: config.header_rows,
            row_height: config.row_height,
            spare_rows: config.spare_rows,
        }
    }
}
