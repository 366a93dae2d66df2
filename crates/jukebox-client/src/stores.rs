//! Server-authoritative caches.  Each is only ever replaced wholesale from a
//! reply; nothing here is mutated locally.

use jukebox_proto::naming::TrackNaming;
use jukebox_proto::protocol::{NowPlaying, QueueSnapshot};

#[derive(Debug, Default)]
pub struct NowPlayingStore {
    current: Option<NowPlaying>,
}

impl NowPlayingStore {
    pub fn replace(&mut self, now_playing: NowPlaying) {
        self.current = Some(now_playing);
    }

    pub fn get(&self) -> Option<&NowPlaying> {
        self.current.as_ref()
    }

    /// Elapsed/duration in 0.0..=1.0, for progress bars.
    pub fn progress(&self) -> f64 {
        match &self.current {
            Some(np) if np.duration > 0 => (np.elapsed as f64 / np.duration as f64).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct QueueStore {
    entries: QueueSnapshot,
}

impl QueueStore {
    pub fn replace(&mut self, entries: QueueSnapshot) {
        self.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(position, display name)` pairs in queue order.
    pub fn display_entries<'a>(&'a self, naming: &TrackNaming) -> Vec<(u32, &'a str)> {
        self.entries
            .iter()
            .map(|(pos, filename)| (*pos, naming.display_name(filename)))
            .collect()
    }
}

/// One search result, ready to be requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub filename: String,
    pub display: String,
    pub identifier: Option<String>,
}

#[derive(Debug, Default)]
pub struct SearchStore {
    hits: Vec<SearchHit>,
}

impl SearchStore {
    pub fn replace(&mut self, filenames: Vec<String>, naming: &TrackNaming) {
        self.hits = filenames
            .into_iter()
            .map(|filename| SearchHit {
                display: naming.display_name(&filename).to_string(),
                identifier: naming.identifier(&filename).map(str::to_string),
                filename,
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.hits.clear();
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_display_strips_identifier() {
        let naming = TrackNaming {
            display_suffix_len: 7,
            id_len: 7,
        };
        let mut queue = QueueStore::default();
        queue.replace(QueueSnapshot::from([(
            0,
            "ArtistName - SongTitle.mp3AB12345".to_string(),
        )]));
        assert_eq!(
            queue.display_entries(&naming),
            vec![(0, "ArtistName - SongTitle.mp3")]
        );
    }

    #[test]
    fn test_search_hits_carry_identifier() {
        let mut search = SearchStore::default();
        search.replace(
            vec!["Moby - Porcelain-abcdefghijk.mp3".to_string()],
            &TrackNaming::default(),
        );
        let hit = &search.hits()[0];
        assert_eq!(hit.display, "Moby - Porcelain");
        assert_eq!(hit.identifier.as_deref(), Some("abcdefghijk"));
    }

    #[test]
    fn test_progress_handles_zero_duration() {
        let mut np = NowPlayingStore::default();
        assert_eq!(np.progress(), 0.0);
        np.replace(NowPlaying {
            duration: 0,
            elapsed: 10,
            ..NowPlaying::default()
        });
        assert_eq!(np.progress(), 0.0);
        np.replace(NowPlaying {
            duration: 200,
            elapsed: 50,
            ..NowPlaying::default()
        });
        assert!((np.progress() - 0.25).abs() < 1e-9);
    }
}
