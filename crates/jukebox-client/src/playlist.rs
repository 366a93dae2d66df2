//! PlaylistIndex: the catalog snapshot plus its filtered, ordered view.
//!
//! The snapshot is replaced wholesale on every playlist reply.  The view is
//! rebuilt whenever the snapshot, the artist filter or the ordering changes;
//! `revision()` increments on each rebuild so owners can tell when derived
//! state (pages) must be refreshed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use jukebox_proto::protocol::Track;
use jukebox_proto::query;

/// Column orderings.  Names sort ascending, numbers descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Artist,
    Title,
    Filename,
    Duration,
    Rating,
}

impl SortColumn {
    pub fn next(self) -> Self {
        match self {
            Self::Artist => Self::Title,
            Self::Title => Self::Filename,
            Self::Filename => Self::Duration,
            Self::Duration => Self::Rating,
            Self::Rating => Self::Artist,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Title => "title",
            Self::Filename => "filename",
            Self::Duration => "duration",
            Self::Rating => "rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOrder {
    /// Server order.
    Snapshot,
    Column(SortColumn),
    /// Fresh shuffle on every rebuild.
    Random,
}

impl ViewOrder {
    pub fn label(self) -> &'static str {
        match self {
            Self::Snapshot => "server",
            Self::Column(c) => c.label(),
            Self::Random => "random",
        }
    }
}

/// An artist (or fallback bucket) with the key used to select it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistEntry {
    pub name: String,
    pub key: String,
}

impl ArtistEntry {
    fn new(name: String) -> Self {
        let key = query::encode(&name);
        Self { name, key }
    }
}

/// The string a track is grouped and filtered under: its artist, or the
/// title when the artist is empty, or the filename when both are.
pub fn grouping_key(track: &Track) -> &str {
    if !track.artist.is_empty() {
        &track.artist
    } else if !track.title.is_empty() {
        &track.title
    } else {
        &track.filename
    }
}

pub struct PlaylistIndex {
    tracks: Vec<Track>,
    artists: Vec<ArtistEntry>,
    query: String,
    order: ViewOrder,
    view: Vec<usize>,
    revision: u64,
    rng: StdRng,
}

impl PlaylistIndex {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Use a specific random source for random mode (seeded in tests).
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            artists: Vec::new(),
            query: String::new(),
            order: ViewOrder::Snapshot,
            view: Vec::new(),
            revision: 0,
            rng,
        }
    }

    /// Replace the snapshot.  Returns `false` (and leaves the view alone)
    /// when the new snapshot is identical to the current one.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) -> bool {
        if tracks == self.tracks {
            return false;
        }
        self.tracks = tracks;
        self.artists = derive_artists(&self.tracks);
        self.rebuild();
        true
    }

    /// Replace the artist list with the server's.  Returns `false` if it did
    /// not change.
    pub fn set_artists(&mut self, names: Vec<String>) -> bool {
        let mut names: Vec<String> = names.into_iter().filter(|n| !n.is_empty()).collect();
        sort_names(&mut names);
        if names.iter().eq(self.artists.iter().map(|a| &a.name)) {
            return false;
        }
        self.artists = names.into_iter().map(ArtistEntry::new).collect();
        true
    }

    /// Case-insensitive substring filter on the grouping key.  An empty
    /// query shows everything.
    pub fn filter_by_artist(&mut self, query: &str) -> Vec<&Track> {
        self.query = query.to_string();
        self.rebuild();
        self.view()
    }

    pub fn sort_by(&mut self, column: SortColumn) {
        self.order = ViewOrder::Column(column);
        self.rebuild();
    }

    pub fn enable_random_mode(&mut self) {
        self.order = ViewOrder::Random;
        self.rebuild();
    }

    pub fn view(&self) -> Vec<&Track> {
        self.view.iter().map(|&i| &self.tracks[i]).collect()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn artists(&self) -> &[ArtistEntry] {
        &self.artists
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn order(&self) -> ViewOrder {
        self.order
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn rebuild(&mut self) {
        let needle = self.query.to_lowercase();
        let mut view: Vec<usize> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| needle.is_empty() || grouping_key(t).to_lowercase().contains(&needle))
            .map(|(i, _)| i)
            .collect();

        // `sort_by` is stable, so equal keys keep snapshot order.
        match self.order {
            ViewOrder::Snapshot => {}
            ViewOrder::Column(SortColumn::Duration) => {
                view.sort_by(|&a, &b| self.tracks[b].duration.cmp(&self.tracks[a].duration));
            }
            ViewOrder::Column(SortColumn::Rating) => {
                view.sort_by(|&a, &b| self.tracks[b].rating.cmp(&self.tracks[a].rating));
            }
            ViewOrder::Column(column) => {
                let keys: Vec<String> = self
                    .tracks
                    .iter()
                    .map(|t| match column {
                        SortColumn::Artist => t.artist.to_lowercase(),
                        SortColumn::Title => t.title.to_lowercase(),
                        _ => t.filename.to_lowercase(),
                    })
                    .collect();
                view.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
            }
            ViewOrder::Random => view.shuffle(&mut self.rng),
        }

        self.view = view;
        self.revision += 1;
    }
}

impl Default for PlaylistIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_names(names: &mut Vec<String>) {
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    names.dedup();
}

fn derive_artists(tracks: &[Track]) -> Vec<ArtistEntry> {
    let mut names: Vec<String> = tracks
        .iter()
        .map(|t| grouping_key(t).to_string())
        .filter(|n| !n.is_empty())
        .collect();
    sort_names(&mut names);
    names.into_iter().map(ArtistEntry::new).collect()
}
