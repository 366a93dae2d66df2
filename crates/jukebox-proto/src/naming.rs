//! Filename conventions of the jukebox catalog.
//!
//! Stored filenames carry a fixed-width identifier, e.g.
//! `Artist - Title-dQw4w9WgXcQ.mp3`.  Listings show the name with the
//! trailing identifier block removed; track requests send the identifier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackNaming {
    /// Characters removed from the end of a filename for display.
    #[serde(default = "default_display_suffix_len")]
    pub display_suffix_len: usize,
    /// Width of the identifier sitting right before the extension.
    #[serde(default = "default_id_len")]
    pub id_len: usize,
}

fn default_display_suffix_len() -> usize {
    16
}

fn default_id_len() -> usize {
    11
}

impl Default for TrackNaming {
    fn default() -> Self {
        Self {
            display_suffix_len: default_display_suffix_len(),
            id_len: default_id_len(),
        }
    }
}

impl TrackNaming {
    /// Filename without its identifier suffix.  Names too short to carry a
    /// suffix are returned unchanged.
    pub fn display_name<'a>(&self, filename: &'a str) -> &'a str {
        if self.display_suffix_len == 0 {
            return filename;
        }
        match filename.char_indices().rev().nth(self.display_suffix_len - 1) {
            Some((idx, _)) if idx > 0 => &filename[..idx],
            _ => filename,
        }
    }

    /// The fixed-width identifier immediately before the extension.
    pub fn identifier<'a>(&self, filename: &'a str) -> Option<&'a str> {
        if self.id_len == 0 {
            return None;
        }
        let stem = match filename.rfind('.') {
            Some(dot) => &filename[..dot],
            None => filename,
        };
        stem.char_indices()
            .rev()
            .nth(self.id_len - 1)
            .map(|(idx, _)| &stem[idx..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let naming = TrackNaming::default();
        let fname = "Daft Punk - Around the World-dQw4w9WgXcQ.mp3";
        assert_eq!(naming.display_name(fname), "Daft Punk - Around the World");
        assert_eq!(naming.identifier(fname), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_trailing_suffix_layout() {
        let naming = TrackNaming {
            display_suffix_len: 7,
            id_len: 7,
        };
        assert_eq!(
            naming.display_name("ArtistName - SongTitle.mp3AB12345"),
            "ArtistName - SongTitle.mp3"
        );
    }

    #[test]
    fn test_short_names_survive() {
        let naming = TrackNaming::default();
        assert_eq!(naming.display_name("short.mp3"), "short.mp3");
        assert_eq!(naming.identifier("a.mp3"), None);
    }

    #[test]
    fn test_multibyte_names() {
        let naming = TrackNaming {
            display_suffix_len: 4,
            id_len: 3,
        };
        assert_eq!(naming.display_name("Björk-äöü.ogg"), "Björk-äöü");
        assert_eq!(naming.identifier("Björk-äöü.ogg"), Some("äöü"));
    }
}
