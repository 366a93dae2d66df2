//! Events flowing into and out of a [`Session`](crate::Session).

use jukebox_proto::protocol::Opcode;

use crate::error::ClientError;
use crate::playlist::SortColumn;
use crate::stream::StreamState;
use crate::transport::ConnectionState;

/// Inputs posted by background tasks.  The session owner drains them in
/// arrival order.
#[derive(Debug)]
pub enum ClientEvent {
    Transport(TransportEvent),
    /// A polling timer fired for this request opcode.
    Poll(Opcode),
    /// Reconnect check.
    HealthCheck,
    /// An asynchronous play request was rejected by the media element.
    PlayFailed { attempt: u64, error: ClientError },
}

/// Socket lifecycle, tagged with the connection generation that produced it.
#[derive(Debug)]
pub enum TransportEvent {
    Opened { generation: u64 },
    Frame { generation: u64, text: String },
    Closed { generation: u64, reason: String },
}

/// Event port: published after the session state changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConnectionChanged(ConnectionState),
    NowPlayingChanged,
    QueueChanged,
    PlaylistChanged,
    ArtistsChanged,
    SearchChanged,
    PageChanged,
    StreamChanged(StreamState),
    VolumeChanged(f32),
    NotificationChanged,
}

/// User intents handed to [`Session::dispatch`](crate::Session::dispatch).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Server round trips ───────────────────────────────────────────────────
    Next,
    Boo,
    Tune,
    Search(String),
    ClearSearch,
    /// Queue a track by its fixed-width identifier.
    RequestTrack(String),

    // ── Catalog view ─────────────────────────────────────────────────────────
    FilterArtists(String),
    /// Select an artist by its query-encoded key.
    SelectArtist(String),
    SortBy(SortColumn),
    RandomMode,

    // ── Paging ───────────────────────────────────────────────────────────────
    FirstPage,
    PreviousPage,
    NextPage,
    LastPage,
    GotoPage(usize),
    /// Available display height changed.
    Viewport { height: u16 },

    // ── Stream ───────────────────────────────────────────────────────────────
    ToggleStream,
    Volume(f32),
    VolumePercent(u8),
    VolumeUp,
    VolumeDown,

    DismissNotification,
}
