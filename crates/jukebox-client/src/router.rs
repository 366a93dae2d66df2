//! ReplyRouter: decodes inbound frames and applies them by opcode.
//!
//! Handlers decode their payload completely before touching any store, so a
//! reply that fails to decode leaves every store as it was.

use std::collections::HashMap;

use jukebox_proto::naming::TrackNaming;
use jukebox_proto::protocol::{NowPlaying, Opcode, ProtocolError, QueueSnapshot, Reply, Track};
use tracing::{debug, warn};

use crate::session::Stores;

/// Applies one successful reply to the stores.
pub type Handler = fn(&TrackNaming, &Reply, &mut Stores) -> Result<(), ProtocolError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Not a reply envelope at all.
    Malformed,
    UnknownOpcode(u32),
    /// Known opcode, payload of the wrong shape.
    BadPayload(Opcode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Applied(Opcode),
    /// `s = false`; the server message went to the notification slot.
    Rejected(Opcode),
    Dropped(DropReason),
}

pub struct ReplyRouter {
    naming: TrackNaming,
    handlers: HashMap<Opcode, Handler>,
}

impl ReplyRouter {
    /// A router with a handler for every opcode in the catalog.
    pub fn new(naming: TrackNaming) -> Self {
        let mut router = Self::empty(naming);
        router.register(Opcode::NowPlaying, apply_now_playing);
        router.register(Opcode::Next, announce_skip);
        router.register(Opcode::Boo, announce_rating);
        router.register(Opcode::Tune, announce_rating);
        router.register(Opcode::Search, apply_search);
        router.register(Opcode::RequestTrack, announce_priority);
        router.register(Opcode::Queue, apply_queue);
        router.register(Opcode::Playlist, apply_playlist);
        router.register(Opcode::Artists, apply_artists);
        router
    }

    pub fn empty(naming: TrackNaming) -> Self {
        Self {
            naming,
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, opcode: Opcode, handler: Handler) -> Option<Handler> {
        self.handlers.insert(opcode, handler)
    }

    pub fn unregister(&mut self, opcode: Opcode) -> Option<Handler> {
        self.handlers.remove(&opcode)
    }

    pub fn naming(&self) -> &TrackNaming {
        &self.naming
    }

    pub fn route(&self, text: &str, stores: &mut Stores) -> RouteOutcome {
        let reply = match Reply::decode(text) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("router: dropping malformed frame: {}", e);
                return RouteOutcome::Dropped(DropReason::Malformed);
            }
        };

        let Some(opcode) = Opcode::from_reply_code(reply.opcode) else {
            warn!("router: dropping reply with unknown opcode {}", reply.opcode);
            return RouteOutcome::Dropped(DropReason::UnknownOpcode(reply.opcode));
        };
        let Some(handler) = self.handlers.get(&opcode) else {
            warn!("router: no handler registered for {}", opcode);
            return RouteOutcome::Dropped(DropReason::UnknownOpcode(reply.opcode));
        };

        if !reply.success {
            let message = reply
                .message
                .clone()
                .unwrap_or_else(|| format!("{} failed", opcode));
            stores.notifications.warning(message);
            if opcode == Opcode::Search {
                stores.search.clear();
            }
            return RouteOutcome::Rejected(opcode);
        }

        match handler(&self.naming, &reply, stores) {
            Ok(()) => {
                debug!("router: applied {}", opcode);
                RouteOutcome::Applied(opcode)
            }
            Err(e) => {
                warn!("router: dropping {} reply: {}", opcode, e);
                RouteOutcome::Dropped(DropReason::BadPayload(opcode))
            }
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

fn apply_now_playing(_: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    if let Some(np) = reply.payload::<NowPlaying>(Opcode::NowPlaying)? {
        stores.now_playing.replace(np);
    }
    Ok(())
}

fn apply_queue(_: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    let entries = reply
        .payload::<QueueSnapshot>(Opcode::Queue)?
        .unwrap_or_default();
    stores.queue.replace(entries);
    Ok(())
}

fn apply_playlist(_: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    let tracks = reply
        .payload::<Vec<Track>>(Opcode::Playlist)?
        .unwrap_or_default();
    stores.playlist.set_playlist(tracks);
    Ok(())
}

fn apply_artists(_: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    let names = reply
        .payload::<Vec<String>>(Opcode::Artists)?
        .unwrap_or_default();
    stores.playlist.set_artists(names);
    Ok(())
}

fn apply_search(naming: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    let filenames = reply
        .payload::<Vec<String>>(Opcode::Search)?
        .unwrap_or_default();
    stores.search.replace(filenames, naming);
    Ok(())
}

fn announce_skip(naming: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    let message = match reply.payload::<NowPlaying>(Opcode::Next)? {
        Some(np) => format!("Skipped to {}", naming.display_name(&np.filename)),
        None => "Skipped to the next track".to_string(),
    };
    stores.notifications.info(message);
    Ok(())
}

fn announce_rating(naming: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    let opcode = Opcode::from_reply_code(reply.opcode).unwrap_or(Opcode::Boo);
    if let Some(np) = reply.payload::<NowPlaying>(opcode)? {
        stores.notifications.info(format!(
            "Rating for {} is now {}",
            naming.display_name(&np.filename),
            np.rating
        ));
    }
    Ok(())
}

fn announce_priority(_: &TrackNaming, reply: &Reply, stores: &mut Stores) -> Result<(), ProtocolError> {
    let message = match reply.payload::<i64>(Opcode::RequestTrack)? {
        Some(priority) => format!("Track queued with priority {}", priority),
        None => "Track queued".to_string(),
    };
    stores.notifications.info(message);
    Ok(())
}
