use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Reply opcodes are the request opcode shifted by this offset.
pub const REPLY_OFFSET: u32 = 100;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected payload for {opcode}: {source}")]
    Payload {
        opcode: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("undecodable query string: {0}")]
    Query(String),
}

/// Semantic kind of a request or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    NowPlaying,
    Next,
    Boo,
    Tune,
    Search,
    RequestTrack,
    Queue,
    Playlist,
    Artists,
}

impl Opcode {
    pub const ALL: [Opcode; 9] = [
        Opcode::NowPlaying,
        Opcode::Next,
        Opcode::Boo,
        Opcode::Tune,
        Opcode::Search,
        Opcode::RequestTrack,
        Opcode::Queue,
        Opcode::Playlist,
        Opcode::Artists,
    ];

    pub fn code(self) -> u32 {
        match self {
            Opcode::NowPlaying => 0,
            Opcode::Next => 1,
            Opcode::Boo => 2,
            Opcode::Tune => 3,
            Opcode::Search => 4,
            Opcode::RequestTrack => 5,
            Opcode::Queue => 6,
            Opcode::Playlist => 7,
            Opcode::Artists => 8,
        }
    }

    pub fn reply_code(self) -> u32 {
        self.code() + REPLY_OFFSET
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Resolve the opcode of an inbound frame.  Servers answer with
    /// `request + 100`; the bare request code is accepted as well.
    pub fn from_reply_code(code: u32) -> Option<Self> {
        if code >= REPLY_OFFSET {
            Self::from_code(code - REPLY_OFFSET)
        } else {
            Self::from_code(code)
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Opcode::NowPlaying => "now-playing",
            Opcode::Next => "next",
            Opcode::Boo => "boo",
            Opcode::Tune => "tune",
            Opcode::Search => "search",
            Opcode::RequestTrack => "request-track",
            Opcode::Queue => "queue",
            Opcode::Playlist => "playlist",
            Opcode::Artists => "artists",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Envelopes ─────────────────────────────────────────────────────────────────

/// Outgoing request envelope: `{ i, o, d? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "i")]
    pub id: u64,
    #[serde(rename = "o")]
    pub opcode: u32,
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Request {
    pub fn new(id: u64, opcode: Opcode, payload: Option<String>) -> Self {
        Self {
            id,
            opcode: opcode.code(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Inbound reply envelope: `{ o, s, d?, m? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "o")]
    pub opcode: u32,
    #[serde(rename = "s")]
    pub success: bool,
    /// `None` for both an absent field and JSON `null`.
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn ok(opcode: Opcode, data: Option<Value>) -> Self {
        Self {
            opcode: opcode.reply_code(),
            success: true,
            data,
            message: None,
        }
    }

    pub fn failed(opcode: Opcode, message: impl Into<String>) -> Self {
        Self {
            opcode: opcode.reply_code(),
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Deserialize the payload as `T`.  An absent or null payload is a valid
    /// empty result and yields `Ok(None)`.
    pub fn payload<T: DeserializeOwned>(&self, opcode: Opcode) -> Result<Option<T>, ProtocolError> {
        match &self.data {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|source| ProtocolError::Payload {
                    opcode: opcode.label(),
                    source,
                }),
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Snapshot of the track currently streaming.  Also the shape of the
/// next/boo/tune replies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NowPlaying {
    pub filename: String,
    pub duration: u64,
    pub rating: u8,
    pub elapsed: u64,
    pub album_art: String,
}

/// One catalog entry.  `filename` is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    pub filename: String,
    pub artist: String,
    pub title: String,
    pub duration: u64,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

/// Queue reply: position → filename, ordered by position.
pub type QueueSnapshot = BTreeMap<u32, String>;
