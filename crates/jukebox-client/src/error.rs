use jukebox_proto::protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected")]
    NotConnected,
    #[error("invalid server url {url}: {reason}")]
    Endpoint { url: String, reason: String },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),
}
