//! StreamToggle: play/pause for the live stream.
//!
//! Starting points the media element at the stream and issues an
//! asynchronous play whose future the caller must drive; stopping pauses,
//! rewinds and clears the source so the next start re-joins the broadcast
//! live instead of resuming a stale buffer.  Volume is independent of the
//! play state and survives any number of toggles.

use futures_util::future::BoxFuture;

use crate::error::ClientError;

pub type PlayFuture = BoxFuture<'static, Result<(), ClientError>>;

/// The platform audio element the toggle drives.
pub trait MediaElement: Send {
    fn set_source(&mut self, url: Option<&str>);
    fn source(&self) -> Option<&str>;
    fn load(&mut self);
    /// Begin playback.  The returned future may stay pending while playback
    /// runs; it yields an error if playback is rejected or lost later.
    fn play(&mut self) -> PlayFuture;
    fn pause(&mut self);
    fn set_position(&mut self, secs: f64);
    fn position(&self) -> f64;
    fn set_volume(&mut self, volume: f32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Stopped,
    Playing,
}

/// A play request in flight.  `attempt` identifies it when its rejection
/// comes back.
pub struct PlayAttempt {
    pub attempt: u64,
    pub future: PlayFuture,
}

pub struct StreamToggle<M> {
    media: M,
    stream_url: String,
    state: StreamState,
    volume: f32,
    attempt: u64,
}

impl<M: MediaElement> StreamToggle<M> {
    pub fn new(mut media: M, stream_url: impl Into<String>, volume: f32) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        media.set_volume(volume);
        Self {
            media,
            stream_url: stream_url.into(),
            state: StreamState::Stopped,
            volume,
            attempt: 0,
        }
    }

    /// Flip the play state.  Returns the play request to drive when the
    /// toggle started playback.
    pub fn toggle(&mut self) -> Option<PlayAttempt> {
        match self.state {
            StreamState::Stopped => Some(self.start()),
            StreamState::Playing => {
                self.stop();
                None
            }
        }
    }

    fn start(&mut self) -> PlayAttempt {
        self.media.set_source(Some(&self.stream_url));
        self.media.set_volume(self.volume);
        self.media.load();
        self.attempt += 1;
        self.state = StreamState::Playing;
        PlayAttempt {
            attempt: self.attempt,
            future: self.media.play(),
        }
    }

    pub fn stop(&mut self) {
        self.media.pause();
        self.media.set_position(0.0);
        self.media.set_source(None);
        self.state = StreamState::Stopped;
    }

    /// A play request was rejected.  If it is the current attempt the toggle
    /// falls back to Stopped, so the next toggle retries.  Returns whether
    /// the state changed.
    pub fn on_play_failed(&mut self, attempt: u64) -> bool {
        if attempt != self.attempt || self.state != StreamState::Playing {
            return false;
        }
        self.stop();
        true
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = volume.clamp(0.0, 1.0);
        self.media.set_volume(self.volume);
        self.volume
    }

    pub fn step_volume(&mut self, delta: f32) -> f32 {
        self.set_volume(self.volume + delta)
    }

    /// Volume from a 0–100 scale input.
    pub fn set_volume_percent(&mut self, percent: u8) -> f32 {
        self.set_volume(f32::from(percent.min(100)) / 100.0)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == StreamState::Playing
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn media(&self) -> &M {
        &self.media
    }
}
