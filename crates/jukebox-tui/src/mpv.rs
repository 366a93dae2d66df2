//! mpv-backed media element.
//!
//! ```text
//!   MpvStream::play()
//!         │
//!         ├── spawn `mpv --no-video <stream url>`
//!         └── watcher task  ← owns the child
//!                ├── child exits on its own → exit status → play future (Err)
//!                └── stop signal            → kill child → play future (Ok)
//! ```
//!
//! The play future stays pending for as long as mpv runs.  It resolves `Ok`
//! when we stopped mpv ourselves and with `PlaybackRejected` whenever mpv
//! exits on its own, whether at start-up (bad URL, no audio device) or later
//! (stream ended, network lost).  A missing binary fails immediately.
//! Volume changes reach a running mpv over its JSON IPC socket on unix;
//! elsewhere they apply at the next start.

use std::process::{ExitStatus, Stdio};

use jukebox_client::error::ClientError;
use jukebox_client::stream::{MediaElement, PlayFuture};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

pub struct MpvStream {
    binary: String,
    source: Option<String>,
    position: f64,
    volume: f32,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl MpvStream {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            source: None,
            position: 0.0,
            volume: 0.5,
            stop_tx: None,
        }
    }

    fn volume_percent(&self) -> i64 {
        (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
    }

    fn spawn_child(&self, url: &str) -> std::io::Result<tokio::process::Child> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("--no-video")
            .arg("--quiet")
            .arg("--idle=no")
            .arg(format!("--volume={}", self.volume_percent()));
        #[cfg(unix)]
        cmd.arg(format!(
            "--input-ipc-server={}",
            jukebox_proto::platform::mpv_socket_path().display()
        ));
        cmd.arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }

    fn stop_child(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
    }
}

impl MediaElement for MpvStream {
    fn set_source(&mut self, url: Option<&str>) {
        self.source = url.map(str::to_string);
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn load(&mut self) {
        // mpv buffers from scratch on every spawn.
        self.stop_child();
        self.position = 0.0;
    }

    fn play(&mut self) -> PlayFuture {
        let Some(url) = self.source.clone() else {
            return Box::pin(async {
                Err::<(), _>(ClientError::PlaybackRejected("no stream source".into()))
            });
        };
        self.stop_child();

        let mut child = match self.spawn_child(&url) {
            Ok(child) => child,
            Err(e) => {
                let reason = format!("could not start {}: {}", self.binary, e);
                return Box::pin(async move { Err::<(), _>(ClientError::PlaybackRejected(reason)) });
            }
        };
        info!("mpv: playing {} (pid {:?})", url, child.id());

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = oneshot::channel::<std::io::Result<ExitStatus>>();
        self.stop_tx = Some(stop_tx);

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    debug!("mpv: exited on its own: {:?}", status);
                    let _ = exit_tx.send(status);
                }
                _ = stop_rx => {
                    if let Err(e) = child.kill().await {
                        warn!("mpv: kill failed: {}", e);
                    }
                }
            }
        });

        Box::pin(async move {
            match exit_rx.await {
                Ok(Ok(status)) => Err(ClientError::PlaybackRejected(format!(
                    "mpv exited ({})",
                    status
                ))),
                Ok(Err(e)) => Err(ClientError::PlaybackRejected(e.to_string())),
                // Sender dropped: the watcher killed mpv on our request.
                Err(_) => Ok(()),
            }
        })
    }

    fn pause(&mut self) {
        self.stop_child();
    }

    fn set_position(&mut self, secs: f64) {
        self.position = secs;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if self.stop_tx.is_some() {
            send_volume(self.volume_percent());
        }
    }
}

impl Drop for MpvStream {
    fn drop(&mut self) {
        self.stop_child();
    }
}

#[cfg(unix)]
fn send_volume(percent: i64) {
    use tokio::io::AsyncWriteExt;

    let socket_path = jukebox_proto::platform::mpv_socket_path();
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    handle.spawn(async move {
        let line = serde_json::json!({ "command": ["set_property", "volume", percent] });
        let mut raw = line.to_string();
        raw.push('\n');
        match tokio::net::UnixStream::connect(&socket_path).await {
            Ok(mut stream) => {
                if let Err(e) = stream.write_all(raw.as_bytes()).await {
                    warn!("mpv: volume write failed: {}", e);
                }
            }
            // mpv may still be creating its socket; the next spawn picks the
            // volume up from the command line.
            Err(e) => debug!("mpv: IPC socket unavailable: {}", e),
        }
    });
}

#[cfg(not(unix))]
fn send_volume(_percent: i64) {}
