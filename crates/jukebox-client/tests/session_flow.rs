//! Drives a `Session` against an in-process WebSocket server.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jukebox_client::error::ClientError;
use jukebox_client::notify::Level;
use jukebox_client::stream::{MediaElement, PlayFuture};
use jukebox_client::transport::ConnectionState;
use jukebox_client::{ClientEvent, Session, SessionEvent};
use jukebox_proto::config::Config;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

#[derive(Default)]
struct SilentMedia {
    source: Option<String>,
}

impl MediaElement for SilentMedia {
    fn set_source(&mut self, url: Option<&str>) {
        self.source = url.map(str::to_string);
    }
    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
    fn load(&mut self) {}
    fn play(&mut self) -> PlayFuture {
        Box::pin(async { Ok::<(), ClientError>(()) })
    }
    fn pause(&mut self) {}
    fn set_position(&mut self, _secs: f64) {}
    fn position(&self) -> f64 {
        0.0
    }
    fn set_volume(&mut self, _volume: f32) {}
}

fn answer(request: &Value) -> Option<Value> {
    let opcode = request["o"].as_u64()?;
    let data = match opcode {
        0 => json!({
            "filename": "Band - Song-abcdefghijk.mp3",
            "duration": 200,
            "rating": 6,
            "elapsed": 50,
            "albumArt": "/art/1.jpg",
        }),
        6 => json!({"0": "Next Up-abcdefghijk.mp3"}),
        7 => json!([
            {"filename": "a-abcdefghijk.mp3", "artist": "Band", "title": "A", "duration": 100, "rating": 5},
            {"filename": "b-abcdefghijk.mp3", "artist": "", "title": "Solo", "duration": 90, "rating": 7},
        ]),
        8 => json!(["Band", "Solo"]),
        _ => return None,
    };
    Some(json!({"o": opcode + 100, "s": true, "d": data}))
}

/// Accepts connections forever.  The first `drop_first` connections are
/// closed right after the handshake; the rest answer polls.
async fn serve(listener: TcpListener, mut drop_first: usize) {
    while let Ok((tcp, _)) = listener.accept().await {
        let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
            continue;
        };
        if drop_first > 0 {
            drop_first -= 1;
            let _ = ws.close(None).await;
            continue;
        }
        tokio::spawn(async move {
            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else { continue };
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                if let Some(reply) = answer(&request) {
                    if ws.send(Message::Text(reply.to_string())).await.is_err() {
                        break;
                    }
                }
            }
        });
    }
}

async fn start_server(drop_first: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, drop_first));
    addr
}

fn config_for(addr: SocketAddr) -> Config {
    let mut config = Config::default();
    config.server.url = format!("http://{addr}");
    config.polling.now_playing_ms = 100;
    config.polling.queue_ms = 100;
    config.polling.playlist_ms = 100;
    config.polling.artists_ms = 100;
    config.polling.health_check_ms = 50;
    config
}

/// Pump events into the session until `done` holds or time runs out.
async fn pump_until(
    session: &mut Session<SilentMedia>,
    rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    done: impl Fn(&Session<SilentMedia>) -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done(session) {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(event)) => session.handle_event(event),
            _ => return false,
        }
    }
    true
}

#[tokio::test]
async fn polls_fill_every_store() {
    let addr = start_server(0).await;
    let (mut session, mut rx) = Session::new(&config_for(addr), SilentMedia::default()).unwrap();
    let mut port = session.subscribe();
    session.start();

    let filled = pump_until(&mut session, &mut rx, |s| {
        let stores = s.stores();
        stores.now_playing.get().is_some()
            && !stores.queue.is_empty()
            && stores.playlist.tracks().len() == 2
            && stores.playlist.artists().len() == 2
    })
    .await;
    assert!(filled, "stores were not filled by polling");

    assert!(session.is_connected());
    let stores = session.stores();
    assert_eq!(stores.now_playing.get().unwrap().album_art, "/art/1.jpg");
    assert_eq!(
        stores.queue.display_entries(session.naming()),
        vec![(0, "Next Up")]
    );
    assert_eq!(session.results().len(), 2);

    let mut seen = Vec::new();
    while let Ok(ev) = port.try_recv() {
        seen.push(ev);
    }
    assert!(seen.contains(&SessionEvent::ConnectionChanged(ConnectionState::Connected)));
    assert!(seen.contains(&SessionEvent::PlaylistChanged));

    session.shutdown();
}

#[tokio::test]
async fn health_check_reconnects_after_drop() {
    let addr = start_server(1).await;
    let (mut session, mut rx) = Session::new(&config_for(addr), SilentMedia::default()).unwrap();
    session.start();

    let dropped = pump_until(&mut session, &mut rx, |s| {
        s.stores()
            .notifications
            .current()
            .is_some_and(|n| n.level == Level::Error)
    })
    .await;
    assert!(dropped, "first connection was never reported lost");
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    let recovered = pump_until(&mut session, &mut rx, |s| {
        s.is_connected() && s.stores().now_playing.get().is_some()
    })
    .await;
    assert!(recovered, "health check did not reconnect");
    assert_eq!(
        session.stores().notifications.current().map(|n| n.level),
        Some(Level::Info)
    );

    session.shutdown();
}
