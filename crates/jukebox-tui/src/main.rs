mod app;
mod mpv;
mod theme;
mod ui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use jukebox_client::Session;
use jukebox_proto::config::Config;

/// Terminal client for a shared jukebox server.
#[derive(Debug, Parser)]
#[command(name = "jukebox", version, about)]
struct Cli {
    /// Server base URL, e.g. https://radio.example.org (overrides config).
    #[arg(long)]
    url: Option<String>,

    /// Alternate config file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = jukebox_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("jukebox.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; socket-level DEBUG from tungstenite is noise.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,tungstenite=warn,tokio_tungstenite=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("jukebox log: {}", log_path.display());
    tracing::info!("jukebox starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("config unreadable, using defaults: {}", e);
            Config::default()
        }),
    };
    if let Some(url) = cli.url {
        config.server.url = url;
    }
    tracing::info!("server: {}", config.server.url);

    // ── Runtime ──────────────────────────────────────────────────────────────
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let media = mpv::MpvStream::new(config.player.mpv_binary.clone());
        let (session, client_rx) = Session::new(&config, media)?;
        app::App::new(session).run(client_rx).await
    })
}
