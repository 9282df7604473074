use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::Event;
use directories::ProjectDirs;
use ratatui::DefaultTerminal;
use speedgauge::app::{poll_event, App};
use speedgauge::engine::EngineEvent;
use speedgauge::settings::{load_settings, save_settings, ServerSource, Settings, TelemetryLevel};
use speedgauge::speedtest::HttpEngine;
use speedgauge::state::FrameTime;
use speedgauge::storage::FileStore;
use speedgauge::theme::os_prefers_dark;
use speedgauge::ui::{draw_ui, gauge_fits};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Terminal speed test with a live throughput gauge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config.json (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server list reference: a file path or http(s) URL
    #[arg(long)]
    servers: Option<String>,

    /// Directory for persisted state and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the telemetry level from the config
    #[arg(long, value_enum)]
    telemetry: Option<TelemetryLevel>,
}

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let dirs = ProjectDirs::from("", "", "speedgauge");
    let data_dir = args
        .data_dir
        .clone()
        .or_else(|| dirs.as_ref().map(|d| d.data_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    init_logging(&data_dir)?;

    let config_path = args
        .config
        .clone()
        .or_else(|| dirs.as_ref().map(|d| d.config_dir().join("config.json")))
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let mut settings = load_or_create_settings(&config_path);
    if let Some(servers) = args.servers {
        settings.servers = ServerSource::Reference(servers);
    }
    if let Some(level) = args.telemetry {
        settings.telemetry = level;
    }

    let mut terminal = ratatui::init();
    terminal.clear()?;

    let result = run_app(&mut terminal, settings, &data_dir).await;

    ratatui::restore();
    if let Err(e) = &result {
        error!("exiting with error: {:#}", e);
    }
    result
}

fn init_logging(data_dir: &Path) -> Result<()> {
    let log_path = data_dir.join("speedgauge.log");
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_or_create_settings(path: &Path) -> Settings {
    match load_settings(path) {
        Ok(settings) => {
            if !path.exists() {
                if let Err(e) = save_settings(path, &settings) {
                    warn!("could not write default config to {}: {}", path.display(), e);
                }
            }
            settings
        }
        Err(e) => {
            warn!("{}, using defaults", e);
            Settings::default()
        }
    }
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    settings: Settings,
    data_dir: &Path,
) -> Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel::<EngineEvent>(256);
    let store = FileStore::open(data_dir.join("state.json"));
    let engine = HttpEngine::new(settings.clone());

    let mut app = App::new(engine, settings, Box::new(store), os_prefers_dark(), events_tx);
    info!("starting up");
    app.init_servers();

    loop {
        let size = terminal.size()?;
        app.ui.screen.meter.canvas = gauge_fits(size.width, size.height);

        let time = FrameTime::now();
        terminal.draw(|frame| draw_ui(frame, &app, time.now))?;

        // Engine updates; each one repaints as it arrives
        while let Ok(event) = events_rx.try_recv() {
            app.handle_engine_event(event, FrameTime::now());
        }

        app.tick(FrameTime::now());

        // Handle input
        if let Some(Event::Key(key)) = poll_event(FRAME_INTERVAL)? {
            if let Some(action) = app.handle_key_event(key) {
                app.dispatch(action, FrameTime::now());
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
