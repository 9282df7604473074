pub mod download;
pub mod ping;
pub mod upload;

use crate::engine::{
    EngineEvent, EngineState, EventSender, MeasurementEngine, RunId, Snapshot, PHASE_DOWNLOAD,
    PHASE_FINISHED, PHASE_PING, PHASE_STARTING, PHASE_UPLOAD,
};
use crate::error::{Error, Result};
use crate::servers::ServerDescriptor;
use crate::settings::{Settings, TelemetryLevel};
use anyhow::Context;
use download::{DownloadProgress, DownloadTest};
use futures::future::join_all;
use ping::{probe_latency, PingProgress, PingTest};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use upload::{UploadProgress, UploadTest};

const RANKING_PROBES: usize = 3;

// Run id in the high bits, state code in the low byte, so a finishing task
// can only move its own run out of Running.
fn pack(run: RunId, state: EngineState) -> u64 {
    (run << 8) | u64::from(state.code())
}

fn unpack_state(packed: u64) -> EngineState {
    EngineState::from_code((packed & 0xff) as u8)
}

fn finish_run(run_state: &AtomicU64, run: RunId) -> bool {
    run_state
        .compare_exchange(
            pack(run, EngineState::Running),
            pack(run, EngineState::Done),
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .is_ok()
}

pub struct HttpEngine {
    settings: Settings,
    telemetry: TelemetryLevel,
    test_points: Vec<ServerDescriptor>,
    selected: Arc<Mutex<Option<ServerDescriptor>>>,
    run_state: Arc<AtomicU64>,
    last_run: RunId,
    run_handle: Option<JoinHandle<()>>,
}

impl HttpEngine {
    pub fn new(settings: Settings) -> Self {
        Self {
            telemetry: settings.telemetry,
            settings,
            test_points: Vec::new(),
            selected: Arc::new(Mutex::new(None)),
            run_state: Arc::new(AtomicU64::new(pack(0, EngineState::Configuring))),
            last_run: 0,
            run_handle: None,
        }
    }

    fn set_state(&self, state: EngineState) {
        self.run_state.store(pack(self.last_run, state), Ordering::SeqCst);
    }

    pub fn selected_server(&self) -> Option<ServerDescriptor> {
        self.selected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl MeasurementEngine for HttpEngine {
    fn set_telemetry(&mut self, level: TelemetryLevel) {
        self.telemetry = level;
    }

    fn load_server_list(&mut self, reference: &str, events: EventSender) {
        let reference = reference.to_string();
        tokio::spawn(async move {
            let list = match fetch_server_list(&reference).await {
                Ok(list) => {
                    info!(count = list.len(), "server list loaded");
                    Some(list)
                }
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            };
            let _ = events.send(EngineEvent::ServerListLoaded(list)).await;
        });
    }

    fn add_test_points(&mut self, servers: Vec<ServerDescriptor>) {
        self.test_points.extend(servers);
    }

    fn select_server(&mut self, events: EventSender) {
        self.set_state(EngineState::SelectingServer);

        let mut servers = self.test_points.clone();
        let selected = Arc::clone(&self.selected);
        let run_state = Arc::clone(&self.run_state);
        let selecting = pack(self.last_run, EngineState::SelectingServer);
        let ready = pack(self.last_run, EngineState::Ready);

        tokio::spawn(async move {
            match reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
            {
                Ok(client) => {
                    let pings = join_all(
                        servers
                            .iter()
                            .map(|s| {
                                let url = s.ping_url();
                                let client = client.clone();
                                async move { probe_latency(&client, &url, RANKING_PROBES).await }
                            }),
                    )
                    .await;
                    for (server, ping) in servers.iter_mut().zip(pings) {
                        debug!(server = %server.name, ping = ?ping, "ranked");
                        server.ping_ms = ping;
                    }
                }
                Err(e) => warn!("cannot build ranking client: {}", e),
            }

            let best = best_server(&servers);
            if let Some(i) = best {
                *selected.lock().unwrap_or_else(|e| e.into_inner()) = Some(servers[i].clone());
            }
            let _ = run_state.compare_exchange(
                selecting,
                ready,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            let _ = events
                .send(EngineEvent::ServersRanked { servers, best })
                .await;
        });
    }

    fn set_selected_server(&mut self, server: &ServerDescriptor) -> Result<()> {
        if self.state().is_running() {
            return Err(Error::RunInProgress);
        }
        *self.selected.lock().unwrap_or_else(|e| e.into_inner()) = Some(server.clone());
        Ok(())
    }

    fn start(&mut self, events: EventSender) -> Result<RunId> {
        if self.state().is_running() {
            return Err(Error::AlreadyRunning);
        }

        self.last_run += 1;
        let run = self.last_run;
        let server = self
            .selected_server()
            .unwrap_or_else(ServerDescriptor::cloudflare);
        info!(run, server = %server.name, "starting measurement");

        self.set_state(EngineState::Running);
        let settings = self.settings.clone();
        let telemetry = self.telemetry;
        let run_state = Arc::clone(&self.run_state);

        self.run_handle = Some(tokio::spawn(async move {
            let aborted = match measure(run, &server, &settings, &events).await {
                Ok(snapshot) => {
                    if telemetry != TelemetryLevel::Disabled {
                        report_telemetry(&settings, telemetry, &server, &snapshot).await;
                    }
                    false
                }
                Err(e) => {
                    warn!(run, "measurement failed: {:#}", e);
                    true
                }
            };
            if !finish_run(&run_state, run) {
                debug!(run, "run already left the running state");
            }
            let _ = events.send(EngineEvent::End { run, aborted }).await;
        }));

        Ok(run)
    }

    fn abort(&mut self) {
        if !self.state().is_running() {
            return;
        }
        if let Some(handle) = self.run_handle.take() {
            handle.abort();
        }
        self.set_state(EngineState::Done);
    }

    fn state(&self) -> EngineState {
        unpack_state(self.run_state.load(Ordering::SeqCst))
    }
}

pub fn best_server(servers: &[ServerDescriptor]) -> Option<usize> {
    servers
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.ping_ms.map(|p| (i, p)))
        .fold(None, |best: Option<(usize, f64)>, (i, p)| match best {
            Some((_, b)) if b <= p => best,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i)
}

async fn fetch_server_list(reference: &str) -> Result<Vec<ServerDescriptor>> {
    read_server_list(reference)
        .await
        .map_err(|e| Error::ServerList(format!("{}: {:#}", reference, e)))
}

async fn read_server_list(reference: &str) -> anyhow::Result<Vec<ServerDescriptor>> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        let list = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?
            .get(reference)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ServerDescriptor>>()
            .await?;
        Ok(list)
    } else {
        let data = tokio::fs::read_to_string(reference)
            .await
            .with_context(|| format!("reading {}", reference))?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Accepts Cloudflare's `cdn-cgi/trace` lines, LibreSpeed's JSON
/// `processedString`, or a bare address.
pub fn parse_client_ip(body: &str) -> String {
    if let Some(ip) = body.lines().find_map(|line| line.strip_prefix("ip=")) {
        return ip.trim().to_string();
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(processed) = value.get("processedString").and_then(|v| v.as_str()) {
            return processed
                .split(" - ")
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
        }
    }
    body.lines().next().unwrap_or_default().trim().to_string()
}

async fn fetch_client_ip(url: &str) -> anyhow::Result<String> {
    let body = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(parse_client_ip(&body))
}

async fn emit(events: &EventSender, run: RunId, snapshot: &Snapshot) {
    let _ = events
        .send(EngineEvent::Update {
            run,
            snapshot: snapshot.clone(),
        })
        .await;
}

async fn measure(
    run: RunId,
    server: &ServerDescriptor,
    settings: &Settings,
    events: &EventSender,
) -> anyhow::Result<Snapshot> {
    let mut snapshot = Snapshot {
        phase_code: PHASE_STARTING,
        ..Snapshot::default()
    };
    emit(events, run, &snapshot).await;

    match fetch_client_ip(&server.ip_url()).await {
        Ok(ip) => snapshot.client_ip = ip,
        Err(e) => debug!("ip lookup failed: {:#}", e),
    }

    // Ping test
    snapshot.phase_code = PHASE_PING;
    emit(events, run, &snapshot).await;
    let (ping_tx, mut ping_rx) = mpsc::channel::<PingProgress>(32);
    let mut ping_test = PingTest::new(server.ping_url(), settings.ping_count);
    let forward = async {
        while let Some(progress) = ping_rx.recv().await {
            snapshot.ping_ms = progress.avg_ms;
            snapshot.jitter_ms = progress.jitter_ms;
            emit(events, run, &snapshot).await;
        }
    };
    let (ping_result, _) = tokio::join!(ping_test.run(ping_tx), forward);
    let ping_result = ping_result?;
    snapshot.ping_ms = ping_result.avg_ms;
    snapshot.jitter_ms = ping_result.jitter_ms;

    // Download test
    snapshot.phase_code = PHASE_DOWNLOAD;
    emit(events, run, &snapshot).await;
    let (download_tx, mut download_rx) = mpsc::channel::<DownloadProgress>(32);
    let mut download_test = DownloadTest::new(
        server.download_url(settings.download_size_bytes()),
        settings.download_size_bytes(),
    );
    let forward = async {
        while let Some(progress) = download_rx.recv().await {
            snapshot.download_mbps = progress.speed_mbps;
            emit(events, run, &snapshot).await;
        }
    };
    let (download_result, _) = tokio::join!(download_test.run(download_tx), forward);
    snapshot.download_mbps = download_result?.avg_speed_mbps;

    // Upload test
    snapshot.phase_code = PHASE_UPLOAD;
    emit(events, run, &snapshot).await;
    let (upload_tx, mut upload_rx) = mpsc::channel::<UploadProgress>(32);
    let mut upload_test = UploadTest::new(server.upload_url(), settings.upload_size_bytes());
    let forward = async {
        while let Some(progress) = upload_rx.recv().await {
            snapshot.upload_mbps = progress.speed_mbps;
            emit(events, run, &snapshot).await;
        }
    };
    let (upload_result, _) = tokio::join!(upload_test.run(upload_tx), forward);
    snapshot.upload_mbps = upload_result?.avg_speed_mbps;

    snapshot.phase_code = PHASE_FINISHED;
    emit(events, run, &snapshot).await;
    info!(
        run,
        download = snapshot.download_mbps,
        upload = snapshot.upload_mbps,
        ping = snapshot.ping_ms,
        jitter = snapshot.jitter_ms,
        "measurement complete"
    );
    Ok(snapshot)
}

async fn report_telemetry(
    settings: &Settings,
    level: TelemetryLevel,
    server: &ServerDescriptor,
    snapshot: &Snapshot,
) {
    let Some(url) = settings.telemetry_url.as_deref() else {
        debug!("telemetry enabled but no telemetry_url configured");
        return;
    };

    let mut body = serde_json::json!({
        "dl": snapshot.download_mbps,
        "ul": snapshot.upload_mbps,
        "ping": snapshot.ping_ms,
        "jitter": snapshot.jitter_ms,
    });
    if level == TelemetryLevel::Full {
        body["ip"] = serde_json::Value::from(snapshot.client_ip.clone());
        body["server"] = serde_json::Value::from(server.name.clone());
    }

    let result = reqwest::Client::new().post(url).json(&body).send().await;
    match result.and_then(|r| r.error_for_status()) {
        Ok(_) => debug!("telemetry sent"),
        Err(e) => warn!("telemetry failed: {}", e),
    }
}
