//! Capability interface to the measurement engine. Results come back as
//! [`EngineEvent`]s on a channel.

use crate::error::Result;
use crate::servers::ServerDescriptor;
use crate::settings::TelemetryLevel;
use tokio::sync::mpsc;

pub const PHASE_NOT_STARTED: i8 = -1;
pub const PHASE_STARTING: i8 = 0;
pub const PHASE_DOWNLOAD: i8 = 1;
pub const PHASE_PING: i8 = 2;
pub const PHASE_UPLOAD: i8 = 3;
pub const PHASE_FINISHED: i8 = 4;
pub const PHASE_ABORTED: i8 = 5;

/// Run-state as reported by the engine. Only [`EngineState::Running`] means a
/// measurement is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Configuring = 0,
    SelectingServer = 1,
    Ready = 2,
    Running = 3,
    Done = 4,
}

impl EngineState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => EngineState::SelectingServer,
            2 => EngineState::Ready,
            3 => EngineState::Running,
            4 => EngineState::Done,
            _ => EngineState::Configuring,
        }
    }

    pub fn is_running(self) -> bool {
        self == EngineState::Running
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub client_ip: String,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub jitter_ms: f64,
    pub phase_code: i8,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            client_ip: String::new(),
            download_mbps: 0.0,
            upload_mbps: 0.0,
            ping_ms: 0.0,
            jitter_ms: 0.0,
            phase_code: PHASE_NOT_STARTED,
        }
    }
}

pub type RunId = u64;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    ServerListLoaded(Option<Vec<ServerDescriptor>>),
    ServersRanked {
        servers: Vec<ServerDescriptor>,
        best: Option<usize>,
    },
    Update { run: RunId, snapshot: Snapshot },
    End { run: RunId, aborted: bool },
}

pub type EventSender = mpsc::Sender<EngineEvent>;

pub trait MeasurementEngine {
    fn set_telemetry(&mut self, level: TelemetryLevel);

    /// Resolves `reference` (file path or http(s) URL) into a server list and
    /// answers with [`EngineEvent::ServerListLoaded`]. `None` means the load failed.
    fn load_server_list(&mut self, reference: &str, events: EventSender);

    fn add_test_points(&mut self, servers: Vec<ServerDescriptor>);

    /// Probes every test point and answers with [`EngineEvent::ServersRanked`].
    fn select_server(&mut self, events: EventSender);

    fn set_selected_server(&mut self, server: &ServerDescriptor) -> Result<()>;

    fn start(&mut self, events: EventSender) -> Result<RunId>;

    fn abort(&mut self);

    fn state(&self) -> EngineState;
}
