use crate::engine::{EngineEvent, EngineState, EventSender, MeasurementEngine, RunId};
use crate::error::{Error, Result};
use crate::servers::ServerDescriptor;
use crate::settings::TelemetryLevel;
use tokio::sync::mpsc;

pub fn event_channel() -> (EventSender, mpsc::Receiver<EngineEvent>) {
    mpsc::channel(64)
}

/// Records every call and reports whatever run-state the test sets.
#[derive(Debug)]
pub struct ScriptedEngine {
    pub state: EngineState,
    pub telemetry: Option<TelemetryLevel>,
    pub loaded_references: Vec<String>,
    pub test_points: Vec<ServerDescriptor>,
    pub selected: Option<ServerDescriptor>,
    pub select_requests: usize,
    pub starts: usize,
    pub aborts: usize,
    pub last_run: RunId,
    pub refuse_start: bool,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self {
            state: EngineState::Configuring,
            telemetry: None,
            loaded_references: Vec::new(),
            test_points: Vec::new(),
            selected: None,
            select_requests: 0,
            starts: 0,
            aborts: 0,
            last_run: 0,
            refuse_start: false,
        }
    }
}

impl ScriptedEngine {
    pub fn finish(&mut self) {
        self.state = EngineState::Done;
    }
}

impl MeasurementEngine for ScriptedEngine {
    fn set_telemetry(&mut self, level: TelemetryLevel) {
        self.telemetry = Some(level);
    }

    fn load_server_list(&mut self, reference: &str, _events: EventSender) {
        self.loaded_references.push(reference.to_string());
    }

    fn add_test_points(&mut self, servers: Vec<ServerDescriptor>) {
        self.test_points.extend(servers);
    }

    fn select_server(&mut self, _events: EventSender) {
        self.state = EngineState::SelectingServer;
        self.select_requests += 1;
    }

    fn set_selected_server(&mut self, server: &ServerDescriptor) -> Result<()> {
        if self.state.is_running() {
            return Err(Error::RunInProgress);
        }
        self.selected = Some(server.clone());
        Ok(())
    }

    fn start(&mut self, _events: EventSender) -> Result<RunId> {
        if self.state.is_running() || self.refuse_start {
            return Err(Error::AlreadyRunning);
        }
        self.state = EngineState::Running;
        self.starts += 1;
        self.last_run += 1;
        Ok(self.last_run)
    }

    fn abort(&mut self) {
        if self.state.is_running() {
            self.state = EngineState::Done;
        }
        self.aborts += 1;
    }

    fn state(&self) -> EngineState {
        self.state
    }
}
