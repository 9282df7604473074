use crate::engine::{EventSender, MeasurementEngine, RunId, Snapshot};
use crate::render::{init_ui, paint};
use crate::screen::{ABORT_LABEL, START_LABEL};
use crate::state::{FrameTime, Phase, UiState};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct TestController {
    active_run: Option<RunId>,
}

impl TestController {
    pub fn active_run(&self) -> Option<RunId> {
        self.active_run
    }

    pub fn start_stop<E: MeasurementEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        ui: &mut UiState,
        events: &EventSender,
        time: FrameTime,
    ) {
        if engine.state().is_running() {
            engine.abort();
            info!(run = ?self.active_run, "test aborted");
            self.active_run = None;
            ui.snapshot = None;
            reset_controls(ui, time);
            return;
        }

        ui.screen.button.label = ABORT_LABEL.to_string();
        ui.screen.button.running = true;

        match engine.start(events.clone()) {
            Ok(run) => {
                info!(run, "test started");
                self.active_run = Some(run);
                ui.snapshot = None;
            }
            Err(e) => {
                warn!("engine refused to start: {}", e);
                ui.screen.button.label = START_LABEL.to_string();
                ui.screen.button.running = false;
            }
        }
    }

    /// Stores the snapshot and derives the phase. Returns false for events of
    /// a run this controller no longer tracks.
    pub fn on_update(&mut self, run: RunId, snapshot: Snapshot, ui: &mut UiState) -> bool {
        if self.active_run != Some(run) {
            debug!(run, "dropping update from stale run");
            return false;
        }
        ui.phase = Phase::from_code(snapshot.phase_code, ui.phase);
        ui.snapshot = Some(snapshot);
        true
    }

    pub fn on_end<E: MeasurementEngine + ?Sized>(
        &mut self,
        run: RunId,
        aborted: bool,
        engine: &E,
        ui: &mut UiState,
        time: FrameTime,
    ) -> bool {
        if self.active_run != Some(run) {
            debug!(run, "dropping end from stale run");
            return false;
        }
        info!(run, aborted, "test finished");
        self.active_run = None;
        reset_controls(ui, time);
        paint(ui, engine.state(), true, time);
        true
    }
}

fn reset_controls(ui: &mut UiState, time: FrameTime) {
    ui.screen.button.label = START_LABEL.to_string();
    ui.screen.button.running = false;
    ui.phase = Phase::Idle;
    ui.screen.meter.fade_out(time.now);
    ui.chart.update(0.0, &ui.screen.meter, ui.screen.dark);
    init_ui(ui);
}
