use crate::chart::ChartAdapter;
use crate::engine::{
    Snapshot, PHASE_ABORTED, PHASE_DOWNLOAD, PHASE_FINISHED, PHASE_NOT_STARTED, PHASE_PING,
    PHASE_UPLOAD,
};
use crate::screen::Screen;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Download,
    Upload,
    Ping,
}

impl Phase {
    /// Maps an engine phase code onto the UI phase. Codes without a UI
    /// meaning (starting, unknown) keep whatever phase was active.
    pub fn from_code(code: i8, previous: Phase) -> Phase {
        match code {
            PHASE_DOWNLOAD => Phase::Download,
            PHASE_UPLOAD => Phase::Upload,
            PHASE_PING => Phase::Ping,
            PHASE_NOT_STARTED | PHASE_FINISHED | PHASE_ABORTED => Phase::Idle,
            _ => previous,
        }
    }
}

#[derive(Default)]
pub struct UiState {
    pub screen: Screen,
    pub snapshot: Option<Snapshot>,
    pub phase: Phase,
    pub chart: ChartAdapter,
}

/// Timestamps for one repaint: a monotonic instant for fades and wall-clock
/// milliseconds for the gauge oscillation.
#[derive(Debug, Clone, Copy)]
pub struct FrameTime {
    pub now: Instant,
    pub wall_ms: u128,
}

impl FrameTime {
    pub fn now() -> Self {
        Self {
            now: Instant::now(),
            wall_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
        }
    }

    pub fn at(now: Instant, wall_ms: u128) -> Self {
        Self { now, wall_ms }
    }
}
