use crate::engine::EngineState;
use crate::state::{FrameTime, Phase, UiState};

pub fn format_value(value: f64) -> String {
    if value < 10.0 {
        format!("{:.2}", value)
    } else if value < 100.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.0}", value)
    }
}

/// Cosmetic ±2% wobble applied to the gauge, period ≈ 628 ms.
pub fn oscillate(wall_ms: u128) -> f64 {
    1.0 + 0.02 * (wall_ms as f64 / 100.0).sin()
}

pub fn mbps_to_amount(mbps: f64) -> f64 {
    1.0 - 1.0 / 1.3f64.powf(mbps.max(0.0).sqrt())
}

pub fn ms_to_amount(ms: f64) -> f64 {
    1.0 - 1.0 / 1.08f64.powf(ms.max(0.0).sqrt())
}

pub fn init_ui(ui: &mut UiState) {
    let screen = &mut ui.screen;
    if !ui.chart.is_initialized() {
        ui.chart.init(&screen.meter, screen.dark);
    }
    ui.chart.update(0.0, &screen.meter, screen.dark);

    screen.current_label = "READY".to_string();
    screen.current_value = "0.00".to_string();
    screen.current_unit = "Mbps".to_string();

    screen.dl_value = "0.00".to_string();
    screen.ul_value = "0.00".to_string();
    screen.ping_value = "0.00".to_string();
    screen.jit_value = "0.00".to_string();
    screen.ip.clear();
}

pub fn paint(ui: &mut UiState, engine_state: EngineState, forced: bool, time: FrameTime) {
    if !forced && !engine_state.is_running() {
        return;
    }
    let snapshot = match &ui.snapshot {
        Some(snapshot) => snapshot.clone(),
        None => return,
    };

    let screen = &mut ui.screen;
    screen.ip = snapshot.client_ip.clone();
    screen.dl_value = format_value(snapshot.download_mbps);
    screen.ul_value = format_value(snapshot.upload_mbps);
    screen.ping_value = format_value(snapshot.ping_ms);
    screen.jit_value = format_value(snapshot.jitter_ms);

    match ui.phase {
        Phase::Download | Phase::Upload => {
            let (label, throughput) = if ui.phase == Phase::Download {
                ("DOWNLOAD", snapshot.download_mbps)
            } else {
                ("UPLOAD", snapshot.upload_mbps)
            };

            if screen.meter.is_hidden() {
                if !ui.chart.is_initialized() {
                    ui.chart.init(&screen.meter, screen.dark);
                }
                screen.meter.fade_in(time.now);
            }
            screen.current_label = label.to_string();
            screen.current_value = format_value(throughput);
            screen.current_unit = "Mbps".to_string();
            ui.chart.update(
                throughput * oscillate(time.wall_ms),
                &screen.meter,
                screen.dark,
            );
        }
        Phase::Ping => {
            screen.meter.fade_out(time.now);
            screen.current_label = "PING".to_string();
            screen.current_value = format_value(snapshot.ping_ms);
            screen.current_unit = "ms".to_string();
        }
        Phase::Idle => {
            screen.meter.fade_out(time.now);
            screen.current_label = "READY".to_string();
            screen.current_value = "0.00".to_string();
            screen.current_unit = "Mbps".to_string();
        }
    }
}

pub fn animate(ui: &mut UiState, engine_state: EngineState, time: FrameTime) {
    ui.screen.meter.settle(time.now);

    if !engine_state.is_running() {
        return;
    }
    let throughput = match (&ui.snapshot, ui.phase) {
        (Some(snapshot), Phase::Download) => snapshot.download_mbps,
        (Some(snapshot), Phase::Upload) => snapshot.upload_mbps,
        _ => return,
    };
    ui.chart.update(
        throughput * oscillate(time.wall_ms),
        &ui.screen.meter,
        ui.screen.dark,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Snapshot;
    use crate::screen::Visibility;
    use std::time::{Duration, Instant};

    fn gauge_fill(ui: &UiState) -> f64 {
        ui.chart.chart().unwrap().rendered().data[0]
    }

    fn snapshot(phase_code: i8) -> Snapshot {
        Snapshot {
            client_ip: "10.0.0.7".to_string(),
            download_mbps: 250.7,
            upload_mbps: 42.36,
            ping_ms: 5.0,
            jitter_ms: 0.456,
            phase_code,
        }
    }

    #[test]
    fn formatting_precision() {
        assert_eq!(format_value(5.0), "5.00");
        assert_eq!(format_value(42.36), "42.4");
        assert_eq!(format_value(250.7), "251");
        assert_eq!(format_value(0.0), "0.00");
        assert_eq!(format_value(99.94), "99.9");
    }

    #[test]
    fn oscillation_stays_within_two_percent() {
        assert_eq!(oscillate(0), 1.0);
        for ms in (0..2000).step_by(7) {
            let factor = oscillate(ms);
            assert!((0.98..=1.02).contains(&factor), "{} at {}", factor, ms);
        }
        // A quarter period (≈157 ms) is near the peak.
        assert!(oscillate(157) > 1.019);
    }

    #[test]
    fn indicator_amounts_are_monotonic_ratios() {
        assert_eq!(mbps_to_amount(0.0), 0.0);
        assert_eq!(ms_to_amount(0.0), 0.0);
        assert!(mbps_to_amount(100.0) > mbps_to_amount(10.0));
        assert!(mbps_to_amount(10_000.0) < 1.0);
        assert!(ms_to_amount(300.0) > ms_to_amount(20.0));
    }

    #[test]
    fn idle_engine_skips_unforced_paint() {
        let mut ui = UiState::default();
        init_ui(&mut ui);
        ui.snapshot = Some(snapshot(1));
        ui.phase = Phase::Download;

        paint(&mut ui, EngineState::Ready, false, FrameTime::at(Instant::now(), 0));
        assert_eq!(ui.screen.dl_value, "0.00");
        assert_eq!(ui.screen.current_label, "READY");
    }

    #[test]
    fn no_snapshot_means_no_paint() {
        let mut ui = UiState::default();
        init_ui(&mut ui);
        paint(&mut ui, EngineState::Running, true, FrameTime::at(Instant::now(), 0));
        assert_eq!(ui.screen.ip, "");
        assert_eq!(ui.screen.current_label, "READY");
    }

    #[test]
    fn upload_phase_drives_gauge_and_fades_meter_in() {
        let t0 = Instant::now();
        let mut ui = UiState::default();
        init_ui(&mut ui);
        ui.snapshot = Some(snapshot(3));
        ui.phase = Phase::Upload;

        paint(&mut ui, EngineState::Running, false, FrameTime::at(t0, 0));

        assert_eq!(ui.screen.current_label, "UPLOAD");
        assert_eq!(ui.screen.current_value, "42.4");
        assert_eq!(ui.screen.current_unit, "Mbps");
        assert_eq!(ui.screen.meter.visibility(), Visibility::FadingIn { since: t0 });
        assert!((gauge_fill(&ui) - 4.236).abs() < 1e-9);

        // Already visible: a later paint does not restart the fade.
        let later = FrameTime::at(t0 + Duration::from_millis(5), 0);
        paint(&mut ui, EngineState::Running, false, later);
        assert_eq!(ui.screen.meter.visibility(), Visibility::FadingIn { since: t0 });
    }

    #[test]
    fn ping_phase_hides_meter_and_shows_latency() {
        let t0 = Instant::now();
        let mut ui = UiState::default();
        init_ui(&mut ui);
        ui.snapshot = Some(snapshot(1));
        ui.phase = Phase::Download;
        paint(&mut ui, EngineState::Running, false, FrameTime::at(t0, 0));
        animate(&mut ui, EngineState::Running, FrameTime::at(t0 + Duration::from_millis(20), 0));
        assert_eq!(ui.screen.meter.visibility(), Visibility::Shown);

        ui.phase = Phase::Ping;
        let t1 = t0 + Duration::from_millis(30);
        paint(&mut ui, EngineState::Running, false, FrameTime::at(t1, 0));
        assert_eq!(ui.screen.current_label, "PING");
        assert_eq!(ui.screen.current_value, "5.00");
        assert_eq!(ui.screen.current_unit, "ms");
        assert_eq!(ui.screen.meter.visibility(), Visibility::FadingOut { since: t1 });
    }

    #[test]
    fn animate_wobbles_gauge_only_while_transferring() {
        let t0 = Instant::now();
        let mut ui = UiState::default();
        init_ui(&mut ui);
        ui.snapshot = Some(snapshot(1));
        ui.phase = Phase::Download;

        animate(&mut ui, EngineState::Running, FrameTime::at(t0, 157));
        let peak = gauge_fill(&ui);
        assert!(peak > 25.07 * 1.019 && peak <= 25.07 * 1.02 + 1e-9);

        ui.phase = Phase::Ping;
        animate(&mut ui, EngineState::Running, FrameTime::at(t0, 0));
        assert_eq!(gauge_fill(&ui), peak);

        ui.phase = Phase::Download;
        animate(&mut ui, EngineState::Done, FrameTime::at(t0, 0));
        assert_eq!(gauge_fill(&ui), peak);
    }
}
