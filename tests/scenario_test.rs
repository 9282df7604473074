use speedgauge::app::{App, AppAction};
use speedgauge::engine::{EngineEvent, EngineState, Snapshot};
use speedgauge::screen::{Visibility, ABORT_LABEL, START_LABEL};
use speedgauge::servers::{SelectorState, ServerDescriptor};
use speedgauge::settings::{ServerSource, Settings};
use speedgauge::state::{FrameTime, Phase};
use speedgauge::storage::{FileStore, KeyValueStore, MemoryStore};
use speedgauge::testing::{event_channel, ScriptedEngine};
use speedgauge::theme::THEME_KEY;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn create_app(servers: ServerSource) -> App<ScriptedEngine> {
    let (tx, _rx) = event_channel();
    let settings = Settings {
        servers,
        ..Settings::default()
    };
    App::new(
        ScriptedEngine::default(),
        settings,
        Box::new(MemoryStore::default()),
        false,
        tx,
    )
}

fn server(name: &str, ping: Option<f64>) -> ServerDescriptor {
    ServerDescriptor {
        name: name.to_string(),
        ping_ms: ping,
        ..ServerDescriptor::cloudflare()
    }
}

fn download_snapshot() -> Snapshot {
    Snapshot {
        client_ip: "1.2.3.4".to_string(),
        download_mbps: 87.3,
        upload_mbps: 12.0,
        ping_ms: 14.0,
        jitter_ms: 1.2,
        phase_code: 1,
    }
}

fn gauge_data(app: &App<ScriptedEngine>) -> [f64; 2] {
    app.ui.chart.chart().expect("chart").rendered().data
}

#[test]
fn test_running_snapshot_is_painted() {
    let t0 = Instant::now();
    let mut app = create_app(ServerSource::Inline(Vec::new()));
    app.init_servers();
    app.dispatch(AppAction::StartStop, FrameTime::at(t0, 0));

    assert_eq!(app.engine.state, EngineState::Running);
    assert_eq!(app.ui.screen.button.label, ABORT_LABEL);

    app.handle_engine_event(
        EngineEvent::Update {
            run: 1,
            snapshot: download_snapshot(),
        },
        FrameTime::at(t0, 0),
    );

    let screen = &app.ui.screen;
    assert_eq!(screen.ip, "1.2.3.4");
    assert_eq!(screen.dl_value, "87.3");
    assert_eq!(screen.ul_value, "12.0");
    assert_eq!(screen.ping_value, "14.0");
    assert_eq!(screen.jit_value, "1.20");
    assert_eq!(screen.current_label, "DOWNLOAD");
    assert_eq!(screen.current_value, "87.3");
    assert_eq!(app.ui.phase, Phase::Download);

    let data = gauge_data(&app);
    assert!((data[0] - 8.73).abs() < 1e-9, "gauge at {}", data[0]);
    assert!((data[0] + data[1] - 100.0).abs() < 1e-9);
}

#[test]
fn test_completion_restores_controls() {
    let t0 = Instant::now();
    let mut app = create_app(ServerSource::Inline(Vec::new()));
    app.init_servers();
    app.dispatch(AppAction::StartStop, FrameTime::at(t0, 0));
    app.handle_engine_event(
        EngineEvent::Update {
            run: 1,
            snapshot: download_snapshot(),
        },
        FrameTime::at(t0, 0),
    );
    app.tick(FrameTime::at(t0 + Duration::from_millis(20), 0));
    assert_eq!(app.ui.screen.meter.visibility(), Visibility::Shown);

    app.engine.finish();
    let t1 = t0 + Duration::from_secs(10);
    app.handle_engine_event(EngineEvent::End { run: 1, aborted: false }, FrameTime::at(t1, 0));

    assert_eq!(app.ui.screen.button.label, START_LABEL);
    assert!(!app.ui.screen.button.running);
    assert_eq!(app.ui.phase, Phase::Idle);
    assert_eq!(gauge_data(&app), [0.0, 100.0]);
    assert_eq!(app.ui.screen.current_label, "READY");
    assert_eq!(app.ui.screen.current_value, "0.00");
    // The forced paint keeps the final results on screen.
    assert_eq!(app.ui.screen.dl_value, "87.3");
    assert_eq!(app.ui.screen.ip, "1.2.3.4");

    app.tick(FrameTime::at(t1 + Duration::from_millis(500), 0));
    assert!(app.ui.screen.meter.is_hidden());
}

#[test]
fn test_abort_resets_and_ignores_late_events() {
    let t0 = Instant::now();
    let mut app = create_app(ServerSource::Inline(Vec::new()));
    app.init_servers();
    app.dispatch(AppAction::StartStop, FrameTime::at(t0, 0));
    app.handle_engine_event(
        EngineEvent::Update {
            run: 1,
            snapshot: download_snapshot(),
        },
        FrameTime::at(t0, 0),
    );

    app.dispatch(AppAction::StartStop, FrameTime::at(t0, 0));
    assert_eq!(app.engine.aborts, 1);
    assert_eq!(app.ui.screen.dl_value, "0.00");
    assert_eq!(app.ui.screen.ip, "");

    app.handle_engine_event(
        EngineEvent::Update {
            run: 1,
            snapshot: download_snapshot(),
        },
        FrameTime::at(t0, 0),
    );
    assert_eq!(app.ui.screen.dl_value, "0.00");
    assert_eq!(app.ui.phase, Phase::Idle);

    // A fresh run starts cleanly after the abort.
    app.dispatch(AppAction::StartStop, FrameTime::at(t0, 0));
    assert_eq!(app.engine.starts, 2);
    assert_eq!(app.control.active_run(), Some(2));
}

#[test]
fn test_server_list_flow() {
    let mut app = create_app(ServerSource::Reference("servers.json".to_string()));
    app.init_servers();
    assert_eq!(app.selector.state(), SelectorState::LoadingList);
    assert!(app.ui.screen.loading);

    let list = vec![server("Bangkok", None), server("Offline", None)];
    app.handle_engine_event(EngineEvent::ServerListLoaded(Some(list)), FrameTime::now());
    assert_eq!(app.selector.state(), SelectorState::Ranking);
    assert_eq!(app.engine.test_points.len(), 2);
    assert_eq!(app.engine.select_requests, 1);

    app.handle_engine_event(
        EngineEvent::ServersRanked {
            servers: vec![server("Bangkok", Some(14.0)), server("Offline", None)],
            best: Some(0),
        },
        FrameTime::now(),
    );

    let screen = &app.ui.screen;
    assert_eq!(screen.server_list.len(), 1);
    assert_eq!(screen.server_list[0].name, "Bangkok");
    assert!(!screen.server_area);
    assert!(screen.test_wrapper);
    assert!(!screen.loading);
    assert_eq!(screen.selected_server_name, "Bangkok");
}

#[test]
fn test_picker_switches_server() {
    let mut app = create_app(ServerSource::Inline(vec![
        server("Bangkok", None),
        server("Chiang Mai", None),
    ]));
    app.init_servers();
    assert_eq!(app.engine.select_requests, 1);

    app.handle_engine_event(
        EngineEvent::ServersRanked {
            servers: vec![server("Bangkok", Some(9.0)), server("Chiang Mai", Some(31.0))],
            best: Some(0),
        },
        FrameTime::now(),
    );
    assert!(app.ui.screen.server_area);

    let now = FrameTime::now();
    app.dispatch(AppAction::OpenServerModal, now);
    app.dispatch(AppAction::ModalNext, now);
    let highlighted = app.modal.highlighted(&app.ui.screen).unwrap();
    app.dispatch(AppAction::SelectServer(highlighted), now);

    assert!(!app.ui.screen.modal_open);
    assert_eq!(app.ui.screen.selected_server_name, "Chiang Mai");
    assert_eq!(app.engine.selected.as_ref().unwrap().name, "Chiang Mai");
}

#[test]
fn test_empty_sources_degrade_to_bare_ui() {
    let mut app = create_app(ServerSource::Reference("servers.json".to_string()));
    app.init_servers();
    app.handle_engine_event(EngineEvent::ServerListLoaded(Some(Vec::new())), FrameTime::now());

    assert_eq!(app.selector.state(), SelectorState::Bare);
    assert!(!app.ui.screen.loading);
    assert!(!app.ui.screen.server_area);
    assert!(app.ui.screen.test_wrapper);
    assert_eq!(app.engine.select_requests, 0);

    let mut inline = create_app(ServerSource::Inline(Vec::new()));
    inline.init_servers();
    assert_eq!(inline.selector.state(), SelectorState::Bare);
    assert!(inline.engine.loaded_references.is_empty());
}

#[test]
fn test_no_servers_message() {
    let mut app = create_app(ServerSource::Inline(vec![server("Down", None)]));
    app.init_servers();
    app.handle_engine_event(
        EngineEvent::ServersRanked {
            servers: vec![server("Down", None)],
            best: None,
        },
        FrameTime::now(),
    );

    assert_eq!(app.ui.screen.message, "No servers available");
    assert!(app.ui.screen.loading);
    assert!(!app.ui.screen.test_wrapper);
}

#[test]
fn test_theme_persists_across_sessions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (tx, _rx) = event_channel();

    let mut app = App::new(
        ScriptedEngine::default(),
        Settings::default(),
        Box::new(FileStore::open(&path)),
        false,
        tx.clone(),
    );
    assert!(!app.ui.screen.dark);
    app.dispatch(AppAction::ToggleTheme, FrameTime::now());
    assert!(app.ui.screen.dark);

    let reopened = FileStore::open(&path);
    assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("dark"));

    let next = App::new(
        ScriptedEngine::default(),
        Settings::default(),
        Box::new(reopened),
        false,
        tx,
    );
    assert!(next.ui.screen.dark);
}
