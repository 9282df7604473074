use crate::control::TestController;
use crate::engine::{EngineEvent, EventSender, MeasurementEngine};
use crate::modal::ModalController;
use crate::render::{animate, paint};
use crate::servers::ServerSelector;
use crate::settings::Settings;
use crate::state::{FrameTime, UiState};
use crate::storage::KeyValueStore;
use crate::theme::ThemeController;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    StartStop,
    ToggleTheme,
    OpenServerModal,
    CloseServerModal,
    ModalNext,
    ModalPrev,
    SelectServer(usize),
}

pub struct App<E: MeasurementEngine> {
    pub ui: UiState,
    pub engine: E,
    pub theme: ThemeController,
    pub selector: ServerSelector,
    pub modal: ModalController,
    pub control: TestController,
    pub settings: Settings,
    pub status: Option<String>,
    pub should_quit: bool,
    events: EventSender,
}

impl<E: MeasurementEngine> App<E> {
    pub fn new(
        mut engine: E,
        settings: Settings,
        store: Box<dyn KeyValueStore>,
        os_prefers_dark: bool,
        events: EventSender,
    ) -> Self {
        let mut ui = UiState::default();
        let theme = ThemeController::init(store, os_prefers_dark, &mut ui.screen);
        engine.set_telemetry(settings.telemetry);

        Self {
            ui,
            engine,
            theme,
            selector: ServerSelector::default(),
            modal: ModalController::default(),
            control: TestController::default(),
            settings,
            status: None,
            should_quit: false,
            events,
        }
    }

    pub fn init_servers(&mut self) {
        self.selector.begin(
            &self.settings.servers,
            &mut self.engine,
            &mut self.ui,
            &self.events,
        );
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent, time: FrameTime) {
        match event {
            EngineEvent::ServerListLoaded(list) => {
                self.selector
                    .on_list_loaded(list, &mut self.engine, &mut self.ui, &self.events);
            }
            EngineEvent::ServersRanked { servers, best } => {
                self.selector.on_ranked(servers, best, &mut self.ui);
            }
            EngineEvent::Update { run, snapshot } => {
                if self.control.on_update(run, snapshot, &mut self.ui) {
                    paint(&mut self.ui, self.engine.state(), false, time);
                }
            }
            EngineEvent::End { run, aborted } => {
                self.control
                    .on_end(run, aborted, &self.engine, &mut self.ui, time);
            }
        }
    }

    /// Frame-rate trigger: fades and gauge oscillation only.
    pub fn tick(&mut self, time: FrameTime) {
        animate(&mut self.ui, self.engine.state(), time);
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        self.status = None;

        if self.ui.screen.modal_open {
            self.handle_modal_key(key)
        } else {
            self.handle_main_key(key)
        }
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        let screen = &self.ui.screen;
        match key.code {
            KeyCode::Char('q') => Some(AppAction::Quit),
            KeyCode::Enter | KeyCode::Char(' ') if screen.test_wrapper => {
                Some(AppAction::StartStop)
            }
            KeyCode::Esc if self.engine.state().is_running() => Some(AppAction::StartStop),
            KeyCode::Char('s') if screen.server_area => Some(AppAction::OpenServerModal),
            KeyCode::Char('t') => Some(AppAction::ToggleTheme),
            _ => None,
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Some(AppAction::CloseServerModal),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => Some(AppAction::ModalNext),
            KeyCode::Up | KeyCode::Char('k') | KeyCode::BackTab => Some(AppAction::ModalPrev),
            KeyCode::Enter => self
                .modal
                .highlighted(&self.ui.screen)
                .map(AppAction::SelectServer),
            KeyCode::Char('t') => Some(AppAction::ToggleTheme),
            _ => None,
        }
    }

    pub fn dispatch(&mut self, action: AppAction, time: FrameTime) {
        match action {
            AppAction::Quit => self.should_quit = true,
            AppAction::StartStop => {
                self.control
                    .start_stop(&mut self.engine, &mut self.ui, &self.events, time);
            }
            AppAction::ToggleTheme => {
                self.theme.toggle(&mut self.ui);
            }
            AppAction::OpenServerModal => self.modal.open(&mut self.ui.screen),
            AppAction::CloseServerModal => self.modal.close(&mut self.ui.screen),
            AppAction::ModalNext => self.modal.next(&self.ui.screen),
            AppAction::ModalPrev => self.modal.prev(&self.ui.screen),
            AppAction::SelectServer(index) => {
                if let Err(e) = self.modal.select_server(
                    index,
                    &mut self.selector,
                    &mut self.engine,
                    &mut self.ui.screen,
                ) {
                    warn!("server selection rejected: {}", e);
                    self.status = Some(e.to_string());
                }
            }
        }
    }
}

pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}
