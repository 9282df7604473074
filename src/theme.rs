use crate::chart::track_color;
use crate::screen::Screen;
use crate::state::UiState;
use crate::storage::KeyValueStore;
use tracing::{info, warn};

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

/// Terminal counterpart of `prefers-color-scheme`: rxvt-style `COLORFGBG`
/// ("fg;bg") with a dark background color index.
pub fn os_prefers_dark() -> bool {
    std::env::var("COLORFGBG")
        .map(|value| colorfgbg_is_dark(&value))
        .unwrap_or(false)
}

fn colorfgbg_is_dark(value: &str) -> bool {
    value
        .rsplit(';')
        .next()
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .map(|bg| bg <= 6 || bg == 8)
        .unwrap_or(false)
}

pub struct ThemeController {
    store: Box<dyn KeyValueStore>,
}

impl ThemeController {
    pub fn init(
        store: Box<dyn KeyValueStore>,
        os_prefers_dark: bool,
        screen: &mut Screen,
    ) -> Self {
        let saved = store.get(THEME_KEY);
        screen.dark = match saved.as_deref() {
            Some(value) => value == Theme::Dark.as_str(),
            None => os_prefers_dark,
        };
        Self { store }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn toggle(&mut self, ui: &mut UiState) -> Theme {
        ui.screen.dark = !ui.screen.dark;
        let theme = Theme::from_dark(ui.screen.dark);

        if let Err(e) = self.store.set(THEME_KEY, theme.as_str()) {
            warn!("failed to persist theme: {}", e);
        }
        ui.chart.set_track_color(track_color(ui.screen.dark));

        info!(theme = theme.as_str(), "theme toggled");
        theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{DARK_BG, LIGHT_BG};
    use crate::storage::MemoryStore;

    fn store_with(theme: Option<&str>) -> Box<dyn KeyValueStore> {
        let mut store = MemoryStore::default();
        if let Some(theme) = theme {
            store.set(THEME_KEY, theme).unwrap();
        }
        Box::new(store)
    }

    #[test]
    fn saved_value_wins_over_os_preference() {
        let mut screen = Screen::default();
        ThemeController::init(store_with(Some("light")), true, &mut screen);
        assert!(!screen.dark);

        ThemeController::init(store_with(Some("dark")), false, &mut screen);
        assert!(screen.dark);
    }

    #[test]
    fn falls_back_to_os_then_light() {
        let mut screen = Screen::default();
        ThemeController::init(store_with(None), true, &mut screen);
        assert!(screen.dark);

        ThemeController::init(store_with(None), false, &mut screen);
        assert!(!screen.dark);
    }

    #[test]
    fn toggling_twice_restores_persisted_value() {
        let mut ui = UiState::default();
        let mut theme = ThemeController::init(store_with(Some("light")), false, &mut ui.screen);

        assert_eq!(theme.toggle(&mut ui), Theme::Dark);
        assert_eq!(theme.store().get(THEME_KEY).as_deref(), Some("dark"));

        assert_eq!(theme.toggle(&mut ui), Theme::Light);
        assert_eq!(theme.store().get(THEME_KEY).as_deref(), Some("light"));
        assert!(!ui.screen.dark);
    }

    #[test]
    fn toggle_recolors_existing_chart() {
        let mut ui = UiState::default();
        let mut theme = ThemeController::init(store_with(None), false, &mut ui.screen);
        ui.chart.init(&ui.screen.meter, ui.screen.dark);
        assert_eq!(ui.chart.chart().unwrap().rendered().colors[1], LIGHT_BG);

        theme.toggle(&mut ui);
        assert_eq!(ui.chart.chart().unwrap().rendered().colors[1], DARK_BG);
    }

    #[test]
    fn colorfgbg_parsing() {
        assert!(colorfgbg_is_dark("15;0"));
        assert!(colorfgbg_is_dark("7;default;8"));
        assert!(!colorfgbg_is_dark("0;15"));
        assert!(!colorfgbg_is_dark("garbage"));
    }
}
