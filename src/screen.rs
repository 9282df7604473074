use std::time::{Duration, Instant};

pub const FADE_DURATION: Duration = Duration::from_millis(500);
pub const FADE_DELAY: Duration = Duration::from_millis(10);

pub const START_LABEL: &str = "Start";
pub const ABORT_LABEL: &str = "Abort";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    FadingIn { since: Instant },
    Shown,
    FadingOut { since: Instant },
}

/// The gauge area. `canvas` is false when the terminal has no room to draw it.
#[derive(Debug, Clone)]
pub struct Meter {
    pub(crate) visibility: Visibility,
    pub canvas: bool,
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            visibility: Visibility::Hidden,
            canvas: true,
        }
    }
}

impl Meter {
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// True only once a fade-out has fully completed (or nothing was ever shown).
    pub fn is_hidden(&self) -> bool {
        self.visibility == Visibility::Hidden
    }

    pub fn fade_in(&mut self, now: Instant) {
        if matches!(
            self.visibility,
            Visibility::Hidden | Visibility::FadingOut { .. }
        ) {
            self.visibility = Visibility::FadingIn { since: now };
        }
    }

    pub fn fade_out(&mut self, now: Instant) {
        if matches!(
            self.visibility,
            Visibility::Shown | Visibility::FadingIn { .. }
        ) {
            self.visibility = Visibility::FadingOut { since: now };
        }
    }

    pub fn settle(&mut self, now: Instant) {
        self.visibility = match self.visibility {
            Visibility::FadingIn { since }
                if now.saturating_duration_since(since) >= FADE_DELAY =>
            {
                Visibility::Shown
            }
            Visibility::FadingOut { since }
                if now.saturating_duration_since(since) >= FADE_DURATION =>
            {
                Visibility::Hidden
            }
            v => v,
        };
    }

    pub fn opacity(&self, now: Instant) -> f64 {
        match self.visibility {
            Visibility::Hidden => 0.0,
            Visibility::Shown => 1.0,
            Visibility::FadingIn { since } => {
                let t = now.saturating_duration_since(since).as_secs_f64();
                (t / FADE_DELAY.as_secs_f64()).min(1.0)
            }
            Visibility::FadingOut { since } => {
                let t = now.saturating_duration_since(since).as_secs_f64();
                1.0 - (t / FADE_DURATION.as_secs_f64()).min(1.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRow {
    pub index: usize,
    pub name: String,
    pub ping: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct Screen {
    pub dark: bool,

    pub loading: bool,
    pub message: String,

    pub server_area: bool,
    pub server_list: Vec<ServerRow>,
    pub selected_server_name: String,
    pub modal_open: bool,

    pub test_wrapper: bool,

    pub ip: String,
    pub dl_value: String,
    pub ul_value: String,
    pub ping_value: String,
    pub jit_value: String,

    pub meter: Meter,
    pub current_label: String,
    pub current_value: String,
    pub current_unit: String,

    pub button: Button,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            dark: false,
            loading: true,
            message: String::new(),
            server_area: false,
            server_list: Vec::new(),
            selected_server_name: String::new(),
            modal_open: false,
            test_wrapper: false,
            ip: String::new(),
            dl_value: String::new(),
            ul_value: String::new(),
            ping_value: String::new(),
            jit_value: String::new(),
            meter: Meter::default(),
            current_label: String::new(),
            current_value: String::new(),
            current_unit: String::new(),
            button: Button {
                label: START_LABEL.to_string(),
                running: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_in_completes_after_delay() {
        let t0 = Instant::now();
        let mut meter = Meter::default();
        assert!(meter.is_hidden());

        meter.fade_in(t0);
        assert!(!meter.is_hidden());
        meter.settle(t0 + Duration::from_millis(5));
        assert_eq!(meter.visibility(), Visibility::FadingIn { since: t0 });

        meter.settle(t0 + FADE_DELAY);
        assert_eq!(meter.visibility(), Visibility::Shown);
        assert_eq!(meter.opacity(t0 + FADE_DELAY), 1.0);
    }

    #[test]
    fn fade_out_hides_after_duration() {
        let t0 = Instant::now();
        let mut meter = Meter::default();
        meter.fade_in(t0);
        meter.settle(t0 + FADE_DELAY);

        let t1 = t0 + Duration::from_secs(1);
        meter.fade_out(t1);
        // Repeated fade-outs keep the original start time.
        meter.fade_out(t1 + Duration::from_millis(200));
        meter.settle(t1 + Duration::from_millis(250));
        assert!(!meter.is_hidden());
        assert!((meter.opacity(t1 + Duration::from_millis(250)) - 0.5).abs() < 1e-9);

        meter.settle(t1 + FADE_DURATION);
        assert!(meter.is_hidden());
    }

    #[test]
    fn fade_out_of_hidden_meter_is_noop() {
        let mut meter = Meter::default();
        meter.fade_out(Instant::now());
        assert_eq!(meter.visibility(), Visibility::Hidden);
    }

    #[test]
    fn fade_in_interrupts_fade_out() {
        let t0 = Instant::now();
        let mut meter = Meter::default();
        meter.fade_in(t0);
        meter.settle(t0 + FADE_DELAY);
        meter.fade_out(t0 + Duration::from_millis(100));
        meter.fade_in(t0 + Duration::from_millis(150));
        meter.settle(t0 + Duration::from_millis(700));
        assert_eq!(meter.visibility(), Visibility::Shown);
    }
}
