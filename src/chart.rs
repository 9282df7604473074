use crate::screen::Meter;
use ratatui::style::Color;
use tracing::{debug, warn};

pub const MAX_SPEED: f64 = 1000.0;

pub const KU_GREEN: Color = Color::Rgb(0x00, 0x66, 0x64);
pub const DARK_BG: Color = Color::Rgb(0x33, 0x41, 0x55);
pub const LIGHT_BG: Color = Color::Rgb(0xf1, 0xf5, 0xf9);

pub fn track_color(dark: bool) -> Color {
    if dark {
        DARK_BG
    } else {
        LIGHT_BG
    }
}

pub fn gauge_percentage(value: f64) -> f64 {
    (value / MAX_SPEED * 100.0).max(0.0).min(100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaugeDataset {
    pub data: [f64; 2],
    pub colors: [Color; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeOptions {
    pub circumference_deg: f64,
    pub rotation_deg: f64,
    pub cutout: f64,
}

impl Default for GaugeOptions {
    fn default() -> Self {
        Self {
            circumference_deg: 180.0,
            rotation_deg: -90.0,
            cutout: 0.75,
        }
    }
}

/// Edits to `dataset_mut` only reach `rendered` on the next `update`, which
/// never animates.
pub trait GaugeChart {
    fn dataset_mut(&mut self) -> &mut GaugeDataset;
    fn rendered(&self) -> &GaugeDataset;
    fn options(&self) -> &GaugeOptions;
    fn update(&mut self);
    fn destroy(&mut self);
}

pub type ChartFactory = Box<dyn Fn(GaugeDataset, GaugeOptions) -> Box<dyn GaugeChart>>;

#[derive(Debug, Clone)]
pub struct HalfDoughnut {
    dataset: GaugeDataset,
    rendered: GaugeDataset,
    options: GaugeOptions,
    destroyed: bool,
}

impl HalfDoughnut {
    pub fn new(dataset: GaugeDataset, options: GaugeOptions) -> Self {
        Self {
            rendered: dataset.clone(),
            dataset,
            options,
            destroyed: false,
        }
    }
}

impl GaugeChart for HalfDoughnut {
    fn dataset_mut(&mut self) -> &mut GaugeDataset {
        &mut self.dataset
    }

    fn rendered(&self) -> &GaugeDataset {
        &self.rendered
    }

    fn options(&self) -> &GaugeOptions {
        &self.options
    }

    fn update(&mut self) {
        if self.destroyed {
            return;
        }
        self.rendered = self.dataset.clone();
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}

pub struct ChartAdapter {
    chart: Option<Box<dyn GaugeChart>>,
    factory: ChartFactory,
    missing_surface_logged: bool,
}

impl Default for ChartAdapter {
    fn default() -> Self {
        Self::with_factory(Box::new(|dataset, options| {
            Box::new(HalfDoughnut::new(dataset, options))
        }))
    }
}

impl ChartAdapter {
    pub fn with_factory(factory: ChartFactory) -> Self {
        Self {
            chart: None,
            factory,
            missing_surface_logged: false,
        }
    }

    pub fn chart(&self) -> Option<&dyn GaugeChart> {
        self.chart.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.chart.is_some()
    }

    // Without a canvas the adapter stays empty until one appears.
    pub fn init(&mut self, meter: &Meter, dark: bool) {
        if !meter.canvas {
            if !self.missing_surface_logged {
                warn!("gauge canvas not available, chart disabled");
                self.missing_surface_logged = true;
            }
            return;
        }
        self.missing_surface_logged = false;

        if let Some(mut old) = self.chart.take() {
            old.destroy();
        }

        let dataset = GaugeDataset {
            data: [0.0, 100.0],
            colors: [KU_GREEN, track_color(dark)],
        };
        debug!("gauge chart created");
        self.chart = Some((self.factory)(dataset, GaugeOptions::default()));
    }

    pub fn update(&mut self, value: f64, meter: &Meter, dark: bool) {
        if self.chart.is_none() {
            self.init(meter, dark);
        }

        if let Some(chart) = self.chart.as_mut() {
            let percentage = gauge_percentage(value);
            chart.dataset_mut().data = [percentage, 100.0 - percentage];
            chart.update();
        }
    }

    pub fn set_track_color(&mut self, color: Color) -> bool {
        match self.chart.as_mut() {
            Some(chart) => {
                chart.dataset_mut().colors[1] = color;
                chart.update();
                true
            }
            None => false,
        }
    }
}
