pub mod app;
pub mod chart;
pub mod control;
pub mod engine;
pub mod error;
pub mod modal;
pub mod render;
pub mod screen;
pub mod servers;
pub mod settings;
pub mod speedtest;
pub mod state;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod theme;
pub mod ui;
