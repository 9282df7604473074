mod layout;

pub use layout::{draw_ui, gauge_fits};
