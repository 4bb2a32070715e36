pub mod app;
pub mod views;
pub mod widgets;

pub use app::{run_render_loop, Screen};
