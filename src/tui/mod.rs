// Re-export main TUI components
pub mod app;
pub mod rendering;
pub mod types;
pub mod widgets;


pub use app::App;
pub use rendering::run_tui;
