pub mod api;
pub mod cli;
pub mod config;
pub mod controls;
pub mod files;
pub mod logging;
pub mod session;
pub mod tui;
pub mod views;
