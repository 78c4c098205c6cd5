mod app;
mod commands;
mod config;
mod effects;
mod logging;
mod view;
mod workspace;

pub use app::run_app;
