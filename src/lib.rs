pub mod api;
pub mod app;
pub mod app_state;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod data;
pub mod format;
pub mod logging;
pub mod store;
