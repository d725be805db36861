pub mod app;
pub mod audio;
pub mod config;
pub mod core;
pub mod error;
pub mod media_keys;
pub mod model;
pub mod ui;
