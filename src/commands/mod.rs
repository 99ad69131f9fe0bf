pub mod cleanup;
pub mod config;
pub mod download;
pub mod list;
pub mod progress;
