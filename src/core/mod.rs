pub mod archive;
pub mod catalog;
pub mod config;
pub mod dictionary;
pub mod fetch;
pub mod progress;
pub mod quiz;
pub mod source;
pub mod task;
