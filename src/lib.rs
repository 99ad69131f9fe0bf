//! Aedict dictionary manager library
//!
//! Downloading, unpacking and bookkeeping of the dictionary indexes used by
//! the `aedict` CLI.

pub mod commands;
pub mod core;
pub mod error;
pub mod utils;
