//! srec-lite library crate.
//!
//! Watches a list of sources, and keeps exactly one ffmpeg capture running
//! for every source that is currently live.

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod recorder;
pub mod scheduler;
pub mod services;
pub mod sources;
pub mod utils;
pub mod worker;

pub use error::{Error, Result};
