//! Capture invocation.
//!
//! This module defines the `CaptureInvoker` trait the worker manager launches
//! recordings through, and the ffmpeg implementation used in production.

mod ffmpeg;
mod traits;

pub use ffmpeg::{FfmpegCapture, FfmpegConfig};
pub use traits::{CaptureInvoker, CaptureRequest, CaptureSession};
