//! Speech engines.
//!
//! # Available Engines
//!
//! - [`NullEngine`] - reports that the host has no speech capability
//!
//! Enable engines via Cargo features:
//! - `native` - host platform synthesizer through the `tts` crate
//!   (Speech Dispatcher on Linux, SAPI/WinRT on Windows, AVFoundation on macOS)

mod null;

#[cfg(feature = "native")]
pub mod native;

pub use null::NullEngine;
