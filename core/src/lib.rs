// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The real-time half of wavemorph: morphing between stored waveforms,
//! smoothing controls, converting to the device rate, and sequencing exports.
//! Nothing in here touches an audio device; see `wavemorph-services` for that.

#![warn(missing_docs)]

/// The live control surface shared by the UI and audio threads.
pub mod control;
/// The real-time engine and the handle that controls it.
pub mod engine;
/// Error types.
pub mod error;
/// Sweeps the whole grid for recording.
pub mod export;
/// Waveform storage.
pub mod grid;
/// Waveform interpolation.
pub mod morph;
/// Sample-rate conversion, which also sets pitch.
pub mod resampler;
/// Control smoothing.
pub mod smoother;
/// Pull-based audio sources.
pub mod source;
/// Common structures and constants used across the library.
pub mod types;

/// Recommended imports for easy onboarding.
pub mod prelude {
    pub use super::control::{ControlState, ControlValues};
    pub use super::engine::{Engine, EngineHandle};
    pub use super::error::{EngineError, GridError};
    pub use super::export::ExportPhase;
    pub use super::grid::{Axis, GridDimensions, Waveform, WaveformGrid, WaveformStore};
    pub use super::source::AudioSource;
    pub use super::types::prelude::*;
}
