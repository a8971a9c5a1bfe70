// Copyright (c) 2024 Mike Tsao. All rights reserved.

use thiserror::Error;

/// Problems constructing or editing a [WaveformGrid](crate::grid::WaveformGrid).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// Every grid axis needs at least one cell.
    #[error("grid dimensions must all be nonzero (got {x}x{y}x{z})")]
    EmptyDimension {
        #[allow(missing_docs)]
        x: usize,
        #[allow(missing_docs)]
        y: usize,
        #[allow(missing_docs)]
        z: usize,
    },
    /// A linear index didn't address any waveform in the grid.
    #[error("waveform index {index} is outside a grid of {len} waveforms")]
    IndexOutOfRange {
        #[allow(missing_docs)]
        index: usize,
        #[allow(missing_docs)]
        len: usize,
    },
}

/// Failures reported by an [Engine](crate::engine::Engine) or its
/// [EngineHandle](crate::engine::EngineHandle). A [EngineError::Resampler]
/// during construction is fatal: the caller shouldn't open a device or accept
/// control input without a working engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The sample-rate converter couldn't be built.
    #[error("couldn't initialize the sample-rate converter: {0}")]
    Resampler(#[from] rubato::ResamplerConstructionError),

    /// The engine was given a grid it can't play.
    #[error("unusable waveform grid: {0}")]
    Grid(#[from] GridError),

    /// The audio thread hasn't caught up with earlier commands. Try again
    /// after the next device buffer.
    #[error("the engine's command queue is full")]
    CommandQueueFull,
}
