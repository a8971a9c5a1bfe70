// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::{
    grid::WaveformStore,
    morph::{self, apply_gain, MorphPosition},
    types::prelude::*,
};
use std::{fmt::Debug, sync::Arc};

/// Something that produces audio on demand. Implementations never block and
/// never allocate inside [AudioSource::pull()].
pub trait AudioSource: Send {
    /// Fills `out` with the next frames and returns how many were produced.
    /// A short count means the rest of `out` is silence.
    fn pull(&mut self, out: &mut [SampleType]) -> usize;
}

/// The current sample index within the waveform cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackCursor(usize);
impl PlaybackCursor {
    #[allow(missing_docs)]
    pub fn position(&self) -> usize {
        self.0
    }

    /// Moves to `position`, wrapped into the cycle.
    pub fn set_position(&mut self, position: usize) {
        self.0 = position % WAVE_LEN;
    }

    /// Moves forward by `frames`, wrapping at the end of the cycle.
    pub fn advance(&mut self, frames: usize) {
        self.0 = (self.0 + frames % WAVE_LEN) % WAVE_LEN;
    }

    /// Back to the start of the cycle.
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// What [WavetableSource] should play during the next pull.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParameters {
    /// Where in the store to read.
    pub position: MorphPosition,
    /// Linear output gain.
    pub gain: ParameterType,
    /// Produce silence (the cursor still advances).
    pub muted: bool,
}
impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            position: Default::default(),
            gain: Decibels::default().to_amplitude(),
            muted: true,
        }
    }
}

/// Generates morphed waveform samples at the engine's native rate, one cycle
/// per [WAVE_LEN] frames.
pub struct WavetableSource {
    store: Arc<dyn WaveformStore>,
    cursor: PlaybackCursor,
    parameters: RenderParameters,
    frames_generated: usize,
}
impl Debug for WavetableSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavetableSource")
            .field("store", &self.store)
            .field("cursor", &self.cursor)
            .field("parameters", &self.parameters)
            .finish()
    }
}
impl AudioSource for WavetableSource {
    fn pull(&mut self, out: &mut [SampleType]) -> usize {
        let store = self.store.as_ref();
        let parameters = self.parameters;
        for sample in out.iter_mut() {
            *sample = if parameters.muted {
                0.0
            } else {
                apply_gain(
                    morph::sample(store, &parameters.position, self.cursor.position()),
                    parameters.gain,
                )
            };
            self.cursor.advance(1);
        }
        self.frames_generated += out.len();
        out.len()
    }
}
impl WavetableSource {
    #[allow(missing_docs)]
    pub fn new_with(store: Arc<dyn WaveformStore>) -> Self {
        Self {
            store,
            cursor: Default::default(),
            parameters: Default::default(),
            frames_generated: Default::default(),
        }
    }

    /// The store currently being played.
    pub fn store(&self) -> &Arc<dyn WaveformStore> {
        &self.store
    }

    /// Swaps in a new store and hands back the old one, so that the caller
    /// decides where it gets dropped.
    pub fn replace_store(&mut self, store: Arc<dyn WaveformStore>) -> Arc<dyn WaveformStore> {
        std::mem::replace(&mut self.store, store)
    }

    #[allow(missing_docs)]
    pub fn parameters(&self) -> &RenderParameters {
        &self.parameters
    }

    #[allow(missing_docs)]
    pub fn set_parameters(&mut self, parameters: RenderParameters) {
        self.parameters = parameters;
    }

    #[allow(missing_docs)]
    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    #[allow(missing_docs)]
    pub fn cursor_mut(&mut self) -> &mut PlaybackCursor {
        &mut self.cursor
    }

    /// Returns the number of frames pulled since the last call, and resets
    /// the count.
    pub fn take_frames_generated(&mut self) -> usize {
        std::mem::take(&mut self.frames_generated)
    }
}
