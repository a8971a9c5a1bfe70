// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Converts a native-rate [AudioSource] to the output device's rate.
//!
//! The source always produces one waveform cycle per [WAVE_LEN] frames, so
//! its native rate is `WAVE_LEN` frames per second at 1 Hz. Resampling by
//! `output_rate / WAVE_LEN / frequency` therefore sets the playback pitch as
//! well as matching the device rate.

use crate::{error::EngineError, source::AudioSource, types::prelude::*};
use rubato::{
    Resampler, SincFixedOut, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fmt::Debug;

/// Pulls native frames from its source on demand and hands out converted
/// frames.
///
/// A sinc converter's anti-aliasing cutoff is fixed when it's built, so the
/// adapter keeps one converter per octave of downsampling ratio, each built
/// at the bottom of its octave, and switches between them as the ratio
/// moves. A converter that takes over is primed with the most recent native
/// frames so that the switch doesn't open a gap.
pub struct ResamplingAdapter<S: AudioSource> {
    source: S,
    bands: Vec<SincFixedOut<SampleType>>,
    band: usize,
    ratio: f64,

    // All sized at construction for the most extreme ratio.
    input: Vec<SampleType>,
    output: Vec<SampleType>,
    output_len: usize,
    output_pos: usize,

    // The last native frames fed to a converter, replayed into the next one.
    history: Vec<SampleType>,
    replay: Vec<SampleType>,
    replay_len: usize,
    replay_pos: usize,
    discard: usize,
}
impl<S: AudioSource + Debug> Debug for ResamplingAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResamplingAdapter")
            .field("source", &self.source)
            .field("bands", &"(skipped)")
            .field("band", &self.band)
            .field("ratio", &self.ratio)
            .field("staged", &(self.output_len - self.output_pos))
            .finish()
    }
}
impl<S: AudioSource> AudioSource for ResamplingAdapter<S> {
    fn pull(&mut self, out: &mut [SampleType]) -> usize {
        let mut written = 0;
        while written < out.len() {
            if self.output_pos >= self.output_len && !self.refill() {
                break;
            }
            let count = (out.len() - written).min(self.output_len - self.output_pos);
            out[written..written + count]
                .copy_from_slice(&self.output[self.output_pos..self.output_pos + count]);
            self.output_pos += count;
            written += count;
        }
        out[written..].fill(0.0);
        written
    }
}
impl<S: AudioSource> ResamplingAdapter<S> {
    /// Output frames produced by each conversion step.
    pub const CHUNK_SIZE: usize = 64;

    /// Converters below ratio 1.0, one per octave. Nine octaves reach a
    /// 10kHz pitch on an 8kHz device.
    pub const DOWNSAMPLING_BANDS: usize = 9;

    /// How far past the top of its octave a converter stays in use before
    /// handing over, so that a ratio hovering at a boundary doesn't flap.
    pub const HYSTERESIS: f64 = 1.2;

    /// The smallest ratio any converter accepts.
    pub const MIN_RATIO: f64 = 1.0 / (1 << Self::DOWNSAMPLING_BANDS) as f64;

    /// The largest ratio. 1Hz on a 192kHz device needs 750.
    pub const MAX_RATIO: f64 = 1000.0;

    /// Native frames replayed into a converter that takes over.
    const HISTORY_LEN: usize = Self::SINC_LEN * 2;

    const SINC_LEN: usize = 64;

    /// Builds the converters. Failure here means the engine can't run.
    pub fn new_with(source: S) -> Result<Self, EngineError> {
        let mut bands = Vec::with_capacity(Self::DOWNSAMPLING_BANDS + 1);
        for band in 0..=Self::DOWNSAMPLING_BANDS {
            bands.push(Self::make_band(band)?);
        }
        let input_len = bands
            .iter()
            .map(|b| b.input_frames_max())
            .max()
            .unwrap_or_default();
        let output_len = bands
            .iter()
            .map(|b| b.output_frames_max())
            .max()
            .unwrap_or_default();

        let mut r = Self {
            source,
            bands,
            band: 0,
            ratio: 1.0,
            input: vec![0.0; input_len],
            output: vec![0.0; output_len],
            output_len: 0,
            output_pos: 0,
            history: vec![0.0; Self::HISTORY_LEN],
            replay: vec![0.0; Self::HISTORY_LEN],
            replay_len: 0,
            replay_pos: 0,
            discard: 0,
        };
        r.reset(Self::ratio_for(SampleRate::default(), FrequencyHz::default()));
        Ok(r)
    }

    /// Band 0 handles every ratio from 1.0 up. Band `n` is built at 2^-n,
    /// which puts its cutoff just under the output Nyquist for the whole
    /// octave above that.
    fn make_band(band: usize) -> Result<SincFixedOut<SampleType>, EngineError> {
        let parameters = SincInterpolationParameters {
            sinc_len: Self::SINC_LEN,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        // A little wider than the band's range so that its ends are accepted.
        let max_relative = if band == 0 {
            Self::MAX_RATIO * 1.05
        } else {
            2.0 * Self::HYSTERESIS * 1.05
        };
        Ok(SincFixedOut::<SampleType>::new(
            Self::band_floor(band),
            max_relative,
            parameters,
            Self::CHUNK_SIZE,
            1,
        )?)
    }

    fn band_floor(band: usize) -> f64 {
        1.0 / (1_usize << band) as f64
    }

    fn band_ceiling(band: usize) -> f64 {
        if band == 0 {
            Self::MAX_RATIO
        } else {
            Self::band_floor(band - 1) * Self::HYSTERESIS
        }
    }

    /// The band whose octave contains `ratio`.
    fn band_for(ratio: f64) -> usize {
        if ratio >= 1.0 {
            return 0;
        }
        let mut band = ((-ratio.log2()).ceil() as usize).clamp(1, Self::DOWNSAMPLING_BANDS);
        // Guard against log2() rounding across a boundary.
        if ratio < Self::band_floor(band) && band < Self::DOWNSAMPLING_BANDS {
            band += 1;
        }
        band
    }

    /// The conversion ratio that plays one cycle at `frequency` on a device
    /// running at `output_rate`.
    pub fn ratio_for(output_rate: SampleRate, frequency: FrequencyHz) -> f64 {
        output_rate.as_f64() / WAVE_LEN as f64 / frequency.clamped().0
    }

    /// The ratio in effect.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    #[allow(missing_docs)]
    pub fn band(&self) -> usize {
        self.band
    }

    /// Changes the ratio for subsequent conversion steps. Within an octave
    /// the change is ramped across the next step. Ratios outside the
    /// supported window saturate.
    pub fn set_ratio(&mut self, ratio: f64) {
        if !ratio.is_finite() {
            return;
        }
        let ratio = ratio.clamp(Self::MIN_RATIO, Self::MAX_RATIO);
        if ratio == self.ratio {
            return;
        }
        if ratio < Self::band_floor(self.band) || ratio > Self::band_ceiling(self.band) {
            self.hand_over(Self::band_for(ratio), ratio);
        } else if self.bands[self.band]
            .set_resample_ratio(ratio, true)
            .is_ok()
        {
            self.ratio = ratio;
        }
    }

    /// Forgets everything in flight and starts over at `ratio` with no ramp.
    /// Afterward, output depends only on what the source produces next.
    pub fn reset(&mut self, ratio: f64) {
        let ratio = if ratio.is_finite() {
            ratio.clamp(Self::MIN_RATIO, Self::MAX_RATIO)
        } else {
            self.ratio
        };
        self.band = Self::band_for(ratio);
        self.start_band(ratio);
        self.history.fill(0.0);
        self.replay_len = 0;
        self.replay_pos = 0;
        self.discard = 0;
        self.output_len = 0;
        self.output_pos = 0;
    }

    #[allow(missing_docs)]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[allow(missing_docs)]
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn start_band(&mut self, ratio: f64) {
        let resampler = &mut self.bands[self.band];
        resampler.reset();
        if resampler.set_resample_ratio(ratio, false).is_ok() {
            self.ratio = ratio;
        } else {
            self.ratio = Self::band_floor(self.band);
        }
    }

    /// Switches converters, replaying recent native frames into the new one
    /// and dropping the output that replay produces. Staged output from the
    /// old converter still plays first.
    fn hand_over(&mut self, band: usize, ratio: f64) {
        self.band = band;
        self.start_band(ratio);
        self.replay.copy_from_slice(&self.history);
        self.replay_len = Self::HISTORY_LEN;
        self.replay_pos = 0;
        self.discard = (Self::HISTORY_LEN as f64 * self.ratio).round() as usize;
    }

    /// Runs one conversion step, pulling as many native frames as it needs.
    /// Returns false if nothing could be produced.
    fn refill(&mut self) -> bool {
        let resampler = &mut self.bands[self.band];
        let needed = resampler.input_frames_next().min(self.input.len());

        let replayed = (self.replay_len - self.replay_pos).min(needed);
        self.input[..replayed]
            .copy_from_slice(&self.replay[self.replay_pos..self.replay_pos + replayed]);
        self.replay_pos += replayed;
        let produced = replayed + self.source.pull(&mut self.input[replayed..needed]);
        self.input[produced.min(needed)..needed].fill(0.0);
        Self::remember(&mut self.history, &self.input[..needed]);

        match resampler.process_into_buffer(
            &[&self.input[..needed]],
            &mut [&mut self.output[..]],
            None,
        ) {
            Ok((_, output_len)) => {
                let skipped = self.discard.min(output_len);
                self.discard -= skipped;
                self.output_len = output_len;
                self.output_pos = skipped;
                output_len > 0
            }
            Err(_) => {
                self.output_len = 0;
                self.output_pos = 0;
                false
            }
        }
    }

    /// Keeps the tail of `fed` at the end of `history`.
    fn remember(history: &mut [SampleType], fed: &[SampleType]) {
        let len = history.len();
        if fed.len() >= len {
            history.copy_from_slice(&fed[fed.len() - len..]);
        } else {
            history.copy_within(fed.len().., 0);
            history[len - fed.len()..].copy_from_slice(fed);
        }
    }
}
