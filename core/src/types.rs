// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Common data types used throughout the system.

use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::RangeInclusive};

#[allow(missing_docs)]
pub mod prelude {
    pub use super::{
        Decibels, FrequencyHz, ParameterType, SampleRate, SampleType, SAMPLE_RATE, WAVE_LEN,
    };
}

/// The number of samples in one stored waveform cycle.
pub const WAVE_LEN: usize = 256;

/// The nominal device rate. Export pitch is derived from it so that one
/// waveform cycle lasts exactly [WAVE_LEN] output frames.
pub const SAMPLE_RATE: usize = 44_100;

/// [SampleType] is the primitive that flows through the audio path.
pub type SampleType = f64;

/// Use [ParameterType] for control values that aren't themselves audio.
pub type ParameterType = f64;

/// [SampleRate] is the number of audio frames per second.
#[derive(Clone, Copy, Debug, Derivative, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct SampleRate(#[derivative(Default(value = "SAMPLE_RATE"))] pub usize);
impl SampleRate {
    /// The rate expressed as a float, for ratio math.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}
impl From<usize> for SampleRate {
    fn from(value: usize) -> Self {
        Self(value)
    }
}
impl From<u32> for SampleRate {
    fn from(value: u32) -> Self {
        Self(value as usize)
    }
}
impl From<SampleRate> for usize {
    fn from(value: SampleRate) -> Self {
        value.0
    }
}
impl Display for SampleRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{} Hz", self.0))
    }
}

/// [FrequencyHz] is a frequency measured in
/// [Hertz](https://en.wikipedia.org/wiki/Hertz), or cycles per second. Here it
/// is the pitch at which one stored waveform cycle is played back.
#[derive(Clone, Copy, Debug, Derivative, PartialEq, PartialOrd, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct FrequencyHz(#[derivative(Default(value = "220.0"))] pub ParameterType);
#[allow(missing_docs)]
impl FrequencyHz {
    pub const MIN: ParameterType = 1.0;
    pub const MAX: ParameterType = 10_000.0;
    pub const UNITS_SUFFIX: &'static str = " Hz";

    pub const fn range() -> RangeInclusive<ParameterType> {
        Self::MIN..=Self::MAX
    }

    /// Keeps the value inside the audible range. Anything outside it would
    /// blow up the resampling ratio downstream.
    pub fn clamped(&self) -> Self {
        if self.0.is_nan() {
            return Self::default();
        }
        Self(self.0.clamp(Self::MIN, Self::MAX))
    }

    /// The pitch at which one cycle lasts exactly [WAVE_LEN] frames at
    /// [SAMPLE_RATE].
    pub fn one_cycle_per_wave_len() -> Self {
        Self(SAMPLE_RATE as ParameterType / WAVE_LEN as ParameterType)
    }
}
impl From<f64> for FrequencyHz {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
impl From<FrequencyHz> for f64 {
    fn from(value: FrequencyHz) -> Self {
        value.0
    }
}
impl Display for FrequencyHz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:.2}{}", self.0, Self::UNITS_SUFFIX))
    }
}

/// Output level in decibels relative to full scale.
#[derive(Clone, Copy, Debug, Derivative, PartialEq, PartialOrd, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct Decibels(#[derivative(Default(value = "-12.0"))] pub ParameterType);
#[allow(missing_docs)]
impl Decibels {
    pub const MIN: ParameterType = -60.0;
    pub const MAX: ParameterType = 0.0;
    pub const UNITS_SUFFIX: &'static str = " dB";

    pub const fn range() -> RangeInclusive<ParameterType> {
        Self::MIN..=Self::MAX
    }

    pub fn clamped(&self) -> Self {
        if self.0.is_nan() {
            return Self::default();
        }
        Self(self.0.clamp(Self::MIN, Self::MAX))
    }

    /// Linear gain for this level, `10^(dB/20)`.
    pub fn to_amplitude(&self) -> ParameterType {
        10.0f64.powf(self.0 / 20.0)
    }
}
impl From<f64> for Decibels {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
impl Display for Decibels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:.2}{}", self.0, Self::UNITS_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn frequency_clamps_to_audible_range() {
        assert_eq!(FrequencyHz(0.0).clamped(), FrequencyHz(FrequencyHz::MIN));
        assert_eq!(FrequencyHz(-5.0).clamped(), FrequencyHz(FrequencyHz::MIN));
        assert_eq!(
            FrequencyHz(1_000_000.0).clamped(),
            FrequencyHz(FrequencyHz::MAX)
        );
        assert_eq!(FrequencyHz(440.0).clamped(), FrequencyHz(440.0));
        assert_eq!(FrequencyHz(f64::NAN).clamped(), FrequencyHz::default());
    }

    #[test]
    fn export_frequency_is_one_cycle_per_wave_len() {
        let f = FrequencyHz::one_cycle_per_wave_len();
        assert!(approx_eq!(
            f64,
            SAMPLE_RATE as f64 / f.0,
            WAVE_LEN as f64,
            ulps = 2
        ));
    }

    #[test]
    fn decibels_to_amplitude() {
        assert_eq!(Decibels(0.0).to_amplitude(), 1.0);
        assert!(approx_eq!(
            f64,
            Decibels(-20.0).to_amplitude(),
            0.1,
            epsilon = 1e-12
        ));
        assert!(approx_eq!(
            f64,
            Decibels(-60.0).to_amplitude(),
            0.001,
            epsilon = 1e-12
        ));
        assert_eq!(Decibels(6.0).clamped(), Decibels(0.0));
        assert_eq!(Decibels(-100.0).clamped(), Decibels(-60.0));
    }

    #[test]
    fn defaults_match_startup_values() {
        assert_eq!(FrequencyHz::default().0, 220.0);
        assert_eq!(Decibels::default().0, -12.0);
        assert_eq!(SampleRate::default().0, 44_100);
    }
}
