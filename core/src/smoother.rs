// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Turns raw, possibly jumpy control values into values that are safe to use
//! every audio frame.

use crate::{
    control::ControlValues,
    grid::{Axis, GridDimensions},
    morph::{wrap, MorphPosition},
    types::prelude::*,
};

/// The values the audio path actually uses for one pull.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothedState {
    /// Smoothed playback pitch.
    pub frequency: FrequencyHz,
    /// Wrapped (or snapped) read position.
    pub position: MorphPosition,
}

/// Smooths frequency geometrically and resolves morph coordinates.
#[derive(Debug)]
pub struct ParameterSmoother {
    lambda: ParameterType,
    state: SmoothedState,
}
impl Default for ParameterSmoother {
    fn default() -> Self {
        Self::new_with(Self::DEFAULT_LAMBDA)
    }
}
impl ParameterSmoother {
    /// Fraction of the way (in the log domain) the frequency moves toward its
    /// target on each pull.
    pub const DEFAULT_LAMBDA: ParameterType = 0.5;

    /// `lambda` must be in (0, 1]. 1.0 disables smoothing.
    pub fn new_with(lambda: ParameterType) -> Self {
        debug_assert!(lambda > 0.0 && lambda <= 1.0);
        Self {
            lambda: lambda.clamp(f64::MIN_POSITIVE, 1.0),
            state: SmoothedState::default(),
        }
    }

    /// The most recent result.
    pub fn state(&self) -> &SmoothedState {
        &self.state
    }

    /// Advances the smoothed frequency one step toward `values.frequency` and
    /// resolves the read position.
    pub fn update(&mut self, values: &ControlValues, dimensions: GridDimensions) -> SmoothedState {
        self.smooth_frequency(values.frequency);
        self.state.position = Self::resolve_position(values, dimensions);
        self.state
    }

    /// Like [ParameterSmoother::update()], but jumps straight to the target
    /// frequency.
    pub fn update_without_glide(
        &mut self,
        values: &ControlValues,
        dimensions: GridDimensions,
    ) -> SmoothedState {
        self.jump_to_frequency(values.frequency);
        self.state.position = Self::resolve_position(values, dimensions);
        self.state
    }

    /// One geometric smoothing step: `s = s^(1-λ) * t^λ`. Gliding in the log
    /// domain keeps pitch sweeps even across octaves.
    pub fn smooth_frequency(&mut self, target: FrequencyHz) -> FrequencyHz {
        let target = target.clamped().0;
        let current = self.state.frequency.clamped().0;
        self.state.frequency =
            FrequencyHz(current.powf(1.0 - self.lambda) * target.powf(self.lambda));
        self.state.frequency
    }

    /// Sets the smoothed frequency without gliding.
    pub fn jump_to_frequency(&mut self, frequency: FrequencyHz) {
        self.state.frequency = frequency.clamped();
    }

    /// Wraps each coordinate into its period, or snaps it to the nearest cell
    /// when interpolation is off.
    pub fn resolve_position(values: &ControlValues, dimensions: GridDimensions) -> MorphPosition {
        let resolve = |value: ParameterType, len: usize| {
            let value = if values.interpolate {
                value
            } else {
                value.round()
            };
            wrap(value, len as ParameterType)
        };
        if values.grid_mode {
            MorphPosition::Grid([
                resolve(values.morph(Axis::X), dimensions.x),
                resolve(values.morph(Axis::Y), dimensions.y),
                resolve(values.morph(Axis::Z), dimensions.z),
            ])
        } else {
            MorphPosition::Browse(resolve(values.browse, dimensions.len()))
        }
    }
}

/// Where auto-browse moves `browse` after `frames` output frames at
/// `sample_rate`. `speed` is in full traversals of the browse axis per second;
/// one call never moves more than one traversal.
pub fn auto_browse(
    browse: ParameterType,
    speed: ParameterType,
    frames: usize,
    sample_rate: SampleRate,
    len: usize,
) -> ParameterType {
    let len = len as ParameterType;
    let step = (speed * frames as ParameterType / sample_rate.as_f64()).clamp(0.0, 1.0);
    wrap(browse + len * step, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::assert_lt;

    #[test]
    fn frequency_converges_monotonically_without_overshoot() {
        for &(start, target) in &[(220.0, 880.0), (10_000.0, 1.0), (1.0, 10_000.0), (440.0, 439.0)]
        {
            let mut smoother = ParameterSmoother::default();
            smoother.jump_to_frequency(FrequencyHz(start));
            let mut distance = (start - target).abs();
            let mut steps = 0;
            while distance > 1e-9 && steps < 200 {
                let f = smoother.smooth_frequency(FrequencyHz(target)).0;
                let new_distance = (f - target).abs();
                assert_lt!(new_distance, distance, "{start} -> {target} step {steps}");
                assert!(
                    (start <= target && f <= target) || (start >= target && f >= target),
                    "overshot: {start} -> {target} gave {f}"
                );
                distance = new_distance;
                steps += 1;
            }
            assert!(distance <= 1e-9, "{start} -> {target} didn't converge");
        }
    }

    #[test]
    fn geometric_step_is_halfway_in_log_domain() {
        let mut smoother = ParameterSmoother::default();
        smoother.jump_to_frequency(FrequencyHz(100.0));
        let f = smoother.smooth_frequency(FrequencyHz(400.0));
        assert!(approx_eq!(f64, f.0, 200.0, epsilon = 1e-9));
    }

    #[test]
    fn target_frequency_is_clamped() {
        let mut smoother = ParameterSmoother::new_with(1.0);
        assert_eq!(smoother.smooth_frequency(FrequencyHz(0.0)), FrequencyHz(1.0));
        assert_eq!(
            smoother.smooth_frequency(FrequencyHz(99_999.0)),
            FrequencyHz(10_000.0)
        );
    }

    #[test]
    fn interpolating_position_wraps() {
        let dims = GridDimensions::default();
        let values = ControlValues {
            browse: -0.5,
            ..Default::default()
        };
        assert_eq!(
            ParameterSmoother::resolve_position(&values, dims),
            MorphPosition::Browse(26.5)
        );

        let values = ControlValues {
            grid_mode: true,
            morph: [3.25, -0.25, 1.5],
            ..Default::default()
        };
        assert_eq!(
            ParameterSmoother::resolve_position(&values, dims),
            MorphPosition::Grid([0.25, 2.75, 1.5])
        );
    }

    #[test]
    fn snapping_position_rounds_then_wraps() {
        let dims = GridDimensions::default();
        let values = ControlValues {
            interpolate: false,
            browse: 26.6,
            ..Default::default()
        };
        assert_eq!(
            ParameterSmoother::resolve_position(&values, dims),
            MorphPosition::Browse(0.0)
        );

        let values = ControlValues {
            interpolate: false,
            grid_mode: true,
            morph: [0.4, 1.6, -0.6],
            ..Default::default()
        };
        assert_eq!(
            ParameterSmoother::resolve_position(&values, dims),
            MorphPosition::Grid([0.0, 2.0, 2.0])
        );
    }

    #[test]
    fn auto_browse_advances_and_wraps() {
        let rate = SampleRate(44_100);
        // One traversal per second, half a second's worth of frames.
        let b = auto_browse(0.0, 1.0, 22_050, rate, 27);
        assert!(approx_eq!(f64, b, 13.5, epsilon = 1e-9));

        let b = auto_browse(26.0, 1.0, 4_410, rate, 27);
        assert!(approx_eq!(f64, b, 1.7, epsilon = 1e-9));

        // A huge step is capped at one traversal, which lands where it began.
        let b = auto_browse(5.0, 10.0, 44_100, rate, 27);
        assert!(approx_eq!(f64, b, 5.0, epsilon = 1e-9));

        assert_eq!(auto_browse(5.0, 0.0, 512, rate, 27), 5.0);
    }
}
