// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Ready-made waveform banks.

use wavemorph_core::{
    error::GridError,
    grid::{GridDimensions, Waveform, WaveformGrid, WaveformStore},
    morph::crossfade,
    types::prelude::*,
};

/// Peak level of every demo waveform.
pub const DEMO_PEAK: SampleType = 0.9;

/// Builds a grid that shows off every axis: sine to sawtooth along X, a
/// narrowing pulse mixed in along Y, and more harmonics along Z. All
/// waveforms are band-limited and normalized to [DEMO_PEAK].
pub fn demo_grid(dimensions: GridDimensions) -> Result<WaveformGrid, GridError> {
    let mut grid = WaveformGrid::from_fn(dimensions, |index, phase| {
        let (x, y, z) = dimensions.coordinates(index);
        let harmonics = 2 + (axis_position(z, dimensions.z) * 30.0).round() as usize;

        let tone = crossfade(
            sine(phase),
            sawtooth(phase, harmonics),
            axis_position(x, dimensions.x),
        );
        let width = axis_position(y, dimensions.y);
        crossfade(tone, pulse(phase, 0.5 - 0.375 * width, harmonics), width * 0.5)
    })?;

    for index in 0..grid.len() {
        let mut waveform: Waveform = *grid.waveform(index);
        normalize(&mut waveform, DEMO_PEAK);
        grid.set_waveform(index, &waveform)?;
    }
    Ok(grid)
}

/// Where cell `index` sits along an axis of `len` cells, from 0.0 to 1.0.
fn axis_position(index: usize, len: usize) -> f64 {
    if len > 1 {
        index as f64 / (len - 1) as f64
    } else {
        0.0
    }
}

fn sine(phase: f64) -> SampleType {
    (phase * std::f64::consts::TAU).sin()
}

fn sawtooth(phase: f64, harmonics: usize) -> SampleType {
    (1..=harmonics)
        .map(|k| {
            let k = k as f64;
            let sign = if k as usize % 2 == 1 { 1.0 } else { -1.0 };
            sign * (phase * k * std::f64::consts::TAU).sin() / k
        })
        .sum::<f64>()
        * std::f64::consts::FRAC_2_PI
}

/// `duty` is the fraction of the cycle spent high.
fn pulse(phase: f64, duty: f64, harmonics: usize) -> SampleType {
    (1..=harmonics)
        .map(|k| {
            let k = k as f64;
            (k * std::f64::consts::PI * duty).sin() * (phase * k * std::f64::consts::TAU).cos() / k
        })
        .sum::<f64>()
        * std::f64::consts::FRAC_2_PI
        * 2.0
}

fn normalize(waveform: &mut Waveform, peak: SampleType) {
    let max = waveform.iter().fold(0.0f64, |m, s| m.max(s.abs()));
    if max > 0.0 {
        let scale = peak / max;
        waveform.iter_mut().for_each(|s| *s *= scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::assert_le;

    #[test]
    fn demo_grid_is_normalized() {
        let grid = demo_grid(GridDimensions::default()).unwrap();
        assert_eq!(grid.len(), 27);
        for index in 0..grid.len() {
            let peak = grid
                .waveform(index)
                .iter()
                .fold(0.0f64, |m, s| m.max(s.abs()));
            assert!(approx_eq!(f64, peak, DEMO_PEAK, epsilon = 1e-12), "#{index}");
        }
    }

    #[test]
    fn first_cell_is_a_sine() {
        let grid = demo_grid(GridDimensions::default()).unwrap();
        for (i, s) in grid.waveform(0).iter().enumerate() {
            let expected = sine(i as f64 / WAVE_LEN as f64) * DEMO_PEAK;
            assert_le!((s - expected).abs(), 1e-3);
        }
    }

    #[test]
    fn neighbors_differ() {
        let dims = GridDimensions::default();
        let grid = demo_grid(dims).unwrap();
        let a = grid.waveform(dims.linear_index(0, 0, 0));
        for (x, y, z) in [(1, 0, 0), (0, 1, 0), (2, 0, 2)] {
            let b = grid.waveform(dims.linear_index(x, y, z));
            assert!(a.iter().zip(b.iter()).any(|(a, b)| (a - b).abs() > 1e-3));
        }
    }

    #[test]
    fn single_cell_grids_work() {
        let grid = demo_grid(GridDimensions::new(1, 1, 1)).unwrap();
        assert_eq!(grid.len(), 1);
        assert!(demo_grid(GridDimensions::new(0, 1, 1)).is_err());
    }
}
