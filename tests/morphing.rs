// Copyright (c) 2024 Mike Tsao. All rights reserved.

use float_cmp::approx_eq;
use more_asserts::{assert_ge, assert_le};
use std::sync::Arc;
use wavemorph::{
    bank::demo_grid,
    engine::{crossfade, ParameterSmoother, RenderParameters, WavetableSource},
    prelude::*,
};

fn play_one(grid: &WaveformGrid, values: &ControlValues, frames: usize) -> Vec<SampleType> {
    let position = ParameterSmoother::resolve_position(values, grid.dimensions());
    let mut source = WavetableSource::new_with(Arc::new(grid.clone()));
    source.set_parameters(RenderParameters {
        position,
        gain: values.volume.clamped().to_amplitude(),
        muted: false,
    });
    let mut out = vec![0.0; frames];
    source.pull(&mut out);
    out
}

#[test]
fn browse_between_two_waveforms() {
    let grid = demo_grid(GridDimensions::new(3, 3, 3)).unwrap();
    let values = ControlValues {
        volume: Decibels(0.0),
        frequency: FrequencyHz(220.0),
        grid_mode: false,
        interpolate: true,
        browse: 2.3,
        play_enabled: true,
        ..Default::default()
    };
    let out = play_one(&grid, &values, 1);
    let expected = crossfade(grid.waveform(2)[0], grid.waveform(3 % 27)[0], 0.3);
    assert!(approx_eq!(f64, out[0], expected, epsilon = 1e-12));
}

#[test]
fn browse_wraps_from_last_to_first() {
    let grid = demo_grid(GridDimensions::default()).unwrap();
    let values = ControlValues {
        volume: Decibels(0.0),
        browse: -0.25,
        ..Default::default()
    };
    let out = play_one(&grid, &values, WAVE_LEN);
    for (cursor, sample) in out.iter().enumerate() {
        let expected = crossfade(grid.waveform(26)[cursor], grid.waveform(0)[cursor], 0.75);
        assert!(approx_eq!(f64, *sample, expected, epsilon = 1e-12));
    }
}

#[test]
fn grid_mode_at_cell_centers_matches_stored_waveforms() {
    let dims = GridDimensions::new(2, 3, 4);
    let grid = demo_grid(dims).unwrap();
    for index in [0, 5, 13, 23] {
        let (x, y, z) = dims.coordinates(index);
        let values = ControlValues {
            volume: Decibels(0.0),
            grid_mode: true,
            morph: [x as f64, y as f64, z as f64],
            ..Default::default()
        };
        assert_eq!(
            play_one(&grid, &values, WAVE_LEN).as_slice(),
            grid.waveform(index).as_slice()
        );
    }
}

#[test]
fn snapping_picks_the_nearest_waveform() {
    let dims = GridDimensions::default();
    let grid = demo_grid(dims).unwrap();
    let values = ControlValues {
        volume: Decibels(0.0),
        interpolate: false,
        grid_mode: true,
        morph: [1.4, 2.6, -0.2],
        ..Default::default()
    };
    assert_eq!(
        play_one(&grid, &values, WAVE_LEN).as_slice(),
        grid.waveform(dims.linear_index(1, 0, 0)).as_slice()
    );
}

#[test]
fn volume_scales_and_never_clips_past_full_scale() {
    let grid = demo_grid(GridDimensions::default()).unwrap();
    let loud = ControlValues {
        volume: Decibels(0.0),
        browse: 13.5,
        ..Default::default()
    };
    let quiet = ControlValues {
        volume: Decibels(-20.0),
        ..loud
    };
    let loud = play_one(&grid, &loud, WAVE_LEN);
    let quiet = play_one(&grid, &quiet, WAVE_LEN);
    for (l, q) in loud.iter().zip(quiet.iter()) {
        assert_le!(l.abs(), 1.0);
        assert!(approx_eq!(f64, *q, l * 0.1, epsilon = 1e-12));
    }
}

/// The UI thread may write anything at any time; the audio thread must keep
/// producing bounded, finite output.
#[test]
fn hostile_control_changes_stay_bounded() {
    let (mut engine, handle) =
        Engine::new_with(Arc::new(demo_grid(GridDimensions::default()).unwrap())).unwrap();
    handle.set_play_enabled(true);

    let audio = std::thread::spawn(move || {
        let mut out = [0.0; 256];
        for i in 0..400 {
            let rate = if i % 2 == 0 { 44_100 } else { 96_000 };
            engine.render(&mut out, SampleRate(rate));
            assert!(out.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        }
    });

    let values = [f64::NAN, f64::INFINITY, -1e300, -3.7, 0.0, 0.5, 26.99, 1e12];
    for i in 0..2_000 {
        let v = values[i % values.len()];
        handle.set_frequency(FrequencyHz(v));
        handle.set_volume(Decibels(v));
        handle.set_browse(v);
        handle.set_morph(Axis::X, v);
        handle.set_morph(Axis::Z, -v);
        handle.set_browse_speed(v);
        handle.set_grid_mode(i % 3 == 0);
        handle.set_interpolate(i % 5 != 0);
        if i % 97 == 0 {
            handle.start_export();
        }
        if i % 89 == 0 {
            handle.stop_export();
        }
    }
    audio.join().unwrap();
}

/// RMS of an engine playing a single pure harmonic, measured once the
/// converter has settled.
fn rms_of_harmonic(harmonic: f64, frequency: FrequencyHz, rate: SampleRate) -> f64 {
    let grid = WaveformGrid::from_fn(GridDimensions::new(1, 1, 1), |_, phase| {
        (harmonic * phase * std::f64::consts::TAU).sin()
    })
    .unwrap();
    let (mut engine, handle) = Engine::new_with(Arc::new(grid)).unwrap();
    handle.set_volume(Decibels(0.0));
    handle.set_frequency(frequency);
    handle.set_play_enabled(true);

    let renders = 200;
    let mut out = [0.0; 512];
    let mut sum = 0.0;
    let mut count = 0;
    for i in 0..renders {
        engine.render(&mut out, rate);
        if i >= renders / 2 {
            sum += out.iter().map(|s| s * s).sum::<f64>();
            count += out.len();
        }
    }
    (sum / count as f64).sqrt()
}

#[test]
fn harmonics_above_device_nyquist_are_removed() {
    // Harmonic 64 of 1kHz is 64kHz, far past 22.05kHz.
    assert_le!(
        rms_of_harmonic(64.0, FrequencyHz(1_000.0), SampleRate(44_100)),
        0.01
    );
    // So is harmonic 32 of 880Hz at 48kHz.
    assert_le!(
        rms_of_harmonic(32.0, FrequencyHz(880.0), SampleRate(48_000)),
        0.01
    );
    // Harmonic 4 (4kHz) is well inside the band and passes.
    assert_ge!(
        rms_of_harmonic(4.0, FrequencyHz(1_000.0), SampleRate(44_100)),
        0.6
    );
}
