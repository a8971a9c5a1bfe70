// Copyright (c) 2024 Mike Tsao. All rights reserved.

use more_asserts::{assert_ge, assert_le};
use std::sync::Arc;
use wavemorph::{
    bank::demo_grid,
    control::{ExportPhase, ExportSequencer},
    prelude::*,
};

const BUFFER_SIZE: usize = 256;

/// Runs an export to completion and returns everything it rendered.
fn run_export(engine: &mut Engine, handle: &EngineHandle, rate: SampleRate) -> Vec<SampleType> {
    handle.start_export();
    let mut rendered = Vec::default();
    let mut out = [0.0; BUFFER_SIZE];
    loop {
        engine.render(&mut out, rate);
        rendered.extend_from_slice(&out);
        if !handle.is_exporting() {
            break;
        }
        assert_le!(rendered.len(), 10_000_000, "export never finished");
    }
    rendered
}

#[test]
fn export_length_follows_grid_size() {
    for dims in [
        GridDimensions::new(1, 1, 1),
        GridDimensions::new(2, 2, 2),
        GridDimensions::new(3, 3, 3),
        GridDimensions::new(4, 2, 3),
    ] {
        let (mut engine, handle) = Engine::new_with(Arc::new(demo_grid(dims).unwrap())).unwrap();
        let rendered = run_export(&mut engine, &handle, SampleRate(44_100));

        let expected = (ExportSequencer::CADENCE as usize
            * (dims.len() + ExportSequencer::SWEEP_MARGIN)
            * WAVE_LEN) as f64;
        let frames = rendered.len() as f64;
        assert_ge!(frames, expected * 0.98, "{dims:?}");
        assert_le!(frames, expected * 1.02 + 3.0 * BUFFER_SIZE as f64, "{dims:?}");
    }
}

#[test]
fn export_ignores_what_played_before() {
    let grid: Arc<dyn WaveformStore> = Arc::new(demo_grid(GridDimensions::default()).unwrap());

    let (mut fresh, fresh_handle) = Engine::new_with(Arc::clone(&grid)).unwrap();

    // Play loudly and at a high pitch first, so the converter is full of
    // live audio when the export begins.
    let (mut busy, busy_handle) = Engine::new_with(Arc::clone(&grid)).unwrap();
    busy_handle.set_volume(Decibels(0.0));
    busy_handle.set_frequency(FrequencyHz(3_000.0));
    busy_handle.set_grid_mode(true);
    busy_handle.set_morph(Axis::Y, 1.7);
    busy_handle.set_play_enabled(true);
    let mut out = [0.0; BUFFER_SIZE];
    for _ in 0..20 {
        busy.render(&mut out, SampleRate(44_100));
    }
    assert!(out.iter().any(|s| *s != 0.0));

    busy_handle.set_volume(Decibels(-45.0));
    busy_handle.set_browse(20.2);
    busy_handle.set_browse_speed(3.0);
    let busy_before = busy_handle.control().load();

    let a = run_export(&mut fresh, &fresh_handle, SampleRate(44_100));
    let b = run_export(&mut busy, &busy_handle, SampleRate(44_100));
    assert!(b[..BUFFER_SIZE].iter().all(|s| *s == 0.0), "lead-in is silent");
    assert_eq!(a, b);
    assert!(a.iter().any(|s| *s != 0.0));
    assert_eq!(busy_handle.control().load(), busy_before);
}

#[test]
fn export_walks_the_browse_axis_in_order() {
    let (mut engine, handle) =
        Engine::new_with(Arc::new(demo_grid(GridDimensions::default()).unwrap())).unwrap();
    handle.start_export();
    let mut out = [0.0; BUFFER_SIZE];
    let mut seen = Vec::default();
    while seen.len() < 2 || handle.is_exporting() {
        engine.render(&mut out, SampleRate(48_000));
        if !handle.is_exporting() {
            break;
        }
        let browse = handle.control().browse();
        if seen.last() != Some(&browse) {
            seen.push(browse);
        }
    }
    let expected: Vec<f64> = (0..27).map(|i| i as f64).collect();
    assert_eq!(seen, expected);
}

#[test]
fn restarting_after_an_export_works() {
    let (mut engine, handle) =
        Engine::new_with(Arc::new(demo_grid(GridDimensions::new(1, 1, 2)).unwrap())).unwrap();
    let first = run_export(&mut engine, &handle, SampleRate(44_100));
    assert!(!handle.is_exporting());
    let second = run_export(&mut engine, &handle, SampleRate(44_100));
    assert_eq!(engine.export_phase(), ExportPhase::Idle);
    let len = first.len().min(second.len());
    assert_ge!(len, ExportSequencer::CADENCE as usize * 2 * WAVE_LEN * 9 / 10);
}
