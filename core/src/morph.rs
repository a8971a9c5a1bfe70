// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Blends neighboring waveforms of a [WaveformStore] at continuous
//! coordinates.
//!
//! Coordinates are toroidal: every axis wraps, so the neighbor of the last
//! cell is the first one. All functions here are pure.

use crate::{
    grid::{Axis, WaveformStore},
    types::prelude::*,
};

/// Maps any real `value` into `[0, period)`. Negative values wrap rather than
/// truncate, and non-finite values land on zero.
pub fn wrap(value: ParameterType, period: ParameterType) -> ParameterType {
    if !value.is_finite() || period <= 0.0 {
        return 0.0;
    }
    let r = value.rem_euclid(period);
    // rem_euclid() can round up to exactly `period` for tiny negative inputs.
    if r >= period {
        0.0
    } else {
        r
    }
}

/// Linear blend from `a` (at `fraction` 0.0) to `b` (at 1.0). A zero fraction
/// returns `a` exactly.
#[inline]
pub fn crossfade(a: SampleType, b: SampleType, fraction: ParameterType) -> SampleType {
    (1.0 - fraction) * a + fraction * b
}

/// Converts `sample` to output amplitude and hard-limits it to [-1.0, 1.0].
#[inline]
pub fn apply_gain(sample: SampleType, gain: ParameterType) -> SampleType {
    let r = sample * gain;
    if r.is_nan() {
        0.0
    } else {
        r.clamp(-1.0, 1.0)
    }
}

/// The two cells on either side of a coordinate along one axis, and how far
/// the coordinate sits between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    /// The cell at or below the coordinate.
    pub index: usize,
    /// The cell after `index`, wrapped.
    pub next: usize,
    /// Distance from `index` toward `next`, in [0, 1).
    pub fraction: ParameterType,
}
impl Cell {
    /// Splits `coordinate` into cell and fraction on an axis of `len` cells.
    pub fn locate(coordinate: ParameterType, len: usize) -> Self {
        debug_assert!(len > 0);
        let wrapped = wrap(coordinate, len as ParameterType);
        let index = (wrapped.floor() as usize).min(len - 1);
        Self {
            index,
            next: (index + 1) % len,
            fraction: wrapped - index as ParameterType,
        }
    }
}

/// Where to read from the store.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MorphPosition {
    /// A point on the 1-D browse axis, which runs through every waveform in
    /// linear-index order.
    Browse(ParameterType),
    /// A point in the 3-D grid.
    Grid([ParameterType; 3]),
}
impl Default for MorphPosition {
    fn default() -> Self {
        Self::Browse(0.0)
    }
}

/// Reads one sample of the blended waveform at `position`, `cursor` samples
/// into the cycle.
pub fn sample<S: WaveformStore + ?Sized>(
    store: &S,
    position: &MorphPosition,
    cursor: usize,
) -> SampleType {
    match position {
        MorphPosition::Browse(browse) => browse_sample(store, *browse, cursor),
        MorphPosition::Grid(morph) => grid_sample(store, morph, cursor),
    }
}

/// 1-D crossfade between the two waveforms around `browse`.
pub fn browse_sample<S: WaveformStore + ?Sized>(
    store: &S,
    browse: ParameterType,
    cursor: usize,
) -> SampleType {
    let cell = Cell::locate(browse, store.len());
    let cursor = cursor % WAVE_LEN;
    crossfade(
        store.waveform(cell.index)[cursor],
        store.waveform(cell.next)[cursor],
        cell.fraction,
    )
}

/// Trilinear blend of the eight waveforms around `morph`: along X first, then
/// Y within each Z plane, then Z.
pub fn grid_sample<S: WaveformStore + ?Sized>(
    store: &S,
    morph: &[ParameterType; 3],
    cursor: usize,
) -> SampleType {
    let dims = store.dimensions();
    let x = Cell::locate(morph[Axis::X as usize], dims.x);
    let y = Cell::locate(morph[Axis::Y as usize], dims.y);
    let z = Cell::locate(morph[Axis::Z as usize], dims.z);
    let cursor = cursor % WAVE_LEN;
    let at = |xi: usize, yi: usize, zi: usize| {
        store.waveform(dims.linear_index(xi, yi, zi))[cursor]
    };

    let v0 = crossfade(at(x.index, y.index, z.index), at(x.next, y.index, z.index), x.fraction);
    let v1 = crossfade(at(x.index, y.next, z.index), at(x.next, y.next, z.index), x.fraction);
    let plane0 = crossfade(v0, v1, y.fraction);

    let v2 = crossfade(at(x.index, y.index, z.next), at(x.next, y.index, z.next), x.fraction);
    let v3 = crossfade(at(x.index, y.next, z.next), at(x.next, y.next, z.next), x.fraction);
    let plane1 = crossfade(v2, v3, y.fraction);

    crossfade(plane0, plane1, z.fraction)
}
