// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The bank of stored waveforms that the engine morphs between.
//!
//! A grid is a 3-D array of single-cycle waveforms with dimensions
//! `x`×`y`×`z`. A waveform is addressed either by its cell coordinates or by
//! its linear index `z*x_len*y_len + y*x_len + x`. The linear indices also
//! form the 1-D "browse" axis used outside grid mode.

use crate::{error::GridError, types::prelude::*};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use strum_macros::{Display, EnumCount, EnumIter, FromRepr};

/// One stored cycle.
pub type Waveform = [SampleType; WAVE_LEN];

/// The three morph axes of a grid.
#[derive(Clone, Copy, Debug, Display, EnumCount, EnumIter, FromRepr, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// The size of each grid axis.
#[derive(Clone, Copy, Debug, Derivative, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct GridDimensions {
    #[derivative(Default(value = "3"))]
    #[allow(missing_docs)]
    pub x: usize,
    #[derivative(Default(value = "3"))]
    #[allow(missing_docs)]
    pub y: usize,
    #[derivative(Default(value = "3"))]
    #[allow(missing_docs)]
    pub z: usize,
}
impl GridDimensions {
    #[allow(missing_docs)]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// The total number of waveforms, which is also the period of the browse
    /// axis.
    pub const fn len(&self) -> usize {
        self.x * self.y * self.z
    }

    #[allow(missing_docs)]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The period of one morph axis.
    pub const fn axis_len(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Cell coordinates to linear index. Coordinates are expected to be
    /// in range already.
    pub const fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        z * self.x * self.y + y * self.x + x
    }

    /// Linear index to cell coordinates, wrapping indices past the end.
    pub const fn coordinates(&self, index: usize) -> (usize, usize, usize) {
        (
            index % self.x,
            (index / self.x) % self.y,
            (index / (self.x * self.y)) % self.z,
        )
    }

    fn validate(&self) -> Result<(), GridError> {
        if self.is_empty() {
            Err(GridError::EmptyDimension {
                x: self.x,
                y: self.y,
                z: self.z,
            })
        } else {
            Ok(())
        }
    }
}

/// Read-only access to a bank of waveforms. The engine always wraps indices
/// before asking, so implementations may assume `index < self.len()`.
pub trait WaveformStore: Send + Sync + Debug {
    /// The shape of the grid.
    fn dimensions(&self) -> GridDimensions;

    /// The waveform at the given linear index.
    fn waveform(&self, index: usize) -> &Waveform;

    /// The number of waveforms.
    fn len(&self) -> usize {
        self.dimensions().len()
    }

    /// Whether there are no waveforms at all. A well-formed store never is.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An owned [WaveformStore].
#[derive(Clone, PartialEq)]
pub struct WaveformGrid {
    dimensions: GridDimensions,
    waveforms: Vec<Waveform>,
}
impl Debug for WaveformGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformGrid")
            .field("dimensions", &self.dimensions)
            .field("waveforms", &"(skipped)")
            .finish()
    }
}
impl WaveformStore for WaveformGrid {
    fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    fn waveform(&self, index: usize) -> &Waveform {
        &self.waveforms[index]
    }
}
impl WaveformGrid {
    /// A grid of silent waveforms.
    pub fn new(dimensions: GridDimensions) -> Result<Self, GridError> {
        dimensions.validate()?;
        Ok(Self {
            dimensions,
            waveforms: vec![[0.0; WAVE_LEN]; dimensions.len()],
        })
    }

    /// Builds each waveform by calling `f(index, phase)`, where `phase` is the
    /// position in the cycle from 0.0 (inclusive) to 1.0 (exclusive).
    pub fn from_fn<F>(dimensions: GridDimensions, mut f: F) -> Result<Self, GridError>
    where
        F: FnMut(usize, f64) -> SampleType,
    {
        let mut r = Self::new(dimensions)?;
        for (index, waveform) in r.waveforms.iter_mut().enumerate() {
            for (i, sample) in waveform.iter_mut().enumerate() {
                *sample = f(index, i as f64 / WAVE_LEN as f64);
            }
        }
        Ok(r)
    }

    /// Replaces one waveform.
    pub fn set_waveform(&mut self, index: usize, waveform: &Waveform) -> Result<(), GridError> {
        let len = self.waveforms.len();
        let slot = self
            .waveforms
            .get_mut(index)
            .ok_or(GridError::IndexOutOfRange { index, len })?;
        slot.copy_from_slice(waveform);
        Ok(())
    }
}
