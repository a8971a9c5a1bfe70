// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The live control surface shared between the UI thread and the audio
//! thread.
//!
//! Every field is an independent lock-free cell. Readers on the audio thread
//! may observe a mix of old and new fields during a burst of UI edits; that's
//! harmless because each value is clamped or wrapped on use and the smoother
//! hides short-lived inconsistencies.

use crate::{
    grid::{Axis, GridDimensions},
    morph::wrap,
    types::prelude::*,
};
use crossbeam::atomic::AtomicCell;
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A plain copy of every control field at one instant.
#[derive(Clone, Copy, Debug, Derivative, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControlValues {
    /// Output level.
    pub volume: Decibels,
    /// Target playback pitch.
    pub frequency: FrequencyHz,
    /// Morph through the 3-D grid rather than along the browse axis.
    pub grid_mode: bool,
    /// Blend between neighboring waveforms. When false, coordinates snap to
    /// the nearest cell.
    #[derivative(Default(value = "true"))]
    pub interpolate: bool,
    /// Grid coordinates, each periodic in its axis length.
    pub morph: [ParameterType; 3],
    /// Browse coordinate, periodic in the grid length.
    pub browse: ParameterType,
    /// Full browse-axis traversals per second while auto-browsing.
    pub browse_speed: ParameterType,
    /// Whether live playback is audible.
    pub play_enabled: bool,
}
impl ControlValues {
    /// The morph coordinate for one axis.
    pub fn morph(&self, axis: Axis) -> ParameterType {
        self.morph[axis as usize]
    }
}

/// The shared, continuously mutable control fields.
#[derive(Derivative)]
#[derivative(Default)]
pub struct ControlState {
    #[derivative(Default(value = "AtomicCell::new(Decibels::default().0)"))]
    volume_db: AtomicCell<ParameterType>,
    #[derivative(Default(value = "AtomicCell::new(FrequencyHz::default().0)"))]
    frequency: AtomicCell<ParameterType>,
    grid_mode: AtomicCell<bool>,
    #[derivative(Default(value = "AtomicCell::new(true)"))]
    interpolate: AtomicCell<bool>,
    morph_x: AtomicCell<ParameterType>,
    morph_y: AtomicCell<ParameterType>,
    morph_z: AtomicCell<ParameterType>,
    browse: AtomicCell<ParameterType>,
    browse_speed: AtomicCell<ParameterType>,
    play_enabled: AtomicCell<bool>,
}
impl Debug for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ControlState").field(&self.load()).finish()
    }
}
impl ControlState {
    /// Upper bound of [ControlState::set_browse_speed()].
    pub const MAX_BROWSE_SPEED: ParameterType = 10.0;

    /// Creates a [ControlState] holding the given values, clamped.
    pub fn new_with(values: &ControlValues) -> Self {
        let r = Self::default();
        r.set_volume(values.volume);
        r.set_frequency(values.frequency);
        r.set_grid_mode(values.grid_mode);
        r.set_interpolate(values.interpolate);
        r.set_morph(Axis::X, values.morph[0]);
        r.set_morph(Axis::Y, values.morph[1]);
        r.set_morph(Axis::Z, values.morph[2]);
        r.set_browse(values.browse);
        r.set_browse_speed(values.browse_speed);
        r.set_play_enabled(values.play_enabled);
        r
    }

    /// Reads every field.
    pub fn load(&self) -> ControlValues {
        ControlValues {
            volume: Decibels(self.volume_db.load()),
            frequency: FrequencyHz(self.frequency.load()),
            grid_mode: self.grid_mode.load(),
            interpolate: self.interpolate.load(),
            morph: [self.morph_x.load(), self.morph_y.load(), self.morph_z.load()],
            browse: self.browse.load(),
            browse_speed: self.browse_speed.load(),
            play_enabled: self.play_enabled.load(),
        }
    }

    /// Writes every field verbatim, without clamping. Used to put back a
    /// snapshot taken with [ControlState::load()].
    pub fn store(&self, values: &ControlValues) {
        self.volume_db.store(values.volume.0);
        self.frequency.store(values.frequency.0);
        self.grid_mode.store(values.grid_mode);
        self.interpolate.store(values.interpolate);
        self.morph_x.store(values.morph[0]);
        self.morph_y.store(values.morph[1]);
        self.morph_z.store(values.morph[2]);
        self.browse.store(values.browse);
        self.browse_speed.store(values.browse_speed);
        self.play_enabled.store(values.play_enabled);
    }

    #[allow(missing_docs)]
    pub fn volume(&self) -> Decibels {
        Decibels(self.volume_db.load())
    }
    /// Sets the output level, saturating at the ends of [Decibels::range()].
    pub fn set_volume(&self, volume: Decibels) {
        self.volume_db.store(volume.clamped().0);
    }

    #[allow(missing_docs)]
    pub fn frequency(&self) -> FrequencyHz {
        FrequencyHz(self.frequency.load())
    }
    /// Sets the target pitch, saturating at the ends of [FrequencyHz::range()].
    pub fn set_frequency(&self, frequency: FrequencyHz) {
        self.frequency.store(frequency.clamped().0);
    }

    #[allow(missing_docs)]
    pub fn grid_mode(&self) -> bool {
        self.grid_mode.load()
    }
    #[allow(missing_docs)]
    pub fn set_grid_mode(&self, grid_mode: bool) {
        self.grid_mode.store(grid_mode);
    }

    #[allow(missing_docs)]
    pub fn interpolate(&self) -> bool {
        self.interpolate.load()
    }
    #[allow(missing_docs)]
    pub fn set_interpolate(&self, interpolate: bool) {
        self.interpolate.store(interpolate);
    }

    #[allow(missing_docs)]
    pub fn morph(&self, axis: Axis) -> ParameterType {
        self.morph_cell(axis).load()
    }
    /// Sets one grid coordinate. Any finite value is legal; it's wrapped when
    /// used.
    pub fn set_morph(&self, axis: Axis, value: ParameterType) {
        self.morph_cell(axis).store(Self::finite_or_zero(value));
    }

    #[allow(missing_docs)]
    pub fn browse(&self) -> ParameterType {
        self.browse.load()
    }
    /// Sets the browse coordinate. Any finite value is legal; it's wrapped
    /// when used.
    pub fn set_browse(&self, browse: ParameterType) {
        self.browse.store(Self::finite_or_zero(browse));
    }

    #[allow(missing_docs)]
    pub fn browse_speed(&self) -> ParameterType {
        self.browse_speed.load()
    }
    #[allow(missing_docs)]
    pub fn set_browse_speed(&self, speed: ParameterType) {
        self.browse_speed.store(
            Self::finite_or_zero(speed).clamp(0.0, Self::MAX_BROWSE_SPEED),
        );
    }

    #[allow(missing_docs)]
    pub fn play_enabled(&self) -> bool {
        self.play_enabled.load()
    }
    #[allow(missing_docs)]
    pub fn set_play_enabled(&self, play_enabled: bool) {
        self.play_enabled.store(play_enabled);
    }

    /// Points every coordinate at the waveform with the given linear index.
    pub fn select_waveform(&self, index: usize, dimensions: GridDimensions) {
        let (x, y, z) = dimensions.coordinates(index % dimensions.len().max(1));
        self.set_morph(Axis::X, x as ParameterType);
        self.set_morph(Axis::Y, y as ParameterType);
        self.set_morph(Axis::Z, z as ParameterType);
        self.set_browse((index % dimensions.len().max(1)) as ParameterType);
    }

    /// The linear index of the grid cell nearest the current morph
    /// coordinates.
    pub fn nearest_waveform(&self, dimensions: GridDimensions) -> usize {
        let cell = |axis: Axis| {
            let len = dimensions.axis_len(axis) as ParameterType;
            wrap(self.morph(axis).round(), len) as usize
        };
        dimensions.linear_index(cell(Axis::X), cell(Axis::Y), cell(Axis::Z))
    }

    /// Moves one grid coordinate by `delta`, keeping it inside its period.
    pub fn nudge_morph(&self, axis: Axis, delta: ParameterType, dimensions: GridDimensions) {
        let len = dimensions.axis_len(axis) as ParameterType;
        self.set_morph(axis, wrap(self.morph(axis) + delta, len));
    }

    /// Rounds the stored coordinates to whole cells when interpolation is off
    /// and nothing is auto-browsing. Call after any UI edit of a coordinate.
    pub fn refresh_snap(&self) {
        if !self.interpolate() && self.browse_speed() <= 0.0 {
            self.morph_x.store(self.morph_x.load().round());
            self.morph_y.store(self.morph_y.load().round());
            self.morph_z.store(self.morph_z.load().round());
            self.browse.store(self.browse.load().round());
        }
    }

    fn morph_cell(&self, axis: Axis) -> &AtomicCell<ParameterType> {
        match axis {
            Axis::X => &self.morph_x,
            Axis::Y => &self.morph_y,
            Axis::Z => &self.morph_z,
        }
    }

    fn finite_or_zero(value: ParameterType) -> ParameterType {
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}
