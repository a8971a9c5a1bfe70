// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! [Engine] is what the audio callback owns, and [EngineHandle] is what
//! everyone else holds.
//!
//! The two sides share only lock-free state: the [ControlState] atomics, a
//! status block, and a pair of bounded channels. The audio side never blocks
//! on either channel.

use crate::{
    control::ControlState,
    error::{EngineError, GridError},
    export::{ExportPhase, ExportProgress, ExportSequencer},
    grid::{Axis, GridDimensions, WaveformStore},
    resampler::ResamplingAdapter,
    smoother::{auto_browse, ParameterSmoother, SmoothedState},
    source::{AudioSource, RenderParameters, WavetableSource},
    types::prelude::*,
};
use crossbeam::atomic::AtomicCell;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use delegate::delegate;
use std::{fmt::Debug, sync::Arc};

/// Requests that travel from an [EngineHandle] to its [Engine].
#[derive(Debug)]
pub enum EngineCommand {
    #[allow(missing_docs)]
    StartExport,
    #[allow(missing_docs)]
    StopExport,
    /// Play this store from now on.
    SetGrid(Arc<dyn WaveformStore>),
}

/// What the audio thread publishes about itself.
#[derive(Debug, Default)]
pub struct EngineStatus {
    exporting: AtomicCell<bool>,
    dimension_x: AtomicCell<usize>,
    dimension_y: AtomicCell<usize>,
    dimension_z: AtomicCell<usize>,
}
impl EngineStatus {
    fn new_with(dimensions: GridDimensions) -> Self {
        let r = Self::default();
        r.set_dimensions(dimensions);
        r
    }

    #[allow(missing_docs)]
    pub fn is_exporting(&self) -> bool {
        self.exporting.load()
    }

    /// The shape of the grid the engine is currently playing.
    pub fn dimensions(&self) -> GridDimensions {
        GridDimensions::new(
            self.dimension_x.load(),
            self.dimension_y.load(),
            self.dimension_z.load(),
        )
    }

    fn set_dimensions(&self, dimensions: GridDimensions) {
        self.dimension_x.store(dimensions.x);
        self.dimension_y.store(dimensions.y);
        self.dimension_z.store(dimensions.z);
    }
}

/// The UI-side view of an [Engine]. Cheap to clone, and safe to use from any
/// thread.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    control: Arc<ControlState>,
    status: Arc<EngineStatus>,
    commands: Sender<EngineCommand>,
    retired: Receiver<Arc<dyn WaveformStore>>,
}
impl EngineHandle {
    /// The shared control surface.
    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    delegate! {
        to self.control {
            /// Output level, clamped to [Decibels::range()].
            pub fn set_volume(&self, volume: Decibels);
            /// Target pitch. Playback glides toward it.
            pub fn set_frequency(&self, frequency: FrequencyHz);
            /// True to morph in 3-D, false to browse along one axis.
            pub fn set_grid_mode(&self, grid_mode: bool);
            /// False snaps positions to the nearest waveform.
            pub fn set_interpolate(&self, interpolate: bool);
            #[allow(missing_docs)]
            pub fn set_morph(&self, axis: Axis, value: ParameterType);
            #[allow(missing_docs)]
            pub fn set_browse(&self, browse: ParameterType);
            /// Auto-browse rate, in traversals of the grid per second.
            pub fn set_browse_speed(&self, speed: ParameterType);
            #[allow(missing_docs)]
            pub fn set_play_enabled(&self, play_enabled: bool);
            /// Rounds the stored positions while snapping with auto-browse off.
            pub fn refresh_snap(&self);
        }
        to self.status {
            /// True from the time the engine takes up an export until it ends.
            pub fn is_exporting(&self) -> bool;
            /// The shape of the grid the engine is currently playing.
            pub fn dimensions(&self) -> GridDimensions;
        }
    }

    /// Points the morph coordinates at the waveform with this linear index.
    pub fn select_waveform(&self, index: usize) {
        self.control.select_waveform(index, self.dimensions());
    }

    /// The linear index of the cell nearest the morph coordinates.
    pub fn nearest_waveform(&self) -> usize {
        self.control.nearest_waveform(self.dimensions())
    }

    /// Moves one morph coordinate by `delta`, wrapping around its axis.
    pub fn nudge_morph(&self, axis: Axis, delta: ParameterType) {
        self.control.nudge_morph(axis, delta, self.dimensions());
    }

    /// Asks the engine to begin an export sweep. Redundant requests are
    /// ignored by the engine.
    pub fn start_export(&self) {
        self.send_control_command(EngineCommand::StartExport);
    }

    /// Asks the engine to abandon an export and restore live playback.
    pub fn stop_export(&self) {
        self.send_control_command(EngineCommand::StopExport);
    }

    /// Hands the engine a new store to play. The store it replaces comes back
    /// to this side and is dropped during a later call, off the audio thread.
    pub fn set_grid(&self, grid: Arc<dyn WaveformStore>) -> Result<(), EngineError> {
        self.drop_retired_grids();
        let dimensions = grid.dimensions();
        if grid.is_empty() {
            return Err(GridError::EmptyDimension {
                x: dimensions.x,
                y: dimensions.y,
                z: dimensions.z,
            }
            .into());
        }
        self.commands
            .try_send(EngineCommand::SetGrid(grid))
            .map_err(|_| EngineError::CommandQueueFull)
    }

    /// Releases any stores the engine has finished with.
    pub fn drop_retired_grids(&self) -> usize {
        self.retired.try_iter().count()
    }

    fn send_control_command(&self, command: EngineCommand) {
        match self.commands.try_send(command) {
            Ok(_) => {}
            Err(TrySendError::Full(command)) => {
                log::warn!("Engine command queue is full; dropped {command:?}")
            }
            Err(TrySendError::Disconnected(command)) => {
                log::warn!("Engine is gone; dropped {command:?}")
            }
        }
    }
}

/// The real-time half: turns the control surface into audio, one device
/// buffer at a time. [Engine::render()] never allocates, locks, or blocks.
pub struct Engine {
    control: Arc<ControlState>,
    status: Arc<EngineStatus>,
    commands: Receiver<EngineCommand>,
    retired: Sender<Arc<dyn WaveformStore>>,

    smoother: ParameterSmoother,
    adapter: ResamplingAdapter<WavetableSource>,
    export: ExportSequencer,

    // Waits here while the retired queue is full, holding up later commands.
    deferred_grid: Option<Arc<dyn WaveformStore>>,
}
impl Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("control", &self.control)
            .field("smoother", &self.smoother)
            .field("adapter", &"(skipped)")
            .field("export", &self.export)
            .finish()
    }
}
impl Engine {
    /// How many commands may wait for the audio thread.
    pub const COMMAND_CAPACITY: usize = 16;

    /// How many replaced stores may wait to be dropped by the UI side. One
    /// per queued command, so a burst of swaps doesn't stall.
    pub const RETIRED_CAPACITY: usize = Self::COMMAND_CAPACITY;

    /// Builds an engine with default controls that plays `store`.
    pub fn new_with(store: Arc<dyn WaveformStore>) -> Result<(Self, EngineHandle), EngineError> {
        Self::new_with_control(store, Arc::new(ControlState::default()))
    }

    /// Builds an engine that plays `store` and reads `control`.
    pub fn new_with_control(
        store: Arc<dyn WaveformStore>,
        control: Arc<ControlState>,
    ) -> Result<(Self, EngineHandle), EngineError> {
        let dimensions = store.dimensions();
        if store.is_empty() {
            return Err(GridError::EmptyDimension {
                x: dimensions.x,
                y: dimensions.y,
                z: dimensions.z,
            }
            .into());
        }
        let adapter = ResamplingAdapter::new_with(WavetableSource::new_with(store))?;
        let mut smoother = ParameterSmoother::default();
        smoother.jump_to_frequency(control.frequency());

        let (command_sender, command_receiver) = crossbeam_channel::bounded(Self::COMMAND_CAPACITY);
        let (retired_sender, retired_receiver) = crossbeam_channel::bounded(Self::RETIRED_CAPACITY);
        let status = Arc::new(EngineStatus::new_with(dimensions));

        let engine = Self {
            control: Arc::clone(&control),
            status: Arc::clone(&status),
            commands: command_receiver,
            retired: retired_sender,
            smoother,
            adapter,
            export: Default::default(),
            deferred_grid: None,
        };
        let handle = EngineHandle {
            control,
            status,
            commands: command_sender,
            retired: retired_receiver,
        };
        Ok((engine, handle))
    }

    /// Fills `out` with mono audio for a device running at `output_rate`.
    pub fn render(&mut self, out: &mut [SampleType], output_rate: SampleRate) {
        self.handle_commands(output_rate);

        let dimensions = self.adapter.source().store().dimensions();
        let values = match self.export.driven_values() {
            Some(driven) => *driven,
            None => self.control.load(),
        };
        let exporting = self.export.is_active();
        let smoothed = if exporting {
            self.smoother.update_without_glide(&values, dimensions)
        } else {
            self.smoother.update(&values, dimensions)
        };

        let muted = self.export.is_muting() || (!exporting && !values.play_enabled);
        self.adapter.source_mut().set_parameters(RenderParameters {
            position: smoothed.position,
            gain: values.volume.clamped().to_amplitude(),
            muted,
        });
        self.adapter
            .set_ratio(ResamplingAdapter::<WavetableSource>::ratio_for(
                output_rate,
                smoothed.frequency,
            ));
        self.adapter.pull(out);
        // Conversion can ring slightly past the source's clamp.
        out.iter_mut().for_each(|s| *s = s.clamp(-1.0, 1.0));
        let native_frames = self.adapter.source_mut().take_frames_generated();

        if exporting {
            let progress = self.export.advance(
                native_frames,
                self.adapter.source_mut().cursor_mut(),
                dimensions.len(),
            );
            match progress {
                ExportProgress::Finished => self.stop_export(output_rate),
                ExportProgress::Continuing => {
                    if let Some(driven) = self.export.driven_values() {
                        self.control.set_browse(driven.browse);
                    }
                }
            }
        } else if values.play_enabled && !values.grid_mode && values.browse_speed > 0.0 {
            self.control.set_browse(auto_browse(
                values.browse,
                values.browse_speed,
                out.len(),
                output_rate,
                dimensions.len(),
            ));
        }
        self.status.exporting.store(self.export.is_active());
    }

    /// The shared control surface.
    pub fn control(&self) -> &Arc<ControlState> {
        &self.control
    }

    #[allow(missing_docs)]
    pub fn export_phase(&self) -> ExportPhase {
        self.export.phase()
    }

    /// What the last [Engine::render()] actually played with.
    pub fn smoothed_state(&self) -> &SmoothedState {
        self.smoother.state()
    }

    #[allow(missing_docs)]
    pub fn store(&self) -> &Arc<dyn WaveformStore> {
        self.adapter.source().store()
    }

    fn handle_commands(&mut self, output_rate: SampleRate) {
        let mut blocked = false;
        if let Some(store) = self.deferred_grid.take() {
            blocked = !self.swap_grid(store);
        }
        while !blocked {
            let Ok(command) = self.commands.try_recv() else {
                break;
            };
            match command {
                EngineCommand::StartExport => self.start_export(output_rate),
                EngineCommand::StopExport => self.stop_export(output_rate),
                EngineCommand::SetGrid(store) => blocked = !self.swap_grid(store),
            }
        }
        self.status.exporting.store(self.export.is_active());
    }

    /// Export always begins from a converter with nothing in it, so that what
    /// played before can't leak into the recording.
    fn start_export(&mut self, output_rate: SampleRate) {
        if self.export.is_active() {
            return;
        }
        self.export.start(
            &self.control,
            self.adapter.source_mut().cursor_mut(),
            &mut self.smoother,
        );
        self.reset_adapter(output_rate);
    }

    fn stop_export(&mut self, output_rate: SampleRate) {
        if !self.export.is_active() {
            return;
        }
        self.export.stop(
            &self.control,
            self.adapter.source_mut().cursor_mut(),
            &mut self.smoother,
        );
        self.reset_adapter(output_rate);
    }

    fn reset_adapter(&mut self, output_rate: SampleRate) {
        self.adapter
            .reset(ResamplingAdapter::<WavetableSource>::ratio_for(
                output_rate,
                self.smoother.state().frequency,
            ));
    }

    /// Installs `store` and sends the old one back for the UI side to drop.
    /// Returns false, keeping `store` for later, if there's no room to send.
    fn swap_grid(&mut self, store: Arc<dyn WaveformStore>) -> bool {
        if self.retired.is_full() {
            self.deferred_grid = Some(store);
            return false;
        }
        self.status.set_dimensions(store.dimensions());
        let old = self.adapter.source_mut().replace_store(store);
        // Only fails once the handle is gone, when nobody is listening anyway.
        let _ = self.retired.try_send(old);
        true
    }
}
