// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Export takes over playback for a while to sweep through every waveform in
//! the grid at a fixed cadence, so that an external recorder gets a
//! deterministic rendition of the whole bank. When it's done, the live
//! controls are put back exactly as they were.
//!
//! ```text
//!   Idle --start()--> LeadIn --(position reaches 0)--> Sweeping
//!    ^                  |                                 |
//!    +-----stop()-------+------(browse hits the limit)----+
//! ```

use crate::{
    control::{ControlState, ControlValues},
    smoother::ParameterSmoother,
    source::PlaybackCursor,
    types::prelude::*,
};
use strum_macros::Display;

/// Where the sequencer is in its cycle.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum ExportPhase {
    /// Live playback.
    #[default]
    Idle,
    /// Silence before the sweep starts.
    LeadIn,
    /// Stepping through the waveforms.
    Sweeping,
}

/// Whether an export should continue after [ExportSequencer::advance()].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportProgress {
    #[allow(missing_docs)]
    Continuing,
    /// The sweep has covered every waveform; call [ExportSequencer::stop()].
    Finished,
}

/// Everything an export borrows from live playback, plus its own progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportSession {
    saved: ControlValues,
    saved_cursor: PlaybackCursor,
    saved_frequency: FrequencyHz,

    driven: ControlValues,
    position: i64,
    pending_frames: usize,
}
impl ExportSession {
    fn new_with(saved: ControlValues, cursor: PlaybackCursor, frequency: FrequencyHz) -> Self {
        Self {
            saved,
            saved_cursor: cursor,
            saved_frequency: frequency,
            driven: ExportSequencer::export_values(&saved),
            position: -ExportSequencer::LEAD_IN,
            pending_frames: 0,
        }
    }

    /// The live values at the moment export started.
    pub fn saved(&self) -> &ControlValues {
        &self.saved
    }

    /// The values export is playing with.
    pub fn driven(&self) -> &ControlValues {
        &self.driven
    }

    /// Negative during lead-in, then the number of native buffers swept.
    pub fn position(&self) -> i64 {
        self.position
    }
}

/// Runs exports. Lives on the audio thread.
#[derive(Debug, Default)]
pub struct ExportSequencer {
    session: Option<ExportSession>,
}
impl ExportSequencer {
    /// Pulls of silence before the sweep.
    pub const LEAD_IN: i64 = 1;

    /// Native buffers (cycles) spent on each waveform.
    pub const CADENCE: i64 = 8;

    /// Extra browse steps past the end of the grid before stopping. Zero
    /// gives every waveform exactly [Self::CADENCE] cycles.
    pub const SWEEP_MARGIN: usize = 0;

    /// The browse value at which a sweep over `grid_len` waveforms is done.
    pub fn sweep_limit(grid_len: usize) -> ParameterType {
        (grid_len + Self::SWEEP_MARGIN) as ParameterType
    }

    /// What export plays with: unity gain, one cycle per [WAVE_LEN] output
    /// frames, snapped browsing from the first waveform.
    pub fn export_values(live: &ControlValues) -> ControlValues {
        ControlValues {
            volume: Decibels(0.0),
            frequency: FrequencyHz::one_cycle_per_wave_len(),
            grid_mode: false,
            interpolate: false,
            morph: live.morph,
            browse: 0.0,
            browse_speed: 0.0,
            play_enabled: false,
        }
    }

    #[allow(missing_docs)]
    pub fn phase(&self) -> ExportPhase {
        match &self.session {
            None => ExportPhase::Idle,
            Some(session) if session.position < 0 => ExportPhase::LeadIn,
            Some(_) => ExportPhase::Sweeping,
        }
    }

    #[allow(missing_docs)]
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// True during lead-in, when output must be silent.
    pub fn is_muting(&self) -> bool {
        self.phase() == ExportPhase::LeadIn
    }

    #[allow(missing_docs)]
    pub fn session(&self) -> Option<&ExportSession> {
        self.session.as_ref()
    }

    /// The values that replace the live controls while active.
    pub fn driven_values(&self) -> Option<&ControlValues> {
        self.session.as_ref().map(|s| &s.driven)
    }

    /// Captures live state and takes over. Does nothing if already active.
    pub fn start(
        &mut self,
        control: &ControlState,
        cursor: &mut PlaybackCursor,
        smoother: &mut ParameterSmoother,
    ) {
        if self.session.is_some() {
            return;
        }
        let session = ExportSession::new_with(control.load(), *cursor, smoother.state().frequency);
        control.store(&session.driven);
        cursor.reset();
        smoother.jump_to_frequency(session.driven.frequency);
        self.session = Some(session);
    }

    /// Puts back everything [ExportSequencer::start()] captured. Does nothing
    /// if idle.
    pub fn stop(
        &mut self,
        control: &ControlState,
        cursor: &mut PlaybackCursor,
        smoother: &mut ParameterSmoother,
    ) {
        if let Some(session) = self.session.take() {
            control.store(&session.saved);
            *cursor = session.saved_cursor;
            smoother.jump_to_frequency(session.saved_frequency);
        }
    }

    /// Accounts for one pull that synthesized `native_frames` frames. During
    /// lead-in this counts down and holds the cursor at the cycle start.
    /// While sweeping, every [Self::CADENCE]th whole cycle moves browse to the
    /// next waveform.
    pub fn advance(
        &mut self,
        native_frames: usize,
        cursor: &mut PlaybackCursor,
        grid_len: usize,
    ) -> ExportProgress {
        let Some(session) = self.session.as_mut() else {
            return ExportProgress::Continuing;
        };
        if session.position < 0 {
            session.position += 1;
            session.pending_frames = 0;
            cursor.reset();
            return ExportProgress::Continuing;
        }

        session.pending_frames += native_frames;
        let buffers = session.pending_frames / WAVE_LEN;
        session.pending_frames %= WAVE_LEN;
        for _ in 0..buffers {
            session.position += 1;
            if session.position % Self::CADENCE == 0 {
                session.driven.browse += 1.0;
            }
        }

        if session.driven.browse >= Self::sweep_limit(grid_len) {
            ExportProgress::Finished
        } else {
            ExportProgress::Continuing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Axis;

    struct Fixture {
        control: ControlState,
        cursor: PlaybackCursor,
        smoother: ParameterSmoother,
        sequencer: ExportSequencer,
    }
    impl Fixture {
        fn new() -> Self {
            let control = ControlState::default();
            control.set_volume(Decibels(-7.0));
            control.set_frequency(FrequencyHz(330.0));
            control.set_grid_mode(true);
            control.set_interpolate(true);
            control.set_morph(Axis::X, 1.25);
            control.set_morph(Axis::Y, -0.5);
            control.set_browse(11.7);
            control.set_browse_speed(0.5);
            control.set_play_enabled(true);
            let mut cursor = PlaybackCursor::default();
            cursor.set_position(77);
            let mut smoother = ParameterSmoother::default();
            smoother.jump_to_frequency(FrequencyHz(301.0));
            Self {
                control,
                cursor,
                smoother,
                sequencer: Default::default(),
            }
        }

        fn start(&mut self) {
            self.sequencer
                .start(&self.control, &mut self.cursor, &mut self.smoother);
        }

        fn stop(&mut self) {
            self.sequencer
                .stop(&self.control, &mut self.cursor, &mut self.smoother);
        }
    }

    #[test]
    fn start_then_stop_restores_everything() {
        let mut f = Fixture::new();
        let before = f.control.load();
        f.start();
        assert_eq!(f.sequencer.phase(), ExportPhase::LeadIn);
        assert_ne!(f.control.load(), before);
        f.stop();
        assert_eq!(f.sequencer.phase(), ExportPhase::Idle);
        assert_eq!(f.control.load(), before);
        assert_eq!(f.cursor.position(), 77);
        assert_eq!(f.smoother.state().frequency, FrequencyHz(301.0));
    }

    #[test]
    fn start_installs_export_defaults() {
        let mut f = Fixture::new();
        f.start();
        let live = f.control.load();
        assert_eq!(live.volume, Decibels(0.0));
        assert_eq!(live.frequency, FrequencyHz::one_cycle_per_wave_len());
        assert!(!live.grid_mode);
        assert!(!live.interpolate);
        assert!(!live.play_enabled);
        assert_eq!(live.browse, 0.0);
        assert_eq!(live.browse_speed, 0.0);
        assert_eq!(f.cursor.position(), 0);
        assert_eq!(
            f.smoother.state().frequency,
            FrequencyHz::one_cycle_per_wave_len()
        );
        assert_eq!(f.sequencer.session().unwrap().position(), -1);
    }

    #[test]
    fn redundant_calls_are_absorbed() {
        let mut f = Fixture::new();
        let before = f.control.load();
        f.stop();
        assert_eq!(f.control.load(), before);

        f.start();
        f.control.set_volume(Decibels(-30.0));
        // A second start must not capture the export defaults as "live".
        f.start();
        f.stop();
        assert_eq!(f.control.load(), before);
        f.stop();
        assert_eq!(f.control.load(), before);
    }

    #[test]
    fn lead_in_holds_cursor_then_sweeps() {
        let mut f = Fixture::new();
        f.start();
        assert!(f.sequencer.is_muting());
        f.cursor.advance(100);
        assert_eq!(
            f.sequencer.advance(100, &mut f.cursor, 27),
            ExportProgress::Continuing
        );
        assert_eq!(f.cursor.position(), 0);
        assert_eq!(f.sequencer.phase(), ExportPhase::Sweeping);
        assert!(!f.sequencer.is_muting());
    }

    #[test]
    fn sweep_takes_cadence_buffers_per_waveform() {
        for grid_len in [1, 8, 27, 64] {
            let mut f = Fixture::new();
            f.start();
            f.sequencer.advance(0, &mut f.cursor, grid_len);
            assert_eq!(f.sequencer.phase(), ExportPhase::Sweeping);

            let mut advances = 0;
            loop {
                advances += 1;
                if f.sequencer.advance(WAVE_LEN, &mut f.cursor, grid_len)
                    == ExportProgress::Finished
                {
                    break;
                }
                assert!(advances < 10_000);
            }
            assert_eq!(
                advances,
                ExportSequencer::CADENCE as usize
                    * (grid_len + ExportSequencer::SWEEP_MARGIN),
                "grid of {grid_len}"
            );
        }
    }

    #[test]
    fn partial_buffers_accumulate() {
        let mut f = Fixture::new();
        f.start();
        f.sequencer.advance(0, &mut f.cursor, 27);
        for _ in 0..(ExportSequencer::CADENCE as usize * 4) {
            f.sequencer.advance(WAVE_LEN / 4, &mut f.cursor, 27);
        }
        let session = f.sequencer.session().unwrap();
        assert_eq!(session.position(), ExportSequencer::CADENCE);
        assert_eq!(session.driven().browse, 1.0);
    }

    #[test]
    fn browse_steps_show_up_in_driven_values() {
        let mut f = Fixture::new();
        f.start();
        f.sequencer.advance(0, &mut f.cursor, 27);
        f.sequencer
            .advance(WAVE_LEN * 2 * ExportSequencer::CADENCE as usize, &mut f.cursor, 27);
        assert_eq!(f.sequencer.driven_values().unwrap().browse, 2.0);
        assert_eq!(
            f.sequencer.session().unwrap().saved().browse,
            11.7,
            "saved values are untouched"
        );
    }
}
