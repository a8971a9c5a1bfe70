// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Persistent configuration for the audio device.

use crate::{audio::DeviceSelection, traits::HasSettings};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use wavemorph_core::types::WAVE_LEN;

/// Contains persistent audio settings.
#[derive(Debug, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct AudioSettings {
    device: DeviceSelection,

    /// The size, in frames, of a single group of frames in the audio buffer.
    /// https://www.alsa-project.org/wiki/FramesPeriods
    #[derivative(Default(value = "AudioSettings::DEFAULT_PERIOD_SIZE"))]
    period_size: usize,

    #[serde(skip)]
    has_been_saved: bool,
}
impl HasSettings for AudioSettings {
    fn has_been_saved(&self) -> bool {
        self.has_been_saved
    }

    fn needs_save(&mut self) {
        self.has_been_saved = false;
    }

    fn mark_clean(&mut self) {
        self.has_been_saved = true;
    }
}
impl AudioSettings {
    /// Two waveform cycles. At 44.1KHz that's 11.6 milliseconds, which is on
    /// the upper edge of perceptible latency.
    pub const DEFAULT_PERIOD_SIZE: usize = WAVE_LEN * 2;

    /// Which output device to open.
    pub fn device(&self) -> DeviceSelection {
        self.device
    }

    #[allow(missing_docs)]
    pub fn set_device(&mut self, device: DeviceSelection) {
        if device != self.device {
            self.device = device;
            self.needs_save();
        }
    }

    /// The number of frames to ask the device for per callback. The device
    /// may not honor it.
    pub fn period_size(&self) -> usize {
        self.period_size
    }

    #[allow(missing_docs)]
    pub fn set_period_size(&mut self, period_size: usize) {
        let period_size = period_size.max(1);
        if period_size != self.period_size {
            self.period_size = period_size;
            self.needs_save();
        }
    }
}
