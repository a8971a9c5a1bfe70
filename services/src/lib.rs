// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! wavemorph services: the output device and its settings.

pub use audio::{AudioService, DeviceError, DeviceSelection};
pub use settings::AudioSettings;
pub use traits::HasSettings;

mod audio;
mod settings;
mod traits;

pub mod prelude {
    pub use crate::{AudioService, AudioSettings, DeviceError, DeviceSelection, HasSettings};
}
