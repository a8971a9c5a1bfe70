// Copyright (c) 2024 Mike Tsao. All rights reserved.

#![warn(missing_docs)]

//! The `wavemorph` crate plays a grid of single-cycle waveforms, morphing
//! smoothly between neighbors as its controls change, and can sweep the whole
//! grid for recording.

pub mod bank;

pub mod control {
    //! The control surface.
    //!
    //! Every control is a lock-free cell that any thread may write at any time.
    //! Out-of-range values saturate rather than fail, and periodic coordinates
    //! (morph X/Y/Z and browse) accept any finite value and wrap when used.
    //! [EngineHandle] bundles the controls with export and grid commands.

    pub use wavemorph_core::{
        control::{ControlState, ControlValues},
        engine::EngineHandle,
        export::{ExportPhase, ExportSequencer},
        grid::Axis,
    };

    /// The most commonly used imports.
    pub mod prelude {
        pub use super::{Axis, ControlState, ControlValues, EngineHandle};
    }
}

pub mod engine {
    //! The real-time audio path.

    pub use wavemorph_core::{
        engine::{Engine, EngineCommand, EngineStatus},
        error::EngineError,
        morph::{crossfade, wrap, MorphPosition},
        resampler::ResamplingAdapter,
        smoother::{ParameterSmoother, SmoothedState},
        source::{AudioSource, PlaybackCursor, RenderParameters, WavetableSource},
    };

    /// The most commonly used imports.
    pub mod prelude {
        pub use super::{AudioSource, Engine, EngineError};
    }
}

pub mod grid {
    //! Waveform storage.
    pub use wavemorph_core::{
        error::GridError,
        grid::{GridDimensions, Waveform, WaveformGrid, WaveformStore},
    };

    /// The most commonly used imports.
    pub mod prelude {
        pub use super::{GridDimensions, WaveformGrid, WaveformStore};
    }
}

pub mod services {
    //! Services talk to the outside world. [AudioService] owns the output
    //! device.
    pub use wavemorph_services::{
        AudioService, AudioSettings, DeviceError, DeviceSelection, HasSettings,
    };

    /// The most commonly used imports.
    pub mod prelude {
        pub use super::{AudioService, AudioSettings, DeviceSelection};
    }
}

pub mod types {
    //! Common data types used throughout the system.
    pub use wavemorph_core::types::*;
}

/// A collection of imports that are useful to users of this crate. `use
/// wavemorph::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::control::prelude::*;
    pub use super::engine::prelude::*;
    pub use super::grid::prelude::*;
    pub use super::services::prelude::*;
    pub use super::types::prelude::*;
}
