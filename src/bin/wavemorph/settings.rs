// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The `settings` module contains [Settings], which are all the user's
//! persistent preferences.

use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};
use wavemorph::{control::ControlValues, services::AudioSettings, services::HasSettings};

/// Global preferences.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub(crate) struct Settings {
    pub(crate) audio_settings: AudioSettings,
    pub(crate) controls: ControlValues,
}
impl Settings {
    /// Reads settings from `path`, or returns defaults if there's no file
    /// there yet.
    pub(crate) fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("No settings at {path:?}; using defaults");
            return Ok(Self::default());
        }
        let mut contents = String::new();
        let mut file =
            File::open(path).map_err(|e| anyhow::format_err!("Couldn't open {path:?}: {}", e))?;
        file.read_to_string(&mut contents)
            .map_err(|e| anyhow::format_err!("Couldn't read {path:?}: {}", e))?;
        let mut settings: Self = serde_json::from_str(&contents)
            .map_err(|e| anyhow::format_err!("Couldn't parse {path:?}: {}", e))?;
        settings.mark_clean();
        log::info!("Loaded settings from {path:?}");
        Ok(settings)
    }

    pub(crate) fn save(&mut self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self)
            .map_err(|_| anyhow::format_err!("Unable to serialize settings JSON"))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                anyhow::format_err!("Unable to create {path:?} parent directories: {}", e)
            })?;
        }

        let mut file = File::create(path)
            .map_err(|e| anyhow::format_err!("Unable to create {path:?}: {}", e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| anyhow::format_err!("Unable to write {path:?}: {}", e))?;

        self.mark_clean();
        Ok(())
    }
}
impl HasSettings for Settings {
    fn has_been_saved(&self) -> bool {
        self.audio_settings.has_been_saved()
    }

    fn needs_save(&mut self) {
        self.audio_settings.needs_save();
    }

    fn mark_clean(&mut self) {
        self.audio_settings.mark_clean();
    }
}
