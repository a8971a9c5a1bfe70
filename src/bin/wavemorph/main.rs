// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! A headless wavetable player. Plays the demo bank through an output device,
//! or sweeps the whole bank once for recording with `--export`.

use clap::Parser;
use settings::Settings;
use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use wavemorph::{bank::demo_grid, prelude::*, services::HasSettings};

mod settings;

#[derive(Parser, Debug, Default)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// List output devices and exit
    #[clap(short = 'l', long, value_parser)]
    list_devices: bool,

    /// Output device: "default" or a number from --list-devices
    #[clap(short = 'd', long)]
    device: Option<DeviceSelection>,

    /// Playback pitch in Hz (1 to 10000)
    #[clap(short = 'f', long)]
    frequency: Option<f64>,

    /// Output level in dB (-60 to 0)
    #[clap(long, allow_negative_numbers = true)]
    volume: Option<f64>,

    /// Morph through the 3-D grid instead of browsing
    #[clap(short = 'g', long, value_parser)]
    grid_mode: bool,

    /// Snap to the nearest waveform instead of blending
    #[clap(long, value_parser)]
    no_interpolate: bool,

    /// Auto-browse speed in traversals per second (0 to 10)
    #[clap(short = 'b', long)]
    browse_speed: Option<f64>,

    /// Sweep every waveform once at a fixed cadence, then exit
    #[clap(short = 'e', long, value_parser)]
    export: bool,

    /// How long to play, in seconds (ignored with --export)
    #[clap(short = 's', long, default_value_t = 10.0)]
    seconds: f64,

    /// JSON settings file. Created if missing, and updated when --device
    /// picks a different device.
    #[clap(long)]
    settings: Option<PathBuf>,
}

/// How often the main thread checks on playback.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Gives up on an export that hasn't started after this long.
const EXPORT_START_TIMEOUT: Duration = Duration::from_secs(2);

fn apply_args(args: &Args, settings: &mut Settings) {
    if let Some(device) = args.device {
        settings.audio_settings.set_device(device);
    }
    let controls = &mut settings.controls;
    if let Some(frequency) = args.frequency {
        controls.frequency = FrequencyHz(frequency);
    }
    if let Some(volume) = args.volume {
        controls.volume = Decibels(volume);
    }
    if args.grid_mode {
        controls.grid_mode = true;
    }
    if args.no_interpolate {
        controls.interpolate = false;
    }
    if let Some(speed) = args.browse_speed {
        controls.browse_speed = speed;
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = match args.settings.as_ref() {
        Some(path) => Settings::load_or_default(path)?,
        None => Settings::default(),
    };
    let settings_existed = args.settings.as_ref().is_some_and(|p| p.exists());
    apply_args(&args, &mut settings);

    let grid = Arc::new(demo_grid(GridDimensions::default())?);
    let control = Arc::new(ControlState::new_with(&settings.controls));
    let (engine, handle) = Engine::new_with_control(grid, control)?;
    let mut audio_service = AudioService::new_with(engine, &settings.audio_settings);

    if args.list_devices {
        for (i, name) in audio_service.device_names().iter().enumerate() {
            println!("{i}: {name}");
        }
        return Ok(());
    }

    if let Err(e) = audio_service.open(settings.audio_settings.device()) {
        if args.export {
            return Err(anyhow::anyhow!("Can't export without an output device: {e}"));
        }
        eprintln!("Playing without an output device: {e}");
    }

    if args.export {
        run_export(&handle)?;
    } else {
        handle.set_play_enabled(true);
        let deadline = Instant::now() + Duration::from_secs_f64(args.seconds.max(0.0));
        while Instant::now() < deadline {
            std::thread::sleep(POLL_INTERVAL);
        }
        handle.set_play_enabled(false);
    }
    audio_service.close();

    if let Some(path) = args.settings.as_ref() {
        if !settings_existed || !settings.has_been_saved() {
            settings.controls = handle.control().load();
            settings.controls.play_enabled = false;
            settings.save(path)?;
            log::info!("Saved settings to {path:?}");
        }
    }
    Ok(())
}

fn run_export(handle: &EngineHandle) -> anyhow::Result<()> {
    handle.start_export();
    let started_at = Instant::now();
    while !handle.is_exporting() {
        if started_at.elapsed() > EXPORT_START_TIMEOUT {
            return Err(anyhow::anyhow!("The engine never started the export"));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    log::info!("Exporting {} waveforms", handle.dimensions().len());
    while handle.is_exporting() {
        std::thread::sleep(POLL_INTERVAL);
    }
    log::info!("Export finished after {:?}", started_at.elapsed());
    Ok(())
}
