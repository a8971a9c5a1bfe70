// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::settings::AudioSettings;
use core::fmt::Debug;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, FromSample, Sample as CpalSample, SampleFormat, SizedSample, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use crossbeam_channel::{Receiver, Sender};
use std::{fmt::Display, str::FromStr, time::Duration};
use thiserror::Error;
use wavemorph_core::{engine::Engine, types::prelude::*};

/// Problems opening or enumerating output devices. None of these stop the
/// engine; the service just stays closed.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no default output device is available")]
    NoDefaultDevice,
    #[error("there's no output device #{index} (found {count})")]
    NoSuchDevice { index: usize, count: usize },
    #[error("\"{0}\" isn't a device; use \"default\" or a device number")]
    InvalidSelection(String),
    #[error("couldn't list output devices: {0}")]
    Devices(#[from] cpal::DevicesError),
    #[error("couldn't get the device's output format: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("the device uses an unsupported sample format ({0:?})")]
    UnsupportedFormat(SampleFormat),
    #[error("couldn't build the output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("couldn't start the output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("the engine was lost with the previous stream")]
    EngineUnavailable,
}

/// Which output device to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DeviceSelection {
    /// Whatever the platform considers the default.
    #[default]
    Default,
    /// A position in [AudioService::device_names()].
    Index(usize),
}
impl DeviceSelection {
    const DEFAULT_NAME: &'static str = "default";
}
impl FromStr for DeviceSelection {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(Self::DEFAULT_NAME) {
            Ok(Self::Default)
        } else {
            s.parse::<usize>()
                .map(Self::Index)
                .map_err(|_| DeviceError::InvalidSelection(s.to_string()))
        }
    }
}
impl Display for DeviceSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => f.write_str(Self::DEFAULT_NAME),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}
impl From<DeviceSelection> for String {
    fn from(value: DeviceSelection) -> Self {
        value.to_string()
    }
}
impl TryFrom<String> for DeviceSelection {
    type Error = DeviceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Lives inside the cpal callback. When cpal drops the callback, the engine
/// goes back to the [AudioService] so the next stream can use it.
struct EngineSlot {
    engine: Option<Engine>,
    home: Sender<Engine>,
}
impl Drop for EngineSlot {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            let _ = self.home.try_send(engine);
        }
    }
}

/// Wrapper for cpal structs that implements [core::fmt::Debug].
struct ActiveStream {
    #[allow(dead_code)]
    // reason = "We need to keep a reference to the stream or else it'll be dropped"
    cpal_stream: Stream,

    device_name: String,
    sample_rate: SampleRate,
    channel_count: u16,
}
impl Debug for ActiveStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActiveStream")
            .field("cpal_stream", &"(skipped)")
            .field("device_name", &self.device_name)
            .field("sample_rate", &self.sample_rate)
            .field("channel_count", &self.channel_count)
            .finish()
    }
}

/// [AudioService] owns at most one open output device and feeds it from an
/// [Engine].
pub struct AudioService {
    host: cpal::Host,
    period_size: usize,

    /// Present whenever no stream is open.
    engine: Option<Engine>,
    engine_sender: Sender<Engine>,
    engine_receiver: Receiver<Engine>,

    stream: Option<ActiveStream>,
}
impl Debug for AudioService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioService")
            .field("host", &self.host.id())
            .field("period_size", &self.period_size)
            .field("engine", &self.engine)
            .field("stream", &self.stream)
            .finish()
    }
}
impl AudioService {
    /// How long [AudioService::close()] waits for the platform to give back
    /// the engine.
    pub const ENGINE_RETURN_TIMEOUT: Duration = Duration::from_secs(1);

    /// Creates a closed service that will play `engine` once opened.
    pub fn new_with(engine: Engine, settings: &AudioSettings) -> Self {
        let (engine_sender, engine_receiver) = crossbeam_channel::bounded(1);
        Self {
            host: cpal::default_host(),
            period_size: settings.period_size().max(1),
            engine: Some(engine),
            engine_sender,
            engine_receiver,
            stream: None,
        }
    }

    /// Closes any open device, then opens the selected one. On failure the
    /// service stays closed and can be asked to open another device.
    pub fn open(&mut self, selection: DeviceSelection) -> Result<(), DeviceError> {
        self.close();
        let result = self.open_device(selection);
        match &result {
            Ok(_) => {
                if let Some(stream) = self.stream.as_ref() {
                    log::info!(
                        "Opened {} at {} with {} channel(s)",
                        stream.device_name,
                        stream.sample_rate,
                        stream.channel_count
                    );
                }
            }
            Err(e) => {
                log::error!("Couldn't open output device {selection}: {e}");
                self.reclaim_engine(Duration::ZERO);
            }
        }
        result
    }

    /// Stops and releases the open device, if any.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let name = stream.device_name.clone();
            drop(stream);
            self.reclaim_engine(Self::ENGINE_RETURN_TIMEOUT);
            log::info!("Closed {name}");
        }
    }

    #[allow(missing_docs)]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The open device's negotiated rate.
    pub fn sample_rate(&self) -> Option<SampleRate> {
        self.stream.as_ref().map(|s| s.sample_rate)
    }

    /// The open device's name.
    pub fn open_device_name(&self) -> Option<&str> {
        self.stream.as_ref().map(|s| s.device_name.as_str())
    }

    /// The number of output devices on this host.
    pub fn device_count(&self) -> usize {
        match self.host.output_devices() {
            Ok(devices) => devices.count(),
            Err(e) => {
                log::warn!("Couldn't list output devices: {e}");
                0
            }
        }
    }

    /// Names of every output device, in [DeviceSelection::Index] order.
    pub fn device_names(&self) -> Vec<String> {
        match self.host.output_devices() {
            Ok(devices) => devices.map(|d| Self::name_of(&d)).collect(),
            Err(e) => {
                log::warn!("Couldn't list output devices: {e}");
                Vec::default()
            }
        }
    }

    /// The name of one output device.
    pub fn device_name(&self, index: usize) -> Option<String> {
        self.host
            .output_devices()
            .ok()?
            .nth(index)
            .map(|d| Self::name_of(&d))
    }

    fn name_of(device: &cpal::Device) -> String {
        device.name().unwrap_or_else(|_| String::from("(unnamed device)"))
    }

    fn find_device(&self, selection: DeviceSelection) -> Result<cpal::Device, DeviceError> {
        match selection {
            DeviceSelection::Default => self
                .host
                .default_output_device()
                .ok_or(DeviceError::NoDefaultDevice),
            DeviceSelection::Index(index) => {
                self.host
                    .output_devices()?
                    .nth(index)
                    .ok_or_else(|| DeviceError::NoSuchDevice {
                        index,
                        count: self.device_count(),
                    })
            }
        }
    }

    fn open_device(&mut self, selection: DeviceSelection) -> Result<(), DeviceError> {
        let device = self.find_device(selection)?;
        let config = Self::choose_config(&device)?;
        let engine = self.take_engine().ok_or(DeviceError::EngineUnavailable)?;
        let slot = EngineSlot {
            engine: Some(engine),
            home: self.engine_sender.clone(),
        };
        let sample_rate = SampleRate(config.sample_rate().0 as usize);
        let channel_count = config.channels();
        let cpal_stream = Self::stream_setup_for(&device, &config, self.period_size, slot)?;
        cpal_stream.play()?;
        self.stream = Some(ActiveStream {
            cpal_stream,
            device_name: Self::name_of(&device),
            sample_rate,
            channel_count,
        });
        Ok(())
    }

    /// Prefers mono f32 at the device's default rate. Otherwise takes the
    /// device default as-is and converts.
    fn choose_config(device: &cpal::Device) -> Result<SupportedStreamConfig, DeviceError> {
        let default = device.default_output_config()?;
        let rate = default.sample_rate();
        let mono_f32 = device.supported_output_configs().ok().and_then(|mut configs| {
            configs.find(|c| {
                c.channels() == 1
                    && c.sample_format() == SampleFormat::F32
                    && c.min_sample_rate() <= rate
                    && rate <= c.max_sample_rate()
            })
        });
        Ok(match mono_f32 {
            Some(range) => range.with_sample_rate(rate),
            None => default,
        })
    }

    /// The period size, adjusted to what the device says it can do.
    fn buffer_size_for(config: &SupportedStreamConfig, period_size: usize) -> BufferSize {
        match config.buffer_size() {
            SupportedBufferSize::Range { min, max } => {
                BufferSize::Fixed((period_size as u32).clamp(*min, *max))
            }
            SupportedBufferSize::Unknown => BufferSize::Default,
        }
    }

    /// Creates a Stream for the given device and config, dispatching on
    /// sample format to the generic [AudioService::stream_make()].
    fn stream_setup_for(
        device: &cpal::Device,
        config: &SupportedStreamConfig,
        period_size: usize,
        slot: EngineSlot,
    ) -> Result<Stream, DeviceError> {
        let sample_format = config.sample_format();
        let buffer_size = Self::buffer_size_for(config, period_size);
        let mut config: StreamConfig = config.clone().into();
        config.buffer_size = buffer_size;

        match sample_format {
            SampleFormat::I8 => Self::stream_make::<i8>(&config, device, period_size, slot),
            SampleFormat::I16 => Self::stream_make::<i16>(&config, device, period_size, slot),
            SampleFormat::I32 => Self::stream_make::<i32>(&config, device, period_size, slot),
            SampleFormat::I64 => Self::stream_make::<i64>(&config, device, period_size, slot),
            SampleFormat::U8 => Self::stream_make::<u8>(&config, device, period_size, slot),
            SampleFormat::U16 => Self::stream_make::<u16>(&config, device, period_size, slot),
            SampleFormat::U32 => Self::stream_make::<u32>(&config, device, period_size, slot),
            SampleFormat::U64 => Self::stream_make::<u64>(&config, device, period_size, slot),
            SampleFormat::F32 => Self::stream_make::<f32>(&config, device, period_size, slot),
            SampleFormat::F64 => Self::stream_make::<f64>(&config, device, period_size, slot),
            format => Err(DeviceError::UnsupportedFormat(format)),
        }
    }

    /// Generic portion of stream_setup_for().
    fn stream_make<T>(
        config: &StreamConfig,
        device: &cpal::Device,
        period_size: usize,
        mut slot: EngineSlot,
    ) -> Result<Stream, DeviceError>
    where
        T: SizedSample + FromSample<SampleType>,
    {
        let err_fn = |err| log::error!("Error in output sound stream: {err}");

        let channel_count = (config.channels as usize).max(1);
        let sample_rate = SampleRate(config.sample_rate.0 as usize);
        let mut scratch = vec![0.0; period_size];
        let stream = device.build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                Self::on_window(output, channel_count, sample_rate, &mut slot, &mut scratch)
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }

    /// cpal callback. Renders mono audio in scratch-sized pieces and copies
    /// each sample to every channel of its frame, converting to the stream's
    /// data type.
    fn on_window<T>(
        output: &mut [T],
        channel_count: usize,
        sample_rate: SampleRate,
        slot: &mut EngineSlot,
        scratch: &mut [SampleType],
    ) where
        T: CpalSample + FromSample<SampleType>,
    {
        let Some(engine) = slot.engine.as_mut() else {
            output.fill(T::EQUILIBRIUM);
            return;
        };
        for window in output.chunks_mut(scratch.len() * channel_count) {
            let mono = &mut scratch[..window.len() / channel_count];
            engine.render(mono, sample_rate);
            for (frame, sample) in window.chunks_exact_mut(channel_count).zip(mono.iter()) {
                frame.fill(T::from_sample(*sample));
            }
        }
    }

    /// The engine, if it's here or has come back since a slow close.
    fn take_engine(&mut self) -> Option<Engine> {
        self.engine
            .take()
            .or_else(|| self.engine_receiver.try_recv().ok())
    }

    fn reclaim_engine(&mut self, timeout: Duration) {
        if self.engine.is_some() {
            return;
        }
        match self.engine_receiver.recv_timeout(timeout) {
            Ok(engine) => self.engine = Some(engine),
            Err(_) => log::error!("The output stream didn't return the engine"),
        }
    }
}
