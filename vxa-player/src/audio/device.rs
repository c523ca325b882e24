//! Hardware output using cpal
//!
//! cpal streams are not `Send`, while a [`PlaybackSink`] is owned by a stream
//! that moves between threads. [`CpalSink`] therefore builds and owns the
//! cpal stream on a dedicated device thread and drives it through a command
//! channel.

use crate::audio::output::PlaybackSink;
use crate::audio::types::FormatInfo;
use crate::error::{Error, Result};
use crate::playback::PcmReader;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

enum DeviceCommand {
    Play,
    Pause,
    Close,
}

/// Pull sink on the default cpal output device
pub struct CpalSink {
    format: FormatInfo,
    commands: Option<mpsc::Sender<DeviceCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Check that a default output device exists.
    ///
    /// The device stream itself is built on `attach`.
    pub fn open(format: FormatInfo) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using default audio device: {}", name);

        Ok(Self {
            format,
            commands: None,
            thread: None,
        })
    }

    fn send(&self, command: DeviceCommand) -> Result<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| Error::AudioOutput("Device sink not attached".to_string()))?;
        commands
            .send(command)
            .map_err(|_| Error::AudioOutput("Device thread has exited".to_string()))
    }
}

/// Prefer i16 output (no conversion); fall back to f32.
fn pick_sample_format(device: &Device, format: FormatInfo) -> Result<SampleFormat> {
    let mut supported = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

    let has_i16 = supported.any(|config| {
        config.channels() == format.channels
            && config.min_sample_rate().0 <= format.sample_rate
            && config.max_sample_rate().0 >= format.sample_rate
            && config.sample_format() == SampleFormat::I16
    });
    Ok(if has_i16 { SampleFormat::I16 } else { SampleFormat::F32 })
}

fn build_stream(format: FormatInfo, reader: PcmReader) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

    let config = StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    let sample_format = pick_sample_format(&device, format)?;
    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        format.sample_rate, format.channels, sample_format
    );

    let error_callback = |err: cpal::StreamError| error!("Audio stream error: {}", err);
    let mut scratch: Vec<u8> = Vec::new();

    let stream = match sample_format {
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len() * 2, 0);
                reader.fill(&mut scratch);
                for (sample, bytes) in data.iter_mut().zip(scratch.chunks_exact(2)) {
                    *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
                }
            },
            error_callback,
            None,
        ),
        _ => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len() * 2, 0);
                reader.fill(&mut scratch);
                for (sample, bytes) in data.iter_mut().zip(scratch.chunks_exact(2)) {
                    *sample = i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32768.0;
                }
            },
            error_callback,
            None,
        ),
    }
    .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

    // Some hosts start streams on creation
    if let Err(e) = stream.pause() {
        debug!("Initial pause not supported: {}", e);
    }
    Ok(stream)
}

fn run_device(
    format: FormatInfo,
    reader: PcmReader,
    commands: mpsc::Receiver<DeviceCommand>,
    ready: mpsc::SyncSender<Result<()>>,
) {
    let stream = match build_stream(format, reader) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Ends on Close or when the sink is dropped
    for command in commands {
        match command {
            DeviceCommand::Play => {
                if let Err(e) = stream.play() {
                    warn!("Failed to start audio stream: {}", e);
                }
            }
            DeviceCommand::Pause => {
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause audio stream: {}", e);
                }
            }
            DeviceCommand::Close => break,
        }
    }
    drop(stream);
    debug!("Device thread exiting");
}

impl PlaybackSink for CpalSink {
    fn attach(&mut self, reader: PcmReader) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::AudioOutput("Device sink already attached".to_string()));
        }
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let format = self.format;

        let handle = std::thread::Builder::new()
            .name("vxa-cpal".to_string())
            .spawn(move || run_device(format, reader, command_rx, ready_tx))
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn device thread: {}", e)))?;

        let result = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Device thread exited during setup".to_string()))
            .and_then(|r| r);
        if result.is_err() {
            let _ = handle.join();
            return result;
        }

        self.commands = Some(command_tx);
        self.thread = Some(handle);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.send(DeviceCommand::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.send(DeviceCommand::Pause)
    }

    fn close(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(DeviceCommand::Close);
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Device thread panicked");
            }
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.close();
    }
}
