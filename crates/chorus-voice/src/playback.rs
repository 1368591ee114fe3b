//! Audio playback via `rodio`.
//!
//! `rodio::OutputStream` is `!Send` on some platforms. Rather than using
//! `unsafe impl Send/Sync`, the stream is confined to a dedicated OS thread
//! that keeps it alive; only the `Send + Sync` [`OutputStreamHandle`] leaves
//! that thread. Every chunk gets its own [`Sink`], which is what makes
//! voices overlap instead of queueing behind each other.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use rodio::cpal::traits::HostTrait;
use rodio::{Decoder, DeviceTrait, OutputStream, OutputStreamHandle, Sink, SupportedStreamConfig};

use crate::config::DeviceConfig;
use crate::error::VoiceError;
use crate::mixer::{AudioOutput, PlaybackChannel};
use crate::utterance::AudioBuffer;

/// One chunk playing on its own sink.
struct RodioChannel {
    sink: Sink,
    stopped: AtomicBool,
}

impl PlaybackChannel for RodioChannel {
    fn is_busy(&self) -> bool {
        // A stopped sink drains lazily; report idle straight away.
        !self.stopped.load(Ordering::SeqCst) && !self.sink.empty()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
    }
}

/// [`AudioOutput`] on the default output device.
pub struct RodioOutput {
    handle: OutputStreamHandle,
    shutdown_tx: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RodioOutput {
    /// Open the default output device.
    ///
    /// The requested sample rate and channel count are used when the device
    /// supports them; otherwise the device default is used. rodio sizes its
    /// own buffers, so `buffer_size` is advisory.
    pub fn open(config: &DeviceConfig) -> Result<Self, VoiceError> {
        let (init_tx, init_rx) = mpsc::channel::<Result<OutputStreamHandle, VoiceError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let config = *config;

        let thread = thread::Builder::new()
            .name("chorus-audio".into())
            .spawn(move || {
                let (stream, handle) = match open_stream(&config) {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                if init_tx.send(Ok(handle)).is_err() {
                    return;
                }

                // Park until shutdown (or the owner is dropped).
                let _ = shutdown_rx.recv();
                drop(stream);
                tracing::debug!("Audio output thread shutting down");
            })
            .map_err(|e| VoiceError::OutputStreamError(format!("failed to spawn audio thread: {e}")))?;

        let handle = init_rx.recv().map_err(|_| {
            VoiceError::OutputStreamError("audio thread exited during initialisation".into())
        })??;

        tracing::info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            buffer_size = config.buffer_size,
            "Audio playback initialized on default output device"
        );

        Ok(Self {
            handle,
            shutdown_tx,
            thread: Some(thread),
        })
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, buffer: &AudioBuffer) -> Result<Arc<dyn PlaybackChannel>, VoiceError> {
        let file = File::open(&buffer.path)?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|e| VoiceError::Decode(e.to_string()))?;

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| VoiceError::OutputStreamError(e.to_string()))?;
        sink.append(source);

        tracing::trace!(path = %buffer.path.display(), "One-shot playback started");
        Ok(Arc::new(RodioChannel {
            sink,
            stopped: AtomicBool::new(false),
        }))
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn open_stream(config: &DeviceConfig) -> Result<(OutputStream, OutputStreamHandle), VoiceError> {
    let host = rodio::cpal::default_host();

    if let Some(device) = host.default_output_device() {
        match matching_config(&device, config) {
            Some(supported) => match OutputStream::try_from_device_config(&device, supported) {
                Ok(pair) => return Ok(pair),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Requested output format rejected, falling back to device default"
                ),
            },
            None => tracing::warn!(
                sample_rate = config.sample_rate,
                channels = config.channels,
                "Output device does not support requested format, using device default"
            ),
        }
    }

    OutputStream::try_default().map_err(|e| VoiceError::OutputStreamError(e.to_string()))
}

fn matching_config(device: &rodio::Device, config: &DeviceConfig) -> Option<SupportedStreamConfig> {
    let rate = rodio::cpal::SampleRate(config.sample_rate);
    device
        .supported_output_configs()
        .ok()?
        .filter(|range| range.channels() == config.channels)
        .find(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .map(|range| range.with_sample_rate(rate))
}
