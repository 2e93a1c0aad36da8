//! Audio playback to system speakers via cpal.

use super::{AudioClip, AudioOutput};
use crate::config::AudioConfig;
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Speaker output backed by a cpal stream.
///
/// The blocking stream runs on the tokio blocking pool; cancellation is
/// forwarded through a shared stop flag the playback loop polls.
pub struct CpalOutput {
    output_device: Option<String>,
}

impl CpalOutput {
    /// Create an output for the configured device (None = system default).
    #[must_use]
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            output_device: config.output_device.clone(),
        }
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| ChatError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl AudioOutput for CpalOutput {
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));

        let stop_on_cancel = Arc::clone(&stop);
        let watcher = tokio::spawn(async move {
            cancel.cancelled().await;
            stop_on_cancel.store(true, Ordering::Release);
        });

        let device_name = self.output_device.clone();
        let joined =
            tokio::task::spawn_blocking(move || blocking_play(device_name, &clip, &stop)).await;
        watcher.abort();

        match joined {
            Ok(result) => result,
            Err(e) => Err(ChatError::Audio(format!("playback task failed: {e}"))),
        }
    }
}

/// Play a clip through the named (or default) output device, blocking until
/// the clip finishes or the stop flag is raised.
fn blocking_play(device_name: Option<String>, clip: &AudioClip, stop: &AtomicBool) -> Result<()> {
    let host = cpal::default_host();

    let device = if let Some(ref name) = device_name {
        host.output_devices()
            .map_err(|e| ChatError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| ChatError::Audio(format!("output device '{name}' not found")))?
    } else {
        host.default_output_device()
            .ok_or_else(|| ChatError::Audio("no default output device".into()))?
    };

    let device_desc = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!("using output device: {device_desc}");

    // A stop raised before the stream exists must never make a sound.
    if stop.load(Ordering::Acquire) {
        return Ok(());
    }

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: clip.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples: clip.samples.clone(),
        position: 0,
        finished: false,
    }));

    let buffer_clone = Arc::clone(&buffer);
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = match buffer_clone.lock() {
                    Ok(b) => b,
                    Err(_) => return,
                };

                for sample in data.iter_mut() {
                    if buf.position < buf.samples.len() {
                        *sample = buf.samples[buf.position];
                        buf.position += 1;
                    } else {
                        *sample = 0.0;
                        buf.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| ChatError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| ChatError::Audio(format!("failed to start output stream: {e}")))?;

    // Wait for completion or cancellation.
    loop {
        std::thread::sleep(std::time::Duration::from_millis(10));
        if stop.load(Ordering::Acquire) {
            break;
        }
        let buf = buffer
            .lock()
            .map_err(|e| ChatError::Audio(format!("playback buffer lock poisoned: {e}")))?;
        if buf.finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

/// Internal buffer for tracking playback progress.
struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn pre_cancelled_token_never_opens_a_stream() {
        let output = CpalOutput::new(&AudioConfig::default());
        let clip = AudioClip {
            samples: vec![0.0; 2_400],
            sample_rate: 24_000,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        // Resolves without touching any audio device, so it cannot sound
        // and cannot fail on hosts with no output hardware.
        assert!(output.play(clip, cancel).await.is_ok());
    }

    #[test]
    fn device_listing_never_panics() {
        // Hardware-dependent: an empty list and an enumeration error are
        // both acceptable, panicking is not.
        let _ = CpalOutput::list_output_devices();
    }
}
