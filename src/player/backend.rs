//! Audio output.
//!
//! The controller talks to an [`AudioBackend`]; the real implementation plays
//! through a rodio sink on the default output device. Seeking rebuilds the
//! sink from the in-memory media with the decoder positioned at the target,
//! and the reported position is that target plus the new sink's own clock.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

/// One active playback resource at a time.
pub trait AudioBackend {
    /// Opens `media` paused at position 0. Returns the decoded duration in
    /// seconds when the container reports one. Any previous resource must
    /// already have been released.
    fn open(&mut self, media: Vec<u8>, volume: f32) -> anyhow::Result<Option<f64>>;
    /// Stops and drops the active resource, if any.
    fn release(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64) -> anyhow::Result<()>;
    /// Current position in seconds.
    fn position(&self) -> f64;
    fn set_volume(&mut self, volume: f32);
    /// True once the active resource has played to its end.
    fn is_finished(&self) -> bool;
    fn is_loaded(&self) -> bool;
}

struct LoadedMedia {
    bytes: Arc<[u8]>,
    sink: Sink,
    seek_base: Duration,
    paused: bool,
}

pub struct RodioBackend {
    stream: OutputStream,
    current: Option<LoadedMedia>,
}

impl RodioBackend {
    /// Opens the default output device.
    ///
    /// # Errors
    /// - If no output device is available or the stream cannot be opened
    pub fn open_default() -> anyhow::Result<Self> {
        let mut stream = OutputStreamBuilder::from_default_device()
            .map_err(|e| anyhow::anyhow!("No audio output device available: {e}"))?
            .open_stream_or_fallback()
            .map_err(|e| anyhow::anyhow!("Failed to open audio output stream: {e}"))?;
        // The terminal belongs to the UI
        stream.log_on_drop(false);
        tracing::info!("Audio output stream opened");
        Ok(Self {
            stream,
            current: None,
        })
    }

    fn decoder(bytes: &Arc<[u8]>) -> anyhow::Result<Decoder<Cursor<Arc<[u8]>>>> {
        Decoder::new(Cursor::new(Arc::clone(bytes)))
            .map_err(|e| anyhow::anyhow!("Failed to decode audio: {e}"))
    }
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, media: Vec<u8>, volume: f32) -> anyhow::Result<Option<f64>> {
        let bytes: Arc<[u8]> = media.into();
        let source = Self::decoder(&bytes)?;
        let duration = source.total_duration().map(|d| d.as_secs_f64());

        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.set_volume(volume);
        sink.append(source);

        self.current = Some(LoadedMedia {
            bytes,
            sink,
            seek_base: Duration::ZERO,
            paused: true,
        });
        Ok(duration)
    }

    fn release(&mut self) {
        if let Some(media) = self.current.take() {
            media.sink.stop();
        }
    }

    fn play(&mut self) {
        if let Some(media) = self.current.as_mut() {
            media.sink.play();
            media.paused = false;
        }
    }

    fn pause(&mut self) {
        if let Some(media) = self.current.as_mut() {
            media.sink.pause();
            media.paused = true;
        }
    }

    fn seek(&mut self, seconds: f64) -> anyhow::Result<()> {
        let Some(media) = self.current.as_mut() else {
            return Ok(());
        };
        let target = Duration::from_secs_f64(seconds.max(0.0));

        let mut source = Self::decoder(&media.bytes)?;
        if let Err(e) = source.try_seek(target) {
            return Err(anyhow::anyhow!("Seek to {seconds:.1}s failed: {e}"));
        }

        let volume = media.sink.volume();
        media.sink.stop();
        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(volume);
        if media.paused {
            sink.pause();
        }
        sink.append(source);

        media.sink = sink;
        media.seek_base = target;
        Ok(())
    }

    fn position(&self) -> f64 {
        self.current
            .as_ref()
            .map(|m| (m.seek_base + m.sink.get_pos()).as_secs_f64())
            .unwrap_or(0.0)
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(media) = self.current.as_ref() {
            media.sink.set_volume(volume);
        }
    }

    fn is_finished(&self) -> bool {
        self.current.as_ref().is_some_and(|m| m.sink.empty())
    }

    fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}
