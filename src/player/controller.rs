//! Transport state for the one active track.

use std::time::{Duration, Instant};

use super::backend::AudioBackend;
use super::media::MediaFetcher;
use crate::manifest::types::Track;

pub struct PlaybackController<B: AudioBackend> {
    backend: B,
    fetcher: MediaFetcher,
    current: Option<Track>,
    playlist: Vec<Track>,
    is_playing: bool,
    progress: f64,
    duration: f64,
    volume: f32,
    poll_interval: Duration,
    /// Next instant a position poll may publish; `None` while disarmed
    next_poll: Option<Instant>,
}

impl<B: AudioBackend> PlaybackController<B> {
    pub fn new(backend: B, fetcher: MediaFetcher, poll_interval: Duration, volume: f32) -> Self {
        Self {
            backend,
            fetcher,
            current: None,
            playlist: Vec::new(),
            is_playing: false,
            progress: 0.0,
            duration: 0.0,
            volume: volume.clamp(0.0, 1.0),
            poll_interval,
            next_poll: None,
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.id.as_str())
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn arm_poll(&mut self) {
        self.next_poll = Some(Instant::now() + self.poll_interval);
    }

    pub fn play(&mut self) {
        if !self.backend.is_loaded() {
            return;
        }
        self.backend.play();
        self.is_playing = true;
        self.arm_poll();
    }

    pub fn pause(&mut self) {
        if !self.backend.is_loaded() {
            return;
        }
        self.backend.pause();
        self.is_playing = false;
        self.next_poll = None;
    }

    pub fn toggle(&mut self) {
        if self.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Moves playback to `seconds`, clamped to the known duration, and
    /// publishes it immediately. Polling holds off for one interval so a
    /// pre-seek position is never reported.
    pub fn seek(&mut self, seconds: f64) -> anyhow::Result<()> {
        if !self.backend.is_loaded() || !seconds.is_finite() {
            return Ok(());
        }
        let target = if self.duration > 0.0 {
            seconds.clamp(0.0, self.duration)
        } else {
            seconds.max(0.0)
        };

        self.backend.seek(target)?;
        self.progress = target;
        if self.is_playing {
            self.arm_poll();
        }
        tracing::debug!("Seeked to {target:.2}s");
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            self.volume
        };
        self.backend.set_volume(self.volume);
    }

    /// Releases the active resource, loads `track` and starts it at `start`
    /// seconds. `playlist` becomes the list `next`/`previous` walk.
    ///
    /// # Errors
    /// - If the media cannot be fetched or decoded; the controller is idle afterwards
    pub async fn load_and_play(
        &mut self,
        track: Track,
        playlist: Vec<Track>,
        start: f64,
    ) -> anyhow::Result<()> {
        self.backend.release();
        self.is_playing = false;
        self.next_poll = None;
        self.progress = 0.0;
        self.duration = 0.0;
        self.current = None;
        self.playlist = playlist;

        tracing::info!("Loading {} ({})", track.title, track.url);
        let opened = match self.fetcher.fetch(&track.url).await {
            Ok(bytes) => self.backend.open(bytes, self.volume),
            Err(e) => Err(e),
        };
        let reported = opened.map_err(|e| {
            tracing::error!("Failed to load {}: {e}", track.id);
            e
        })?;

        self.duration = reported
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(track.duration.max(0.0));
        self.current = Some(track);

        if start > 0.0 {
            if let Err(e) = self.seek(start) {
                tracing::warn!("Could not start at {start:.1}s: {e}");
            }
        }
        self.play();
        Ok(())
    }

    fn relative_index(&self, step: isize) -> Option<usize> {
        let len = self.playlist.len();
        if len == 0 {
            return None;
        }
        let position = self
            .current_track_id()
            .and_then(|id| self.playlist.iter().position(|t| t.id == id));
        Some(match position {
            Some(i) => (i as isize + step).rem_euclid(len as isize) as usize,
            None => 0,
        })
    }

    async fn load_index(&mut self, index: usize) -> anyhow::Result<()> {
        let track = self.playlist[index].clone();
        let playlist = std::mem::take(&mut self.playlist);
        self.load_and_play(track, playlist, 0.0).await
    }

    /// Plays the next playlist entry, wrapping to the first after the last.
    pub async fn next(&mut self) -> anyhow::Result<()> {
        match self.relative_index(1) {
            Some(index) => self.load_index(index).await,
            None => Ok(()),
        }
    }

    /// Plays the previous playlist entry, wrapping to the last from the first.
    pub async fn previous(&mut self) -> anyhow::Result<()> {
        match self.relative_index(-1) {
            Some(index) => self.load_index(index).await,
            None => Ok(()),
        }
    }

    /// Drives polling and end-of-track handling. Returns true when the
    /// published state changed.
    pub async fn tick(&mut self, now: Instant) -> anyhow::Result<bool> {
        if !self.is_playing {
            return Ok(false);
        }

        if self.backend.is_finished() {
            if self.playlist.is_empty() {
                tracing::info!("Track ended, nothing queued");
                self.is_playing = false;
                self.next_poll = None;
                self.progress = self.duration;
                return Ok(true);
            }
            tracing::info!("Track ended, advancing");
            self.next().await?;
            return Ok(true);
        }

        match self.next_poll {
            Some(due) if now >= due => {
                let position = self.backend.position();
                self.progress = if self.duration > 0.0 {
                    position.clamp(0.0, self.duration)
                } else {
                    position.max(0.0)
                };
                self.next_poll = Some(now + self.poll_interval);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
impl<B: AudioBackend> PlaybackController<B> {
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlayerConfig, RelayConfig};

    /// Records every call; position and end-of-track are set by the test.
    #[derive(Default)]
    struct FakeBackend {
        events: Vec<String>,
        loaded: bool,
        position: f64,
        finished: bool,
        volume: f32,
        reported_duration: Option<f64>,
    }

    impl AudioBackend for FakeBackend {
        fn open(&mut self, media: Vec<u8>, volume: f32) -> anyhow::Result<Option<f64>> {
            if media == b"corrupt" {
                return Err(anyhow::anyhow!("Failed to decode audio"));
            }
            self.events.push(format!("open:{}", String::from_utf8_lossy(&media)));
            self.loaded = true;
            self.finished = false;
            self.position = 0.0;
            self.volume = volume;
            Ok(self.reported_duration)
        }
        fn release(&mut self) {
            if self.loaded {
                self.events.push("release".to_string());
            }
            self.loaded = false;
        }
        fn play(&mut self) {
            self.events.push("play".to_string());
        }
        fn pause(&mut self) {
            self.events.push("pause".to_string());
        }
        fn seek(&mut self, seconds: f64) -> anyhow::Result<()> {
            self.events.push(format!("seek:{seconds}"));
            self.position = seconds;
            Ok(())
        }
        fn position(&self) -> f64 {
            self.position
        }
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }
        fn is_finished(&self) -> bool {
            self.finished
        }
        fn is_loaded(&self) -> bool {
            self.loaded
        }
    }

    fn track(id: &str, duration: f64) -> Track {
        Track {
            id: id.to_string(),
            title: id.to_string(),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            album_description: String::new(),
            duration,
            filename: format!("{id}.mp3"),
            track_number: 0,
            url: format!("/unjazz/albums/a/{id}.mp3"),
            artwork: None,
            waveform: String::new(),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        controller: PlaybackController<FakeBackend>,
        playlist: Vec<Track>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let albums = dir.path().join("albums/a");
        std::fs::create_dir_all(&albums).unwrap();
        for id in ["one", "two", "three"] {
            std::fs::write(albums.join(format!("{id}.mp3")), id).unwrap();
        }
        std::fs::write(albums.join("bad.mp3"), "corrupt").unwrap();

        let player = PlayerConfig {
            site_root: dir.path().to_path_buf(),
            ..PlayerConfig::default()
        };
        let fetcher = MediaFetcher::new(&player, &RelayConfig::default()).unwrap();
        let controller = PlaybackController::new(
            FakeBackend::default(),
            fetcher,
            Duration::from_millis(100),
            0.8,
        );
        Fixture {
            _dir: dir,
            controller,
            playlist: vec![track("one", 60.0), track("two", 90.0), track("three", 30.0)],
        }
    }

    #[tokio::test]
    async fn test_load_and_play_releases_before_open() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[0].clone(), playlist.clone(), 0.0)
            .await
            .unwrap();
        f.controller
            .load_and_play(playlist[1].clone(), playlist, 0.0)
            .await
            .unwrap();

        assert_eq!(
            f.controller.backend().events,
            vec!["open:one", "play", "release", "open:two", "play"]
        );
        assert_eq!(f.controller.current_track_id(), Some("two"));
        assert!(f.controller.is_playing());
        assert_eq!(f.controller.duration(), 90.0);
    }

    #[tokio::test]
    async fn test_backend_duration_wins_over_manifest() {
        let mut f = fixture();
        f.controller.backend_mut().reported_duration = Some(61.5);
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[0].clone(), playlist, 0.0)
            .await
            .unwrap();
        assert_eq!(f.controller.duration(), 61.5);
    }

    #[tokio::test]
    async fn test_start_time_is_published_immediately() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[1].clone(), playlist, 45.0)
            .await
            .unwrap();
        assert_eq!(f.controller.progress(), 45.0);
        assert!(f.controller.backend().events.contains(&"seek:45".to_string()));
    }

    #[tokio::test]
    async fn test_next_and_previous_wrap() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[2].clone(), playlist, 0.0)
            .await
            .unwrap();

        f.controller.next().await.unwrap();
        assert_eq!(f.controller.current_track_id(), Some("one"));

        f.controller.previous().await.unwrap();
        assert_eq!(f.controller.current_track_id(), Some("three"));

        f.controller.previous().await.unwrap();
        assert_eq!(f.controller.current_track_id(), Some("two"));
    }

    #[tokio::test]
    async fn test_next_on_empty_playlist_is_noop() {
        let mut f = fixture();
        f.controller.next().await.unwrap();
        f.controller.previous().await.unwrap();
        assert_eq!(f.controller.current_track_id(), None);
        assert!(f.controller.backend().events.is_empty());
    }

    #[tokio::test]
    async fn test_current_outside_playlist_advances_to_first() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(track("bad", 10.0), playlist, 0.0)
            .await
            .unwrap_err();
        f.controller
            .load_and_play(f.playlist[1].clone(), vec![f.playlist[0].clone()], 0.0)
            .await
            .unwrap();
        f.controller.next().await.unwrap();
        assert_eq!(f.controller.current_track_id(), Some("one"));
    }

    #[tokio::test]
    async fn test_polling_publishes_only_while_playing() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[0].clone(), playlist, 0.0)
            .await
            .unwrap();

        f.controller.backend_mut().position = 12.0;
        let later = Instant::now() + Duration::from_millis(250);
        assert!(f.controller.tick(later).await.unwrap());
        assert_eq!(f.controller.progress(), 12.0);

        f.controller.pause();
        f.controller.backend_mut().position = 20.0;
        let much_later = later + Duration::from_secs(1);
        assert!(!f.controller.tick(much_later).await.unwrap());
        assert_eq!(f.controller.progress(), 12.0);
    }

    #[tokio::test]
    async fn test_seek_suspends_polling_for_one_interval() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[0].clone(), playlist, 0.0)
            .await
            .unwrap();

        f.controller.seek(30.0).unwrap();
        // A stale position from before the seek landed
        f.controller.backend_mut().position = 2.0;
        assert!(!f.controller.tick(Instant::now()).await.unwrap());
        assert_eq!(f.controller.progress(), 30.0);

        f.controller.backend_mut().position = 30.2;
        let after = Instant::now() + Duration::from_millis(150);
        assert!(f.controller.tick(after).await.unwrap());
        assert_eq!(f.controller.progress(), 30.2);
    }

    #[tokio::test]
    async fn test_seek_clamps_to_duration() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[2].clone(), playlist, 0.0)
            .await
            .unwrap();
        f.controller.seek(500.0).unwrap();
        assert_eq!(f.controller.progress(), 30.0);
        f.controller.seek(-3.0).unwrap();
        assert_eq!(f.controller.progress(), 0.0);
    }

    #[tokio::test]
    async fn test_track_end_auto_advances_with_wrap() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[2].clone(), playlist, 0.0)
            .await
            .unwrap();

        f.controller.backend_mut().finished = true;
        assert!(f.controller.tick(Instant::now()).await.unwrap());
        assert_eq!(f.controller.current_track_id(), Some("one"));
        assert!(f.controller.is_playing());
    }

    #[tokio::test]
    async fn test_track_end_without_playlist_stops() {
        let mut f = fixture();
        let only = f.playlist[0].clone();
        f.controller.load_and_play(only, Vec::new(), 0.0).await.unwrap();

        f.controller.backend_mut().finished = true;
        assert!(f.controller.tick(Instant::now()).await.unwrap());
        assert!(!f.controller.is_playing());
        assert_eq!(f.controller.progress(), 60.0);
        assert!(!f.controller.tick(Instant::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_volume_is_clamped_and_carried_to_new_tracks() {
        let mut f = fixture();
        f.controller.set_volume(1.7);
        assert_eq!(f.controller.volume(), 1.0);
        f.controller.set_volume(-0.2);
        assert_eq!(f.controller.volume(), 0.0);
        f.controller.set_volume(0.4);

        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[0].clone(), playlist, 0.0)
            .await
            .unwrap();
        assert_eq!(f.controller.backend().volume, 0.4);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_controller_idle() {
        let mut f = fixture();
        let playlist = f.playlist.clone();
        f.controller
            .load_and_play(playlist[0].clone(), playlist.clone(), 0.0)
            .await
            .unwrap();

        let err = f
            .controller
            .load_and_play(track("bad", 5.0), playlist, 0.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("decode"));
        assert_eq!(f.controller.current_track_id(), None);
        assert!(!f.controller.is_playing());
        assert!(!f.controller.backend().is_loaded());

        f.controller.toggle();
        assert!(!f.controller.is_playing());
    }
}
