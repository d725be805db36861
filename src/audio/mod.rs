use crate::config;
use crate::error::PlayerError;
use crate::model::TrackSource;
use anyhow::{Context, Result};
use rodio::Source;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MAX_VOLUME: f32 = 1.0;

/// Engine-sourced events, drained by the event loop and fed back into the
/// core. `playing` is derived from these rather than set optimistically, so
/// a rejected pause/resume cannot leave the core out of sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Started,
    Resumed,
    Paused,
    Finished,
    Progress(Duration),
    MetadataLoaded(Option<Duration>),
}

pub trait AudioEngine {
    /// Load the source and start playback. Replaces whatever was loaded.
    fn play(&mut self, source: &TrackSource) -> Result<(), PlayerError>;
    fn pause(&mut self);
    fn resume(&mut self);
    /// Stop playback and unload the current source.
    fn stop(&mut self);
    fn is_paused(&self) -> bool;
    fn current_source(&self) -> Option<&TrackSource>;
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn seek_to(&mut self, position: Duration) -> Result<(), PlayerError>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    fn poll_events(&mut self) -> Vec<EngineEvent>;
}

pub struct RodioAudioEngine {
    stream: OutputStream,
    sink: Sink,
    current: Option<TrackSource>,
    resolved_path: Option<PathBuf>,
    track_duration: Option<Duration>,
    volume: f32,
    muted: bool,
    cache_file: Option<PathBuf>,
    pending_events: Vec<EngineEvent>,
    finished_reported: bool,
    last_progress_secs: Option<u64>,
}

impl RodioAudioEngine {
    pub fn new() -> Result<Self> {
        let mut stream = OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")?
            .with_error_callback(|_| {})
            .open_stream_or_fallback()
            .context("failed to start default output stream")?;
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());

        Ok(Self {
            stream,
            sink,
            current: None,
            resolved_path: None,
            track_duration: None,
            volume: 1.0,
            muted: false,
            cache_file: None,
            pending_events: Vec::new(),
            finished_reported: false,
            last_progress_secs: None,
        })
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn release_cache(&mut self) {
        if let Some(path) = self.cache_file.take()
            && let Err(err) = fs::remove_file(&path)
        {
            debug!("failed to remove stream cache {}: {err}", path.display());
        }
    }

    fn load(&mut self, source: &TrackSource) -> Result<()> {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.release_cache();

        let path = match source {
            TrackSource::Local(path) => path.clone(),
            TrackSource::Remote(url) => {
                let cached = fetch_remote(url)?;
                self.cache_file = Some(cached.clone());
                cached
            }
        };

        let file =
            File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
        let decoded = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.track_duration = decoded.total_duration();
        self.sink.append(decoded);
        self.sink.set_volume(self.effective_volume());

        self.current = Some(source.clone());
        self.resolved_path = Some(path);
        self.finished_reported = false;
        self.last_progress_secs = None;
        self.pending_events.push(EngineEvent::Started);
        self.pending_events
            .push(EngineEvent::MetadataLoaded(self.track_duration));
        Ok(())
    }

    /// A drained sink cannot seek; rebuild it from the resolved file first.
    /// This is what makes seek-to-zero work after the track has ended.
    fn reload_drained_sink(&mut self) -> Result<()> {
        let path = self
            .resolved_path
            .clone()
            .context("no resolved source to reload")?;
        let file =
            File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
        let decoded = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.append(decoded);
        self.sink.set_volume(self.effective_volume());
        self.finished_reported = false;
        Ok(())
    }
}

impl AudioEngine for RodioAudioEngine {
    fn play(&mut self, source: &TrackSource) -> Result<(), PlayerError> {
        self.load(source).map_err(|err| {
            self.current = None;
            self.resolved_path = None;
            self.track_duration = None;
            PlayerError::Playback(format!("{err:#}"))
        })
    }

    fn pause(&mut self) {
        if self.current.is_some() && !self.sink.is_paused() {
            self.sink.pause();
            self.pending_events.push(EngineEvent::Paused);
        }
    }

    fn resume(&mut self) {
        if self.current.is_some() && self.sink.is_paused() {
            self.sink.play();
            self.pending_events.push(EngineEvent::Resumed);
        }
    }

    fn stop(&mut self) {
        self.sink.stop();
        self.release_cache();
        self.current = None;
        self.resolved_path = None;
        self.track_duration = None;
        self.finished_reported = false;
        self.last_progress_secs = None;
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn current_source(&self) -> Option<&TrackSource> {
        self.current.as_ref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<(), PlayerError> {
        if self.current.is_none() {
            return Err(PlayerError::Playback(String::from("no active track")));
        }

        if self.sink.empty() {
            self.reload_drained_sink()
                .map_err(|err| PlayerError::Playback(format!("{err:#}")))?;
        }
        self.sink
            .try_seek(position)
            .map_err(|err| PlayerError::Playback(format!("seek failed: {err:?}")))
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.sink.set_volume(self.effective_volume());
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.sink.set_volume(self.effective_volume());
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        let mut events = std::mem::take(&mut self.pending_events);

        if self.current.is_some() && !self.sink.is_paused() {
            if self.sink.empty() {
                if !self.finished_reported {
                    self.finished_reported = true;
                    events.push(EngineEvent::Finished);
                }
            } else {
                let position = self.sink.get_pos();
                let secs = position.as_secs();
                if self.last_progress_secs != Some(secs) {
                    self.last_progress_secs = Some(secs);
                    events.push(EngineEvent::Progress(position));
                }
            }
        }

        events
    }
}

impl Drop for RodioAudioEngine {
    fn drop(&mut self) {
        self.release_cache();
    }
}

fn fetch_remote(url: &str) -> Result<PathBuf> {
    let dir = config::stream_cache_dir()?;
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let response =
        reqwest::blocking::get(url).with_context(|| format!("failed to fetch {url}"))?;
    anyhow::ensure!(
        response.status().is_success(),
        "{url} returned {}",
        response.status()
    );
    let body = response
        .bytes()
        .with_context(|| format!("failed to read body of {url}"))?;

    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let path = dir.join(format!("{:016x}.audio", hasher.finish()));
    fs::write(&path, &body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Stand-in engine used when no audio output device can be opened, and by
/// tests. Tracks a simulated clock so transport logic behaves normally.
pub struct NullAudioEngine {
    paused: bool,
    current: Option<TrackSource>,
    volume: f32,
    muted: bool,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    pending_events: Vec<EngineEvent>,
    finished_reported: bool,
}

impl NullAudioEngine {
    pub fn new() -> Self {
        Self {
            paused: false,
            current: None,
            volume: 1.0,
            muted: false,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            pending_events: Vec::new(),
            finished_reported: false,
        }
    }

    fn estimate_duration(source: &TrackSource) -> Option<Duration> {
        let TrackSource::Local(path) = source else {
            return None;
        };
        let file = File::open(path).ok()?;
        let decoded = Decoder::try_from(file).ok()?;
        decoded
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            position = position.min(duration);
        }
        position
    }
}

impl Default for NullAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for NullAudioEngine {
    fn play(&mut self, source: &TrackSource) -> Result<(), PlayerError> {
        self.track_duration = Self::estimate_duration(source);
        self.current = Some(source.clone());
        self.paused = false;
        self.position_offset = Duration::ZERO;
        self.started_at = Some(Instant::now());
        self.finished_reported = false;
        self.pending_events.push(EngineEvent::Started);
        self.pending_events
            .push(EngineEvent::MetadataLoaded(self.track_duration));
        Ok(())
    }

    fn pause(&mut self) {
        if self.current.is_some() && !self.paused {
            self.position_offset = self.current_position();
            self.started_at = None;
            self.paused = true;
            self.pending_events.push(EngineEvent::Paused);
        }
    }

    fn resume(&mut self) {
        if self.current.is_some() && self.paused {
            self.paused = false;
            self.started_at = Some(Instant::now());
            self.pending_events.push(EngineEvent::Resumed);
        }
    }

    fn stop(&mut self) {
        self.current = None;
        self.paused = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
        self.finished_reported = false;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn current_source(&self) -> Option<&TrackSource> {
        self.current.as_ref()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn seek_to(&mut self, position: Duration) -> Result<(), PlayerError> {
        if self.current.is_none() {
            return Err(PlayerError::Playback(String::from("no active track")));
        }
        self.position_offset = position;
        if !self.paused {
            self.started_at = Some(Instant::now());
        }
        self.finished_reported = false;
        Ok(())
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        let mut events = std::mem::take(&mut self.pending_events);

        if let Some(duration) = self.track_duration
            && self.current.is_some()
            && !self.paused
            && !self.finished_reported
            && self.current_position() >= duration
        {
            self.finished_reported = true;
            events.push(EngineEvent::Finished);
        }

        events
    }
}

/// Open the real engine, falling back to the silent one when the host has no
/// usable output device (CI, headless boxes).
pub fn open_engine() -> Box<dyn AudioEngine> {
    match RodioAudioEngine::new() {
        Ok(engine) => Box::new(engine),
        Err(err) => {
            warn!("no audio output available, running silent: {err:#}");
            Box::new(NullAudioEngine::new())
        }
    }
}
