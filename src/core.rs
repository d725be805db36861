use crate::audio::{AudioEngine, EngineEvent};
use crate::config::{self, KvStore};
use crate::error::PlayerError;
use crate::model::{RepeatMode, StoredPlaylist, Track, TrackSource, WireTrack, sample_tracks};
use lofty::file::TaggedFileExt;
use lofty::prelude::ItemKey;
use lofty::probe::Probe;
use rand::SeedableRng;
use rand::distr::Alphanumeric;
use rand::rngs::SmallRng;
use rand::Rng;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Double-pressing previous within this window skips back a track instead of
/// restarting the current one.
const RESTART_THRESHOLD: Duration = Duration::from_secs(3);

/// The playlist/playback state machine. Owns the ordered track list, the
/// current-track pointer and the shuffle/repeat flags; everything else in the
/// program mutates playlist state exclusively through these methods and
/// re-renders when `dirty` is set.
///
/// `playing` mirrors what the engine reports through its events, not what we
/// last asked it to do.
#[derive(Debug)]
pub struct PlayerCore {
    pub tracks: Vec<Track>,
    pub current: Option<usize>,
    pub playing: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub selected: usize,
    pub dirty: bool,
    pub status: String,
    /// Live playlist search text. Narrows the visible list only; playback
    /// order and the stored playlist are unaffected.
    pub filter: String,
    needs_persist: bool,
    rng: SmallRng,
}

impl PlayerCore {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            playing: false,
            shuffle: false,
            repeat: RepeatMode::Off,
            selected: 0,
            dirty: true,
            status: String::from("Ready"),
            filter: String::new(),
            needs_persist: false,
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Startup constructor: load the persisted playlist, or seed the sample
    /// tracks when nothing usable is stored. Corrupt data counts as absent;
    /// it is never a hard failure.
    pub fn from_store(store: &mut dyn KvStore) -> Self {
        let mut core = Self::new();
        match store.get(config::PLAYLIST_KEY) {
            Some(raw) => match serde_json::from_str::<StoredPlaylist>(&raw) {
                Ok(stored) => {
                    core.adopt_wire_tracks(stored.tracks, true);
                }
                Err(err) => {
                    warn!("stored playlist is unreadable, reseeding: {err}");
                    core.seed_and_persist(store);
                }
            },
            None => core.seed_and_persist(store),
        }
        core
    }

    fn seed_and_persist(&mut self, store: &mut dyn KvStore) {
        self.adopt_wire_tracks(sample_tracks(), false);
        self.needs_persist = false;
        self.persist(store);
    }

    /// Appends wire entries as remote tracks. Entries without a source are
    /// skipped. Stored ids are kept when `trust_ids` is set (and they do not
    /// collide); imported ids are never trusted.
    fn adopt_wire_tracks(&mut self, entries: Vec<WireTrack>, trust_ids: bool) -> usize {
        let mut added = 0;
        for entry in entries {
            if entry.src.trim().is_empty() {
                continue;
            }
            let id = if trust_ids && !entry.id.is_empty() && !self.id_in_use(&entry.id) {
                entry.id
            } else {
                self.fresh_id()
            };
            let title = if entry.title.trim().is_empty() {
                title_from_src(&entry.src)
            } else {
                entry.title
            };
            self.tracks.push(Track {
                id,
                title,
                artist: entry.artist,
                album: String::new(),
                source: TrackSource::Remote(entry.src),
            });
            added += 1;
        }
        self.dirty = true;
        added
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.tracks.iter().any(|track| track.id == id)
    }

    fn fresh_id(&mut self) -> String {
        loop {
            let id: String = (&mut self.rng)
                .sample_iter(Alphanumeric)
                .take(8)
                .map(char::from)
                .collect::<String>()
                .to_ascii_lowercase();
            if !self.id_in_use(&id) {
                return id;
            }
        }
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.tracks.get(self.current?)
    }

    pub fn take_needs_persist(&mut self) -> bool {
        std::mem::take(&mut self.needs_persist)
    }

    // --- selection & transport ---

    /// Out-of-range indices are ignored. Engine failure is reported and
    /// leaves `playing` false; there is no retry.
    pub fn select_and_play(&mut self, index: usize, engine: &mut dyn AudioEngine) {
        let Some(track) = self.tracks.get(index) else {
            return;
        };
        let title = track.title.clone();
        let source = track.source.clone();

        self.current = Some(index);
        match engine.play(&source) {
            Ok(()) => {
                self.playing = true;
                self.needs_persist = true;
                self.set_status(&format!("Playing {title}"));
            }
            Err(err) => {
                warn!("could not play {title}: {err}");
                self.playing = false;
                self.set_status(&format!("Cannot play {title}: {err}"));
            }
        }
    }

    pub fn toggle_play_pause(&mut self, engine: &mut dyn AudioEngine) {
        if engine.current_source().is_none() {
            if !self.tracks.is_empty() {
                self.select_and_play(0, engine);
            }
            return;
        }

        // `playing` flips when the engine's own pause/resume event arrives.
        if engine.is_paused() {
            engine.resume();
        } else {
            engine.pause();
        }
        self.dirty = true;
    }

    pub fn next(&mut self, engine: &mut dyn AudioEngine) {
        if self.tracks.is_empty() {
            return;
        }

        if self.shuffle {
            // Uniform over the whole list; repeating the current track by
            // chance is accepted.
            let index = self.rng.random_range(0..self.tracks.len());
            self.select_and_play(index, engine);
            return;
        }

        match self.current {
            Some(current) if current + 1 < self.tracks.len() => {
                self.select_and_play(current + 1, engine);
            }
            None => self.select_and_play(0, engine),
            Some(_) if self.repeat == RepeatMode::All => self.select_and_play(0, engine),
            Some(_) => {
                engine.pause();
                self.playing = false;
                self.set_status("End of playlist");
            }
        }
    }

    pub fn previous(&mut self, engine: &mut dyn AudioEngine) {
        if engine
            .position()
            .is_some_and(|position| position > RESTART_THRESHOLD)
        {
            if let Err(err) = engine.seek_to(Duration::ZERO) {
                warn!("restart seek failed: {err}");
            }
            self.dirty = true;
            return;
        }

        match self.current {
            Some(current) if current > 0 => self.select_and_play(current - 1, engine),
            Some(_) if self.repeat == RepeatMode::All && !self.tracks.is_empty() => {
                self.select_and_play(self.tracks.len() - 1, engine);
            }
            _ => {}
        }
    }

    /// Inbound engine events. Each one is a small, explicit state
    /// transition; rendering hangs off `dirty`.
    pub fn on_engine_event(&mut self, event: EngineEvent, engine: &mut dyn AudioEngine) {
        match event {
            EngineEvent::Started | EngineEvent::Resumed => {
                // A start notification for a source we no longer point at is
                // a superseded load; ignore it.
                let intended = self
                    .now_playing()
                    .is_some_and(|track| engine.current_source() == Some(&track.source));
                if intended {
                    self.playing = true;
                    self.dirty = true;
                }
            }
            EngineEvent::Paused => {
                self.playing = false;
                self.dirty = true;
            }
            EngineEvent::Finished => {
                if self.repeat == RepeatMode::One {
                    match engine.seek_to(Duration::ZERO) {
                        Ok(()) => engine.resume(),
                        Err(err) => warn!("repeat-one restart failed: {err}"),
                    }
                    self.dirty = true;
                } else {
                    self.next(engine);
                }
            }
            EngineEvent::Progress(_) | EngineEvent::MetadataLoaded(_) => {
                self.dirty = true;
            }
        }
    }

    pub fn toggle_shuffle(&mut self) {
        self.shuffle = !self.shuffle;
        self.set_status(if self.shuffle {
            "Shuffle on"
        } else {
            "Shuffle off"
        });
    }

    pub fn cycle_repeat(&mut self) {
        self.repeat = self.repeat.next();
        self.set_status(&format!("Repeat: {}", self.repeat.label()));
    }

    // --- mutation ---

    pub fn insert_local(&mut self, path: &Path) {
        let (tag_title, tag_artist, tag_album) = embedded_metadata(path);
        let title = tag_title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| {
                path.file_stem()
                    .and_then(OsStr::to_str)
                    .unwrap_or("unknown")
                    .to_string()
            });
        let id = self.fresh_id();
        self.tracks.push(Track {
            id,
            title: title.clone(),
            artist: tag_artist.unwrap_or_default(),
            album: tag_album.unwrap_or_default(),
            source: TrackSource::Local(path.to_path_buf()),
        });
        self.needs_persist = true;
        self.set_status(&format!("Added {title}"));
    }

    pub fn insert_remote(&mut self, raw: &str) -> Result<(), PlayerError> {
        let url =
            Url::parse(raw).map_err(|err| PlayerError::InvalidUri(format!("{raw}: {err}")))?;
        let title = title_from_url(&url);
        let id = self.fresh_id();
        self.tracks.push(Track {
            id,
            title: title.clone(),
            artist: String::new(),
            album: String::new(),
            source: TrackSource::Remote(url.into()),
        });
        self.needs_persist = true;
        self.set_status(&format!("Added {title}"));
        Ok(())
    }

    pub fn remove(&mut self, index: usize, engine: &mut dyn AudioEngine) {
        if index >= self.tracks.len() {
            return;
        }
        let removed = self.tracks.remove(index);

        match self.current {
            Some(current) if current == index => {
                engine.stop();
                self.current = None;
                self.playing = false;
            }
            Some(current) if index < current => self.current = Some(current - 1),
            _ => {}
        }

        if self.selected >= self.tracks.len() {
            self.selected = self.tracks.len().saturating_sub(1);
        }
        self.needs_persist = true;
        self.set_status(&format!("Removed {}", removed.title));
    }

    /// Moves the track at `from` to `to`, shifting the tracks in between.
    /// The current pointer is remapped so the same logical track stays
    /// selected.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from == to || from >= self.tracks.len() || to >= self.tracks.len() {
            return;
        }
        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(current) = self.current {
            self.current = Some(if current == from {
                to
            } else if from < current && current <= to {
                current - 1
            } else if to <= current && current < from {
                current + 1
            } else {
                current
            });
        }
        self.needs_persist = true;
        self.dirty = true;
    }

    pub fn clear(&mut self, engine: &mut dyn AudioEngine) {
        engine.stop();
        self.tracks.clear();
        self.current = None;
        self.playing = false;
        self.selected = 0;
        self.needs_persist = true;
        self.set_status("Playlist cleared");
    }

    // --- import / export ---

    /// JSON array of the non-local tracks. Local entries are not portable
    /// and are left out.
    pub fn export_playlist(&self) -> Result<String, PlayerError> {
        let entries: Vec<WireTrack> = self.tracks.iter().filter_map(WireTrack::from_track).collect();
        serde_json::to_string_pretty(&entries).map_err(|err| PlayerError::Parse(err.to_string()))
    }

    /// Appends every entry that carries a source, under fresh ids. Anything
    /// that is not a JSON array aborts without touching the playlist.
    pub fn import_playlist(&mut self, raw: &str) -> Result<usize, PlayerError> {
        let entries: Vec<WireTrack> =
            serde_json::from_str(raw).map_err(|err| PlayerError::Parse(err.to_string()))?;
        let added = self.adopt_wire_tracks(entries, false);
        if added > 0 {
            self.needs_persist = true;
        }
        self.set_status(&format!("Imported {added} tracks"));
        Ok(added)
    }

    // --- persistence ---

    /// Writes the non-local tracks under the playlist key. Storage failures
    /// are logged and swallowed; playback is never interrupted by them.
    pub fn persist(&mut self, store: &mut dyn KvStore) {
        self.needs_persist = false;
        let stored = StoredPlaylist {
            tracks: self.tracks.iter().filter_map(WireTrack::from_track).collect(),
        };
        let json = match serde_json::to_string_pretty(&stored) {
            Ok(json) => json,
            Err(err) => {
                warn!("could not serialize playlist: {err}");
                return;
            }
        };
        if let Err(err) = store.set(config::PLAYLIST_KEY, &json) {
            warn!("could not persist playlist: {err}");
            self.set_status("Could not save playlist");
        }
    }

    // --- UI selection & search ---

    /// Indices of the tracks the active filter leaves visible, in playlist
    /// order. An empty filter matches everything; matching is
    /// case-insensitive over title and artist.
    pub fn visible_indices(&self) -> Vec<usize> {
        if self.filter.is_empty() {
            return (0..self.tracks.len()).collect();
        }
        let needle = self.filter.to_lowercase();
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| {
                track.title.to_lowercase().contains(&needle)
                    || track.artist.to_lowercase().contains(&needle)
            })
            .map(|(index, _)| index)
            .collect()
    }

    pub fn set_filter(&mut self, query: &str) {
        self.filter = query.to_string();
        let visible = self.visible_indices();
        if !visible.contains(&self.selected)
            && let Some(&first) = visible.first()
        {
            self.selected = first;
        }
        self.dirty = true;
    }

    pub fn select_next(&mut self) {
        let visible = self.visible_indices();
        let Some(&last) = visible.last() else {
            return;
        };
        self.selected = visible
            .iter()
            .copied()
            .find(|&index| index > self.selected)
            .unwrap_or(last);
        self.dirty = true;
    }

    pub fn select_prev(&mut self) {
        let visible = self.visible_indices();
        let Some(&first) = visible.first() else {
            return;
        };
        self.selected = visible
            .iter()
            .rev()
            .copied()
            .find(|&index| index < self.selected)
            .unwrap_or(first);
        self.dirty = true;
    }

    pub fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}

impl Default for PlayerCore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

fn embedded_metadata(path: &Path) -> (Option<String>, Option<String>, Option<String>) {
    let Ok(tagged) = Probe::open(path).and_then(|probe| probe.read()) else {
        return (None, None, None);
    };
    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        return (None, None, None);
    };
    (
        tag.get_string(&ItemKey::TrackTitle).map(str::to_string),
        tag.get_string(&ItemKey::TrackArtist).map(str::to_string),
        tag.get_string(&ItemKey::AlbumTitle).map(str::to_string),
    )
}

fn title_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).next_back());
    match segment {
        Some(segment) => urlencoding::decode(segment)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| segment.to_string()),
        None => url.as_str().to_string(),
    }
}

fn title_from_src(src: &str) -> String {
    Url::parse(src)
        .ok()
        .map(|url| title_from_url(&url))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| src.to_string())
}
