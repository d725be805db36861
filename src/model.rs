use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::One => "one",
            Self::All => "all",
        }
    }
}

/// Where a track's audio comes from. Local paths are ephemeral: they are
/// never persisted or exported because they mean nothing on another machine
/// or after the file moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Local(PathBuf),
    Remote(String),
}

impl TrackSource {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// `album` is display-only metadata for the media-key sink; it never goes
/// on the wire (remote entries carry none, local entries are not persisted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub source: TrackSource,
}

/// On-disk and export shape of a track. Field names follow the stored
/// playlist format: `src` plus a camel-case `isLocal` marker, which is
/// always false in anything we write out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTrack {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub src: String,
    #[serde(default, rename = "isLocal")]
    pub is_local: bool,
}

impl WireTrack {
    /// Local tracks are not representable on the wire.
    pub fn from_track(track: &Track) -> Option<Self> {
        let TrackSource::Remote(src) = &track.source else {
            return None;
        };
        Some(Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            src: src.clone(),
            is_local: false,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredPlaylist {
    #[serde(default)]
    pub tracks: Vec<WireTrack>,
}

/// Seed playlist used when no stored playlist exists or it cannot be read.
pub fn sample_tracks() -> Vec<WireTrack> {
    [
        (
            "SoundHelix Song 1",
            "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3",
        ),
        (
            "SoundHelix Song 3",
            "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-3.mp3",
        ),
        (
            "SoundHelix Song 6",
            "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-6.mp3",
        ),
    ]
    .into_iter()
    .map(|(title, src)| WireTrack {
        id: String::new(),
        title: title.to_string(),
        artist: String::from("SoundHelix"),
        src: src.to_string(),
        is_local: false,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_mode_cycles() {
        assert_eq!(RepeatMode::Off.next(), RepeatMode::One);
        assert_eq!(RepeatMode::One.next(), RepeatMode::All);
        assert_eq!(RepeatMode::All.next(), RepeatMode::Off);
    }

    #[test]
    fn wire_track_uses_camel_case_local_marker() {
        let json = serde_json::to_string(&WireTrack {
            id: String::from("abc"),
            title: String::from("t"),
            artist: String::new(),
            src: String::from("https://example.com/t.mp3"),
            is_local: false,
        })
        .expect("serialize");
        assert!(json.contains("\"isLocal\":false"));
    }

    #[test]
    fn wire_track_tolerates_sparse_import_entries() {
        let entry: WireTrack =
            serde_json::from_str(r#"{"src":"https://example.com/a.mp3"}"#).expect("parse");
        assert_eq!(entry.src, "https://example.com/a.mp3");
        assert!(entry.id.is_empty());
        assert!(entry.title.is_empty());
        assert!(!entry.is_local);
    }

    #[test]
    fn local_tracks_have_no_wire_form() {
        let track = Track {
            id: String::from("x"),
            title: String::from("local"),
            artist: String::new(),
            album: String::new(),
            source: TrackSource::Local(PathBuf::from("a.mp3")),
        };
        assert!(WireTrack::from_track(&track).is_none());
    }
}
