use anyhow::{Result, anyhow};
use souvlaki::{
    MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, MediaPosition, PlatformConfig,
};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Transport commands arriving from OS media keys. They map straight onto
/// the core's toggle/next/previous operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKeyCommand {
    Play,
    Pause,
    Toggle,
    Next,
    Previous,
}

pub struct MediaKeys {
    controls: MediaControls,
    receiver: Receiver<MediaKeyCommand>,
}

impl MediaKeys {
    pub fn new() -> Result<Self> {
        let config = PlatformConfig {
            dbus_name: "mixtape",
            display_name: "Mixtape",
            hwnd: None,
        };

        let mut controls = MediaControls::new(config)
            .map_err(|err| anyhow!("media controls unavailable: {err:?}"))?;

        let (sender, receiver) = mpsc::channel::<MediaKeyCommand>();
        attach_handler(&mut controls, sender)?;

        Ok(Self { controls, receiver })
    }

    pub fn poll(&mut self) -> Vec<MediaKeyCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = self.receiver.try_recv() {
            commands.push(command);
        }
        commands
    }

    /// Pushes now-playing metadata and transport state to the OS. Empty
    /// artist/album strings are treated as absent.
    pub fn update(
        &mut self,
        now_playing: Option<(&str, &str, &str)>,
        playing: bool,
        position: Option<Duration>,
        duration: Option<Duration>,
    ) -> Result<()> {
        match now_playing {
            Some((title, artist, album)) => {
                self.controls
                    .set_metadata(MediaMetadata {
                        title: Some(title),
                        artist: (!artist.is_empty()).then_some(artist),
                        album: (!album.is_empty()).then_some(album),
                        duration,
                        ..Default::default()
                    })
                    .map_err(|err| anyhow!("media metadata update failed: {err:?}"))?;
                let progress = position.map(MediaPosition);
                let playback = if playing {
                    MediaPlayback::Playing { progress }
                } else {
                    MediaPlayback::Paused { progress }
                };
                self.controls
                    .set_playback(playback)
                    .map_err(|err| anyhow!("media playback update failed: {err:?}"))
            }
            None => self
                .controls
                .set_playback(MediaPlayback::Stopped)
                .map_err(|err| anyhow!("media playback update failed: {err:?}")),
        }
    }
}

fn attach_handler(controls: &mut MediaControls, sender: Sender<MediaKeyCommand>) -> Result<()> {
    controls
        .attach(move |event: MediaControlEvent| {
            let command = match event {
                MediaControlEvent::Play => Some(MediaKeyCommand::Play),
                MediaControlEvent::Pause => Some(MediaKeyCommand::Pause),
                MediaControlEvent::Toggle => Some(MediaKeyCommand::Toggle),
                MediaControlEvent::Next => Some(MediaKeyCommand::Next),
                MediaControlEvent::Previous => Some(MediaKeyCommand::Previous),
                _ => None,
            };
            if let Some(command) = command {
                let _ = sender.send(command);
            }
        })
        .map_err(|err| anyhow!("media controls attach failed: {err:?}"))
}
