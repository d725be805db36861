use crate::audio::{self, AudioEngine};
use crate::config::FileStore;
use crate::core::{self, PlayerCore};
use crate::media_keys::{MediaKeyCommand, MediaKeys};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;

const SEEK_STEP: Duration = Duration::from_secs(5);
const VOLUME_STEP: f32 = 0.05;

#[derive(Debug, Default)]
pub struct AppStartupOptions {
    /// Paths and URLs from the command line, appended after restore.
    pub additions: Vec<String>,
}

pub fn run() -> Result<()> {
    run_with_startup(AppStartupOptions::default())
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let mut store = FileStore::open()?;
    let mut core = PlayerCore::from_store(&mut store);
    add_startup_entries(&mut core, &options.additions);

    let mut engine = audio::open_engine();
    let mut media_keys = match MediaKeys::new() {
        Ok(keys) => Some(keys),
        Err(err) => {
            warn!("running without media keys: {err:#}");
            None
        }
    };

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut command_mode = false;
    let mut command_buffer = String::new();
    let mut search_mode = false;
    let mut last_tick = Instant::now();

    let result: Result<()> = loop {
        for engine_event in engine.poll_events() {
            core.on_engine_event(engine_event, &mut *engine);
        }

        if let Some(keys) = media_keys.as_mut() {
            for command in keys.poll() {
                match command {
                    MediaKeyCommand::Play | MediaKeyCommand::Pause | MediaKeyCommand::Toggle => {
                        core.toggle_play_pause(&mut *engine);
                    }
                    MediaKeyCommand::Next => core.next(&mut *engine),
                    MediaKeyCommand::Previous => core.previous(&mut *engine),
                }
            }
        }

        if core.take_needs_persist() {
            core.persist(&mut store);
        }

        if core.dirty || last_tick.elapsed() > Duration::from_millis(250) {
            if let Some(keys) = media_keys.as_mut() {
                let now_playing = core.now_playing().map(|track| {
                    (
                        track.title.as_str(),
                        track.artist.as_str(),
                        track.album.as_str(),
                    )
                });
                if let Err(err) =
                    keys.update(now_playing, core.playing, engine.position(), engine.duration())
                {
                    warn!("media key update failed: {err:#}");
                }
            }
            terminal.draw(|frame| {
                crate::ui::draw(
                    frame,
                    &core,
                    &*engine,
                    &command_buffer,
                    command_mode,
                    search_mode,
                )
            })?;
            core.dirty = false;
            last_tick = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if command_mode {
            match key.code {
                KeyCode::Esc => {
                    command_mode = false;
                    command_buffer.clear();
                    core.dirty = true;
                }
                KeyCode::Enter => {
                    run_command(&mut core, &mut *engine, &command_buffer);
                    command_mode = false;
                    command_buffer.clear();
                }
                KeyCode::Backspace => {
                    command_buffer.pop();
                    core.dirty = true;
                }
                KeyCode::Char(ch) => {
                    command_buffer.push(ch);
                    core.dirty = true;
                }
                _ => {}
            }
            continue;
        }

        if search_mode {
            // The filter narrows the visible list as it is typed. Enter
            // keeps it applied, Esc drops it.
            match key.code {
                KeyCode::Esc => {
                    search_mode = false;
                    core.set_filter("");
                }
                KeyCode::Enter => {
                    search_mode = false;
                    core.dirty = true;
                }
                KeyCode::Backspace => {
                    let mut query = core.filter.clone();
                    query.pop();
                    core.set_filter(&query);
                }
                KeyCode::Char(ch) => {
                    let mut query = core.filter.clone();
                    query.push(ch);
                    core.set_filter(&query);
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break Ok(()),
            KeyCode::Char('q') => break Ok(()),
            KeyCode::Down => core.select_next(),
            KeyCode::Up => core.select_prev(),
            KeyCode::Enter => core.select_and_play(core.selected, &mut *engine),
            KeyCode::Char(' ') => core.toggle_play_pause(&mut *engine),
            KeyCode::Char('n') => core.next(&mut *engine),
            KeyCode::Char('p') => core.previous(&mut *engine),
            KeyCode::Char('s') => core.toggle_shuffle(),
            KeyCode::Char('r') => core.cycle_repeat(),
            KeyCode::Char('m') => {
                let muted = !engine.muted();
                engine.set_muted(muted);
                core.set_status(if muted { "Muted" } else { "Unmuted" });
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                adjust_volume(&mut core, &mut *engine, VOLUME_STEP);
            }
            KeyCode::Char('-') => adjust_volume(&mut core, &mut *engine, -VOLUME_STEP),
            KeyCode::Right => seek_relative(&mut core, &mut *engine, true),
            KeyCode::Left => seek_relative(&mut core, &mut *engine, false),
            KeyCode::Char('d') | KeyCode::Delete => core.remove(core.selected, &mut *engine),
            KeyCode::Char('J') => {
                let selected = core.selected;
                if selected + 1 < core.tracks.len() {
                    core.reorder(selected, selected + 1);
                    core.selected = selected + 1;
                }
            }
            KeyCode::Char('K') => {
                let selected = core.selected;
                if selected > 0 && selected < core.tracks.len() {
                    core.reorder(selected, selected - 1);
                    core.selected = selected - 1;
                }
            }
            KeyCode::Char(':') => {
                command_mode = true;
                core.dirty = true;
            }
            KeyCode::Char('/') => {
                search_mode = true;
                core.dirty = true;
            }
            KeyCode::Esc if !core.filter.is_empty() => core.set_filter(""),
            _ => {}
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    core.persist(&mut store);
    result
}

fn adjust_volume(core: &mut PlayerCore, engine: &mut dyn AudioEngine, delta: f32) {
    let next = (engine.volume() + delta).clamp(0.0, 1.0);
    engine.set_volume(next);
    core.set_status(&format!("Volume: {}%", (next * 100.0).round() as u16));
}

fn seek_relative(core: &mut PlayerCore, engine: &mut dyn AudioEngine, forward: bool) {
    let Some(position) = engine.position() else {
        return;
    };
    let target = if forward {
        let next = position.saturating_add(SEEK_STEP);
        engine.duration().map_or(next, |total| next.min(total))
    } else {
        position.saturating_sub(SEEK_STEP)
    };
    match engine.seek_to(target) {
        Ok(()) => core.dirty = true,
        Err(err) => core.set_status(&format!("seek error: {err}")),
    }
}

fn add_startup_entries(core: &mut PlayerCore, additions: &[String]) {
    for entry in additions {
        if entry.starts_with("http://") || entry.starts_with("https://") {
            if let Err(err) = core.insert_remote(entry) {
                core.set_status(&format!("{err}"));
            }
            continue;
        }
        let path = PathBuf::from(entry);
        if core::is_audio_file(&path) {
            core.insert_local(&path);
        } else {
            core.set_status(&format!("Skipping non-audio file {entry}"));
        }
    }
}

fn run_command(core: &mut PlayerCore, engine: &mut dyn AudioEngine, raw: &str) {
    let input = raw.trim();
    if input.is_empty() {
        core.set_status("No command");
        return;
    }

    let mut command_split = input.splitn(2, char::is_whitespace);
    let command = command_split.next().unwrap_or_default();
    let rest = command_split.next().unwrap_or("").trim();

    match command {
        "help" => {
            core.set_status(
                "Commands: add <path> | url <http(s) url> | export <file> | import <file> | clear",
            );
        }
        "add" => {
            if rest.is_empty() {
                core.set_status("Usage: add <path>");
            } else if core::is_audio_file(Path::new(rest)) {
                core.insert_local(Path::new(rest));
            } else {
                core.set_status("Not an audio file");
            }
        }
        "url" => {
            if rest.is_empty() {
                core.set_status("Usage: url <http(s) url>");
            } else if let Err(err) = core.insert_remote(rest) {
                core.set_status(&format!("{err}"));
            }
        }
        "export" => {
            if rest.is_empty() {
                core.set_status("Usage: export <file>");
                return;
            }
            match core.export_playlist() {
                Ok(json) => match fs::write(rest, json) {
                    Ok(()) => core.set_status(&format!("Exported playlist to {rest}")),
                    Err(err) => core.set_status(&format!("export error: {err}")),
                },
                Err(err) => core.set_status(&format!("export error: {err}")),
            }
        }
        "import" => {
            if rest.is_empty() {
                core.set_status("Usage: import <file>");
                return;
            }
            match fs::read_to_string(rest) {
                Ok(raw) => {
                    if let Err(err) = core.import_playlist(&raw) {
                        core.set_status(&format!("import error: {err}"));
                    }
                }
                Err(err) => core.set_status(&format!("import error: {err}")),
            }
        }
        "clear" => core.clear(engine),
        _ => core.set_status("Unknown command. Use :help"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudioEngine;

    #[test]
    fn unknown_command_is_reported() {
        let mut core = PlayerCore::new();
        let mut engine = NullAudioEngine::new();
        run_command(&mut core, &mut engine, "wat");
        assert!(core.status.contains("Unknown command"));
    }

    #[test]
    fn url_command_appends_a_remote_track() {
        let mut core = PlayerCore::new();
        let mut engine = NullAudioEngine::new();

        run_command(&mut core, &mut engine, "url https://example.com/a.mp3");

        assert_eq!(core.tracks.len(), 1);
        assert!(!core.tracks[0].source.is_local());
    }

    #[test]
    fn url_command_reports_malformed_urls() {
        let mut core = PlayerCore::new();
        let mut engine = NullAudioEngine::new();

        run_command(&mut core, &mut engine, "url nope");

        assert!(core.tracks.is_empty());
        assert!(core.status.contains("invalid url"));
    }

    #[test]
    fn add_command_rejects_non_audio_paths() {
        let mut core = PlayerCore::new();
        let mut engine = NullAudioEngine::new();

        run_command(&mut core, &mut engine, "add notes.txt");

        assert!(core.tracks.is_empty());
        assert!(core.status.contains("Not an audio file"));
    }

    #[test]
    fn clear_command_empties_the_playlist() {
        let mut core = PlayerCore::new();
        let mut engine = NullAudioEngine::new();
        core.insert_remote("https://example.com/a.mp3").expect("insert");

        run_command(&mut core, &mut engine, "clear");

        assert!(core.tracks.is_empty());
        assert_eq!(core.current, None);
    }

    #[test]
    fn export_and_import_commands_round_trip_through_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("playlist.json");
        let file_arg = file.to_string_lossy().to_string();

        let mut core = PlayerCore::new();
        let mut engine = NullAudioEngine::new();
        core.insert_remote("https://example.com/a.mp3").expect("insert");
        run_command(&mut core, &mut engine, &format!("export {file_arg}"));
        assert!(core.status.contains("Exported"));

        let mut other = PlayerCore::new();
        run_command(&mut other, &mut engine, &format!("import {file_arg}"));

        assert_eq!(other.tracks.len(), 1);
        assert_eq!(other.tracks[0].title, core.tracks[0].title);
    }

    #[test]
    fn startup_entries_distinguish_urls_from_paths() {
        let mut core = PlayerCore::new();

        add_startup_entries(
            &mut core,
            &[
                String::from("https://example.com/a.mp3"),
                String::from("song.flac"),
                String::from("notes.txt"),
            ],
        );

        assert_eq!(core.tracks.len(), 2);
        assert!(!core.tracks[0].source.is_local());
        assert!(core.tracks[1].source.is_local());
    }
}
