#![no_main]

use libfuzzer_sys::fuzz_target;
use mixtape::audio::NullAudioEngine;
use mixtape::core::PlayerCore;

fuzz_target!(|data: &[u8]| {
    let mut core = PlayerCore::new();
    let mut engine = NullAudioEngine::new();

    let seed = (data.first().copied().unwrap_or(1) as usize % 8).max(1);
    for idx in 0..seed {
        let _ = core.insert_remote(&format!("https://example.com/track-{idx}.mp3"));
    }

    let mut bytes = data.iter().copied();
    while let Some(op) = bytes.next() {
        match op % 10 {
            0 => core.select_and_play(bytes.next().unwrap_or(0) as usize, &mut engine),
            1 => core.next(&mut engine),
            2 => core.previous(&mut engine),
            3 => core.toggle_play_pause(&mut engine),
            4 => core.toggle_shuffle(),
            5 => core.cycle_repeat(),
            6 => core.remove(bytes.next().unwrap_or(0) as usize, &mut engine),
            7 => {
                let from = bytes.next().unwrap_or(0) as usize;
                let to = bytes.next().unwrap_or(0) as usize;
                core.reorder(from, to);
            }
            8 => {
                for event in engine.poll_events() {
                    core.on_engine_event(event, &mut engine);
                }
            }
            _ => {
                let _ = core.import_playlist(std::str::from_utf8(data).unwrap_or("{}"));
            }
        }

        if let Some(current) = core.current {
            assert!(current < core.tracks.len());
        }
        assert!(core.tracks.is_empty() || core.selected < core.tracks.len() || core.selected == 0);
    }
});
