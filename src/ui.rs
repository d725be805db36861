use crate::audio::AudioEngine;
use crate::core::PlayerCore;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph};
use std::time::Duration;

const APP_TITLE: &str = "Mixtape v0.1.0  ";

struct Palette {
    bg: Color,
    panel_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    selected_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(10, 15, 24),
    panel_bg: Color::Rgb(19, 29, 43),
    border: Color::Rgb(69, 121, 176),
    text: Color::Rgb(214, 228, 248),
    muted: Color::Rgb(149, 173, 204),
    accent: Color::Rgb(100, 203, 184),
    selected_bg: Color::Rgb(34, 55, 82),
};

pub fn draw(
    frame: &mut Frame,
    core: &PlayerCore,
    engine: &dyn AudioEngine,
    command_buffer: &str,
    command_mode: bool,
    search_mode: bool,
) {
    frame.render_widget(
        Block::default().style(Style::default().bg(PALETTE.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_now_playing(frame, vertical[0], core, engine);
    draw_playlist(frame, vertical[1], core);
    draw_progress(frame, vertical[2], engine);
    draw_status(frame, vertical[3], core, command_buffer, command_mode, search_mode);
}

fn draw_now_playing(frame: &mut Frame, area: Rect, core: &PlayerCore, engine: &dyn AudioEngine) {
    let line = match core.now_playing() {
        Some(track) if track.artist.is_empty() => track.title.clone(),
        Some(track) => format!("{} - {}", track.title, track.artist),
        None => String::from("No track selected"),
    };

    let flags = format!(
        "{} shuffle:{} repeat:{} vol:{}%{}",
        if core.playing { "▶" } else { "⏸" },
        if core.shuffle { "on" } else { "off" },
        core.repeat.label(),
        (engine.volume() * 100.0).round() as u16,
        if engine.muted() { " muted" } else { "" },
    );

    let header = Paragraph::new(Line::from(vec![
        Span::styled(line, Style::default().fg(PALETTE.accent)),
        Span::raw("   "),
        Span::styled(flags, Style::default().fg(PALETTE.muted)),
    ]))
    .block(
        Block::default()
            .title(APP_TITLE)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(PALETTE.border))
            .style(Style::default().bg(PALETTE.panel_bg)),
    );
    frame.render_widget(header, area);
}

fn draw_playlist(frame: &mut Frame, area: Rect, core: &PlayerCore) {
    let visible = core.visible_indices();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|&index| {
            let track = &core.tracks[index];
            let marker = if Some(index) == core.current { "▶ " } else { "  " };
            let subtitle = if track.artist.is_empty() {
                if track.source.is_local() { "Local file" } else { "Remote" }.to_string()
            } else {
                track.artist.clone()
            };
            let style = if Some(index) == core.current {
                Style::default().fg(PALETTE.accent)
            } else {
                Style::default().fg(PALETTE.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{marker}{}", track.title), style),
                Span::styled(format!("  {subtitle}"), Style::default().fg(PALETTE.muted)),
            ]))
        })
        .collect();

    let title = if core.filter.is_empty() {
        format!("Playlist ({})", core.tracks.len())
    } else {
        format!(
            "Playlist ({}/{})  /{}",
            visible.len(),
            core.tracks.len(),
            core.filter
        )
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.border))
                .style(Style::default().bg(PALETTE.panel_bg)),
        )
        .highlight_style(Style::default().bg(PALETTE.selected_bg));

    let mut state = ListState::default();
    state.select(visible.iter().position(|&index| index == core.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_progress(frame: &mut Frame, area: Rect, engine: &dyn AudioEngine) {
    let position = engine.position().unwrap_or(Duration::ZERO);
    let duration = engine.duration();
    let ratio = duration
        .filter(|total| !total.is_zero())
        .map(|total| (position.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0))
        .unwrap_or(0.0);

    let label = format!(
        "{} / {}",
        format_duration(position),
        duration.map(format_duration).unwrap_or_else(|| String::from("0:00")),
    );

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.border))
                .style(Style::default().bg(PALETTE.panel_bg)),
        )
        .gauge_style(Style::default().fg(PALETTE.accent).bg(PALETTE.selected_bg))
        .ratio(ratio)
        .label(label);
    frame.render_widget(gauge, area);
}

fn draw_status(
    frame: &mut Frame,
    area: Rect,
    core: &PlayerCore,
    command_buffer: &str,
    command_mode: bool,
    search_mode: bool,
) {
    let content = if command_mode {
        Line::from(vec![
            Span::styled(":", Style::default().fg(PALETTE.accent)),
            Span::styled(command_buffer.to_string(), Style::default().fg(PALETTE.text)),
        ])
    } else if search_mode {
        Line::from(vec![
            Span::styled("/", Style::default().fg(PALETTE.accent)),
            Span::styled(core.filter.clone(), Style::default().fg(PALETTE.text)),
        ])
    } else {
        Line::from(vec![
            Span::styled(core.status.clone(), Style::default().fg(PALETTE.text)),
            Span::styled(
                "  [space] play/pause  [n/p] next/prev  [s] shuffle  [r] repeat  [/] search  [:] command",
                Style::default().fg(PALETTE.muted),
            ),
        ])
    };

    let status = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(PALETTE.border))
            .style(Style::default().bg(PALETTE.panel_bg)),
    );
    frame.render_widget(status, area);
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_format_as_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::ZERO), "0:00");
        assert_eq!(format_duration(Duration::from_secs(61)), "1:01");
        assert_eq!(format_duration(Duration::from_secs(600)), "10:00");
    }
}
