//! Progress bar rendering

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Gauge},
    Frame,
};

use crate::model::PlaybackInfo;
use crate::player::PlaybackStatus;
use super::utils::format_duration;

pub fn render_progress_bar(frame: &mut Frame, area: Rect, playback: &PlaybackInfo) {
    let symbol = match playback.status {
        PlaybackStatus::Loading => "…",
        PlaybackStatus::Playing => "▶",
        PlaybackStatus::Paused => "⏸",
        PlaybackStatus::Stopped | PlaybackStatus::Ended => "■",
    };

    let status_text = if playback.position == 0 {
        " No track playing".to_string()
    } else {
        format!(
            " {} {} | {} ({})",
            symbol, playback.track.name, playback.track.artist, playback.track.album
        )
    };

    let time_str = format!(
        "{} / {}",
        format_duration(playback.progress_ms),
        format_duration(playback.duration_ms)
    );

    let progress_ratio = if playback.duration_ms > 0 {
        (playback.progress_ms as f64 / playback.duration_ms as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };


    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ", status_text))
                .title_bottom(Line::from(playback.controls_line()).right_aligned()),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(progress_ratio)
        .label(time_str);

    frame.render_widget(gauge, area);
}
