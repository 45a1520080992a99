//! Main content area rendering (the current library screen)

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, ListItem, Paragraph},
    Frame,
};
use ratatui::widgets::Padding;

use crate::library::{LibraryObject, Song};
use crate::model::{ActiveSection, ContentState, UiState};
use super::utils::{calculate_num_width, format_duration, render_scrollable_list, truncate_string};

pub fn render_main_content(
    frame: &mut Frame,
    area: Rect,
    ui_state: &UiState,
    content_state: &ContentState,
    current_song: Option<&Song>,
) {
    let is_focused = ui_state.active_section == ActiveSection::MainContent;
    let border_style = if is_focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let Some(view) = content_state.current().filter(|view| !view.items.is_empty()) else {
        let content = Paragraph::new(
            "Nothing here yet\n\nAdd music to the music directory or enable Spotify\nUse Tab to navigate between sections",
        )
        .style(Style::default().fg(Color::DarkGray))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .padding(Padding::horizontal(1))
                .border_style(border_style),
        );
        frame.render_widget(content, area);
        return;
    };

    let content_width = area.width.saturating_sub(4) as usize;
    let num_width = calculate_num_width(view.items.len());
    // " {num}   {name}   {subtitle}   {duration}"
    let fixed_width = 1 + num_width + 3 + 3 + 3 + 6;
    let remaining = content_width.saturating_sub(fixed_width);
    let name_width = remaining * 55 / 100;
    let subtitle_width = remaining.saturating_sub(name_width);

    let items: Vec<ListItem> = view
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let is_selected = i == view.selected_index;
            let is_current = matches!(
                (item, current_song),
                (LibraryObject::Song(song), Some(current)) if song.key() == current.key()
            );

            let duration = match item {
                LibraryObject::Song(song) => song.duration_ms.map(|ms| format_duration(ms as u64)).unwrap_or_default(),
                _ => String::new(),
            };

            let text = format!(
                " {:>num$}   {}   {}   {:>6}",
                i + 1,
                truncate_string(item.name(), name_width),
                truncate_string(&item.subtitle(), subtitle_width),
                duration,
                num = num_width
            );

            let style = if is_selected && is_focused {
                Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD)
            } else if is_current {
                Style::default().fg(Color::Green)
            } else if is_selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(text).style(style)
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ({}) ", view.title, view.items.len()))
        .padding(Padding::horizontal(1))
        .border_style(border_style);

    render_scrollable_list(frame, area, items, view.selected_index, block);
}
