//! Layout rendering (top bar, category sidebar)

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};
use ratatui::widgets::Padding;

use crate::model::{ActiveSection, Category, ContentState, UiState};

pub fn render_top_bar(frame: &mut Frame, area: Rect, content_state: &ContentState, device_name: &str) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),     // Breadcrumb
            Constraint::Length(30), // Device name
        ])
        .split(area);

    let breadcrumb = content_state
        .current()
        .map(|view| view.title.clone())
        .unwrap_or_default();
    let depth = content_state.depth();
    let location = if depth > 1 {
        format!("{}  (Backspace to go back)", breadcrumb)
    } else {
        breadcrumb
    };

    let header = Paragraph::new(location)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Blade ")
                .padding(Padding::horizontal(1)),
        );
    frame.render_widget(header, chunks[0]);

    let device = Paragraph::new(format!("🎵 {}", device_name))
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(" Device "));
    frame.render_widget(device, chunks[1]);
}

pub fn render_sidebar(frame: &mut Frame, area: Rect, ui_state: &UiState) {
    let focused = ui_state.active_section == ActiveSection::Categories;

    let items: Vec<ListItem> = Category::ALL
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let style = if i == ui_state.category_selected && focused {
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else if i == ui_state.category_selected {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(category.name()).style(style)
        })
        .collect();

    let border_style = if focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let library = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Library ")
            .padding(Padding::horizontal(1))
            .border_style(border_style),
    );
    frame.render_widget(library, area);
}
