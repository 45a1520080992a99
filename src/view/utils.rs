//! Utility functions for rendering UI components

use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Block, List, ListItem, ListState},
    Frame,
};

pub fn render_scrollable_list(
    frame: &mut Frame,
    area: Rect,
    items: Vec<ListItem>,
    selected_index: usize,
    block: Block,
) {
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default()); // Highlight handled by item styles

    let mut list_state = ListState::default();
    list_state.select(Some(selected_index));

    frame.render_stateful_widget(list, area, &mut list_state);
}

pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}", minutes, seconds)
}

/// Calculate width needed for index column (log10(n) + padding)
pub fn calculate_num_width(item_count: usize) -> usize {
    if item_count == 0 {
        2
    } else {
        let digits = (item_count as f64).log10().floor() as usize + 1;
        digits + 1
    }
}

pub fn truncate_string(s: &str, max_width: usize) -> String {
    if s.chars().count() > max_width {
        let truncated: String = s.chars().take(max_width.saturating_sub(3)).collect();
        format!("{:<width$}", format!("{}...", truncated), width = max_width)
    } else {
        format!("{:<width$}", s, width = max_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_minutes_and_padded_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(61_999), "1:01");
        assert_eq!(format_duration(3_600_000), "60:00");
    }

    #[test]
    fn long_names_are_cut_to_the_column() {
        assert_eq!(truncate_string("Subterranean", 8), "Subte...");
        assert_eq!(truncate_string("Airbag", 8), "Airbag  ");
    }

    #[test]
    fn index_column_grows_with_the_list() {
        assert_eq!(calculate_num_width(0), 2);
        assert_eq!(calculate_num_width(9), 2);
        assert_eq!(calculate_num_width(120), 4);
    }
}
