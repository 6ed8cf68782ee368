use crate::feeds::{ConnectionState, StreamStatus};
use crate::renderer::{FeedItem, FeedList};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

#[derive(Debug, Clone)]
pub struct StreamWidget {
    title: String,
    feed: FeedList,
    selected_index: usize,
    mode: StreamMode,
    filter_input: String,
    detail_view: Option<FeedItem>,
    status: StreamStatus,
    status_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamMode {
    Normal,
    Filter,
}

impl StreamWidget {
    pub fn new(title: impl Into<String>, capacity: usize) -> Self {
        Self {
            title: title.into(),
            feed: FeedList::new(capacity),
            selected_index: 0,
            mode: StreamMode::Normal,
            filter_input: String::new(),
            detail_view: None,
            status: StreamStatus::default(),
            status_message: None,
        }
    }

    pub fn feed(&self) -> &FeedList {
        &self.feed
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    /// Prepend a new item. The selection keeps pointing at the item the
    /// user was looking at.
    pub fn push(&mut self, item: FeedItem) {
        let was_empty = self.feed.is_empty();
        self.feed.push_front(item);
        if !was_empty {
            self.selected_index = (self.selected_index + 1).min(self.feed.len() - 1);
        }
    }

    pub fn update_status(&mut self, status: StreamStatus) {
        self.status = status;
    }

    pub fn scroll_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.selected_index + 1 < self.feed.len() {
            self.selected_index += 1;
        }
    }

    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    pub fn selected_permalink(&self) -> Option<String> {
        self.feed
            .get(self.selected_index)
            .map(|item| item.permalink.clone())
    }

    pub fn open_filter_prompt(&mut self, current: Option<&str>) {
        self.mode = StreamMode::Filter;
        self.filter_input = current.unwrap_or_default().to_string();
    }

    pub fn is_filter_prompt_open(&self) -> bool {
        self.mode == StreamMode::Filter
    }

    pub fn add_char(&mut self, c: char) {
        if self.mode == StreamMode::Filter {
            self.filter_input.push(c);
        }
    }

    pub fn delete_char(&mut self) {
        if self.mode == StreamMode::Filter {
            self.filter_input.pop();
        }
    }

    /// Close the prompt and hand back what was typed. An empty string
    /// means "clear the filter".
    pub fn submit_filter(&mut self) -> Option<String> {
        if self.mode != StreamMode::Filter {
            return None;
        }
        let filter = self.filter_input.trim().to_string();
        self.close_modal();
        Some(filter)
    }

    pub fn close_modal(&mut self) {
        self.mode = StreamMode::Normal;
        self.filter_input.clear();
    }

    pub fn open_detail(&mut self) {
        self.detail_view = self.feed.get(self.selected_index).cloned();
    }

    pub fn close_detail(&mut self) {
        self.detail_view = None;
    }

    pub fn is_detail_open(&self) -> bool {
        self.detail_view.is_some()
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    fn header(&self) -> String {
        let filter = self.status.filter.as_deref().unwrap_or("all");
        let state = match (self.status.state, self.status.retry_in) {
            (ConnectionState::ClosedPendingRetry, Some(delay)) => {
                format!("reconnecting in {:.1}s", delay.as_secs_f32())
            }
            (state, _) => state.to_string(),
        };
        format!(
            " {} | filter: {} | {} | {} items ",
            self.title,
            filter,
            state,
            self.feed.len()
        )
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let border_style = match self.status.state {
            ConnectionState::Open => Style::default().fg(Color::Cyan),
            ConnectionState::ClosedPendingRetry => Style::default().fg(Color::Yellow),
            _ => Style::default().fg(Color::Gray),
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(self.header());

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.feed.is_empty() {
            let help_text = vec![
                Line::from(""),
                Line::from(Span::styled(
                    "Waiting for posts...",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from("Keybindings:"),
                Line::from("  j/k - Move selection"),
                Line::from("  g - Jump to newest"),
                Line::from("  Enter - Show post"),
                Line::from("  o - Open post in browser"),
                Line::from("  / - Change filter"),
                Line::from("  q - Quit"),
            ];
            let paragraph = Paragraph::new(help_text).alignment(Alignment::Center);
            frame.render_widget(paragraph, inner);
        } else {
            let width = usize::from(inner.width.saturating_sub(4)).max(10);
            let items: Vec<ListItem> = self
                .feed
                .iter()
                .map(|item| ListItem::new(item_lines(item, width)))
                .collect();

            let list = List::new(items).highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            );
            let mut state = ListState::default();
            state.select(Some(self.selected_index));
            frame.render_stateful_widget(list, inner, &mut state);
        }

        if self.mode == StreamMode::Filter {
            self.render_filter_modal(frame, area);
        }

        if let Some(item) = &self.detail_view {
            self.render_detail_view(frame, area, item);
        }

        if let Some(msg) = &self.status_message {
            self.render_status(frame, area, msg);
        }
    }

    fn render_filter_modal(&self, frame: &mut Frame, area: Rect) {
        let modal_area = center_rect(60, 20, area);
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Stream Filter");

        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let text = vec![
            Line::from(""),
            Line::from(format!("Filter: {}", self.filter_input)),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to apply on next reconnect | Esc to cancel",
                Style::default().fg(Color::DarkGray),
            )),
        ];

        frame.render_widget(Paragraph::new(text), inner);
    }

    fn render_detail_view(&self, frame: &mut Frame, area: Rect, item: &FeedItem) {
        let modal_area = center_rect(80, 80, area);
        frame.render_widget(Clear, modal_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Post");

        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let label = Style::default().fg(Color::DarkGray);
        let text = vec![
            Line::from(vec![
                Span::styled(item.display_name.as_str(), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" "),
                Span::styled(item.handle.as_str(), Style::default().fg(Color::Cyan)),
            ]),
            Line::from(vec![Span::styled("Posted: ", label), Span::raw(item.timestamp.as_str())]),
            Line::from(vec![Span::styled("Avatar: ", label), Span::raw(item.avatar_url.as_str())]),
            Line::from(vec![Span::styled("Link:   ", label), Span::raw(item.permalink.as_str())]),
            Line::from(""),
            Line::from(item.body.as_str()),
            Line::from(""),
            Line::from(Span::styled("o to open in browser | Esc to close", label)),
        ];

        let paragraph = Paragraph::new(text).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, inner);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, message: &str) {
        let status_area = Rect::new(
            area.x + 2,
            area.y + area.height.saturating_sub(3),
            area.width.saturating_sub(4),
            3.min(area.height),
        );

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow));

        let paragraph = Paragraph::new(message).block(block);
        frame.render_widget(Clear, status_area);
        frame.render_widget(paragraph, status_area);
    }
}

fn item_lines(item: &FeedItem, width: usize) -> Vec<Line<'_>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            item.display_name.as_str(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(item.handle.as_str(), Style::default().fg(Color::Cyan)),
        Span::styled(format!(" · {}", item.timestamp), Style::default().fg(Color::DarkGray)),
    ])];

    for chunk in textwrap::wrap(&item.body, width) {
        lines.push(Line::from(format!("  {}", chunk)));
    }

    lines.push(Line::from(Span::styled(
        format!("  {}", item.permalink),
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::UNDERLINED),
    )));
    lines.push(Line::from(""));
    lines
}

fn center_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
