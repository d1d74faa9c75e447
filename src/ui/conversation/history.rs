//! Conversation history display component

use crate::model::{Author, Conversation, Message};
use crate::ui::wrap_text;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Read-only view of one conversation's messages
pub struct HistoryView<'a> {
    pub conversation: Option<&'a Conversation>,
    pub bot_name: &'a str,
    pub placeholder_title: &'a str,
    /// Lines scrolled up from the bottom
    pub scroll: u16,
    /// Bottom rows left free for the thinking indicator
    pub reserved_rows: u16,
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = self
            .conversation
            .map(|c| c.display_title(self.placeholder_title))
            .unwrap_or(self.placeholder_title);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("💬 {}", title));

        let inner_area = block.inner(area);
        block.render(area, buf);

        let messages = self.conversation.map(|c| c.messages.as_slice()).unwrap_or(&[]);
        if messages.is_empty() {
            for (i, line) in self.welcome_lines().iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        let all_lines = self.content_lines(messages, inner_area.width);

        // Show the bottom of the conversation, shifted up by the scroll offset
        let height = inner_area.height.saturating_sub(self.reserved_rows) as usize;
        let total = all_lines.len();
        let max_scroll = total.saturating_sub(height);
        let scroll = (self.scroll as usize).min(max_scroll);
        let end = total - scroll;
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

impl HistoryView<'_> {
    /// Furthest the view can scroll up when drawn into `area`
    pub fn max_scroll(&self, area: Rect) -> u16 {
        let inner_area = Block::default().borders(Borders::ALL).inner(area);
        let messages = self.conversation.map(|c| c.messages.as_slice()).unwrap_or(&[]);
        let total = self.content_lines(messages, inner_area.width).len();
        let height = inner_area.height.saturating_sub(self.reserved_rows) as usize;
        total.saturating_sub(height).min(u16::MAX as usize) as u16
    }

    fn content_lines(&self, messages: &[Message], width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for message in messages {
            lines.extend(self.render_message(message, width));
            // spacing between messages
            lines.push(Line::from(vec![Span::raw("")]));
        }
        lines
    }

    fn welcome_lines(&self) -> Vec<Line<'static>> {
        vec![
            Line::from(vec![Span::styled(
                format!("⚖️  {}", self.bot_name),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )]),
            Line::from(vec![Span::raw("")]),
            Line::from(vec![Span::styled(
                "Ask legal questions and get guidance from our AI assistant.",
                Style::default().fg(Color::Gray),
            )]),
            Line::from(vec![Span::styled(
                "Upload documents for additional context with /attach <path>.",
                Style::default().fg(Color::Gray),
            )]),
            Line::from(vec![Span::raw("")]),
            Line::from(vec![Span::styled(
                "Press Enter to send, Shift+Enter for new line, / for commands.",
                Style::default().fg(Color::DarkGray),
            )]),
        ]
    }

    /// Render a single message into lines
    fn render_message(&self, message: &Message, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (icon, label_style) = match message.author {
            Author::User => ("👤", Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)),
            Author::Assistant => ("⚖️", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        };

        lines.push(Line::from(vec![
            Span::raw(format!("{} ", icon)),
            Span::styled(message.author.label(self.bot_name).to_string(), label_style),
            Span::styled(format!("  {}", message.display_time()), Style::default().fg(Color::DarkGray)),
        ]));

        if !message.body.is_empty() {
            let content_style = match message.author {
                Author::User => Style::default().fg(Color::White),
                Author::Assistant => Style::default().fg(Color::Green),
            };
            for content_line in wrap_text(&message.body, width.saturating_sub(2) as usize) {
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(content_line, content_style),
                ]));
            }
        }

        if message.has_attachments() {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled("Uploaded files:", Style::default().fg(Color::DarkGray)),
            ]));
            for attachment in &message.attachments {
                lines.push(Line::from(vec![
                    Span::raw("    📄 "),
                    Span::styled(attachment.name.clone(), Style::default().fg(Color::Cyan)),
                    Span::styled(
                        format!(" ({})", attachment.display_size()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]));
            }
        }

        lines
    }
}
