//! Chat list shown beside the conversation

use crate::model::Conversation;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Rows used by one chat entry, spacing included
const ENTRY_HEIGHT: u16 = 3;

/// Read-only view of the conversation list, most recent first
pub struct SidebarView<'a> {
    pub conversations: &'a [&'a Conversation],
    pub active_id: Option<&'a str>,
    pub placeholder_title: &'a str,
}

impl Widget for SidebarView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("Chats");
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 {
            return;
        }

        let hint = Line::from(vec![Span::styled(
            "/new  New Chat",
            Style::default().fg(Color::DarkGray),
        )]);
        buf.set_line(inner.x, inner.y, &hint, inner.width);

        let list_top = inner.y + 2;
        let bottom = inner.y + inner.height;

        if self.conversations.is_empty() {
            if list_top < bottom {
                let empty = Line::from(vec![Span::styled(
                    "No chats yet",
                    Style::default().fg(Color::Gray),
                )]);
                buf.set_line(inner.x, list_top, &empty, inner.width);
            }
            return;
        }

        // Keep the active chat visible when the list is taller than the panel
        let capacity = (bottom.saturating_sub(list_top) / ENTRY_HEIGHT).max(1) as usize;
        let active_index = self
            .active_id
            .and_then(|id| self.conversations.iter().position(|c| c.id == id))
            .unwrap_or(0);
        let first = (active_index + 1).saturating_sub(capacity);

        let mut y = list_top;
        for (index, conversation) in self.conversations.iter().enumerate().skip(first) {
            if y + 1 >= bottom {
                break;
            }

            let is_active = self.active_id == Some(conversation.id.as_str());
            let title_style = if is_active {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            };

            let date = conversation.display_date();
            let prefix = format!("{}. ", index + 1);
            let title_width = (inner.width as usize)
                .saturating_sub(prefix.chars().count() + date.chars().count() + 1);
            let title = truncate(conversation.display_title(self.placeholder_title), title_width);
            let padding = title_width.saturating_sub(title.chars().count());

            let title_line = Line::from(vec![
                Span::styled(prefix, Style::default().fg(Color::DarkGray)),
                Span::styled(title, title_style),
                Span::raw(" ".repeat(padding + 1)),
                Span::styled(date, Style::default().fg(Color::DarkGray)),
            ]);
            buf.set_line(inner.x, y, &title_line, inner.width);

            let count = conversation.message_count();
            let count_line = Line::from(vec![Span::styled(
                format!("   {} message{}", count, if count == 1 { "" } else { "s" }),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner.x, y + 1, &count_line, inner.width);

            y += ENTRY_HEIGHT;
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ConversationStore;

    fn row(buf: &Buffer, y: u16) -> String {
        (buf.area.left()..buf.area.right())
            .map(|x| buf.get(x, y).symbol().to_string())
            .collect()
    }

    #[test]
    fn lists_chats_and_message_counts() {
        let mut store = ConversationStore::default();
        store.create_conversation();
        let active = store.create_conversation();
        store.set_active(&active).unwrap();
        let conversations = store.list();

        let area = Rect::new(0, 0, 40, 12);
        let mut buf = Buffer::empty(area);
        SidebarView {
            conversations: &conversations,
            active_id: store.active_id(),
            placeholder_title: "New Chat",
        }
        .render(area, &mut buf);

        assert!(row(&buf, 3).contains("1. New Chat"));
        assert!(row(&buf, 4).contains("0 messages"));
        assert!(row(&buf, 6).contains("2. New Chat"));
    }

    #[test]
    fn empty_list_has_empty_state() {
        let area = Rect::new(0, 0, 30, 8);
        let mut buf = Buffer::empty(area);
        SidebarView {
            conversations: &[],
            active_id: None,
            placeholder_title: "New Chat",
        }
        .render(area, &mut buf);

        assert!(row(&buf, 3).contains("No chats yet"));
    }

    #[test]
    fn truncate_marks_cut_titles() {
        assert_eq!(truncate("Eviction notice", 8), "Evictio…");
        assert_eq!(truncate("Short", 8), "Short");
    }
}
