use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::time::Instant;

/// Spinner animation frames for the progress indicator
const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Interval between spinner frame updates (milliseconds)
const SPINNER_INTERVAL_MS: u128 = 80;

/// "Bot is thinking" line shown while a reply is pending
pub struct ThinkingIndicator<'a> {
    pub bot_name: &'a str,
    pub since: Instant,
}

impl ThinkingIndicator<'_> {
    fn frame(&self) -> char {
        let index = (self.since.elapsed().as_millis() / SPINNER_INTERVAL_MS) as usize;
        SPINNER_FRAMES[index % SPINNER_FRAMES.len()]
    }

    fn dots(&self) -> &'static str {
        match (self.since.elapsed().as_millis() / 300) % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }
}

impl Widget for ThinkingIndicator<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }

        let indicator = Line::from(vec![
            Span::styled(format!("{} ", self.frame()), Style::default().fg(Color::Yellow)),
            Span::styled(format!("{} is thinking", self.bot_name), Style::default().fg(Color::Green)),
            Span::styled(self.dots(), Style::default().fg(Color::Yellow)),
        ]);
        buf.set_line(area.x, area.y, &indicator, area.width);
    }
}
