use crate::model::Attachment;
use crate::ui::conversation::commands::{command_entries, parse_slash_command, CommandEntry, ParsedCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Most content lines the composer grows to
const MAX_VISIBLE_LINES: usize = 5;

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Enter was pressed; the draft stays until the caller clears it
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer. `cursor` counts characters.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

impl TextAreaState {
    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Multi-line message input with a slash-command palette
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    has_focus: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            has_focus: true,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else if let Some(command) = parse_slash_command(&self.state.content) {
                    self.clear();
                    return ComposerResult::Command(command);
                } else if self.show_command_palette && self.apply_selected_command() {
                    return ComposerResult::None;
                } else {
                    return ComposerResult::Submitted(self.state.content.clone());
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return ComposerResult::None;
                }
                self.insert_char(c);
                self.sync_command_palette();
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => {
                self.state.cursor = self.state.cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.state.cursor < self.state.char_len() {
                    self.state.cursor += 1;
                }
            }
            KeyCode::Home => self.state.cursor = 0,
            KeyCode::End => self.state.cursor = self.state.char_len(),
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert pasted text at the cursor
    pub fn insert_str(&mut self, text: &str) {
        let index = self.state.byte_index();
        self.state.content.insert_str(index, text);
        self.state.cursor += text.chars().count();
        self.sync_command_palette();
    }

    fn insert_char(&mut self, c: char) {
        let index = self.state.byte_index();
        self.state.content.insert(index, c);
        self.state.cursor += 1;
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.state.cursor == 0 {
            return false;
        }
        self.state.cursor -= 1;
        let index = self.state.byte_index();
        self.state.content.remove(index);
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.state.cursor >= self.state.char_len() {
            return false;
        }
        let index = self.state.byte_index();
        self.state.content.remove(index);
        true
    }

    fn sync_command_palette(&mut self) {
        let content = &self.state.content;
        let is_command_prefix = content.starts_with('/') && !content.contains(char::is_whitespace);
        if is_command_prefix {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette();
        } else if self.show_command_palette {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        if self.filtered_commands.is_empty() {
            self.selected_command = None;
        } else {
            let index = self.selected_command.unwrap_or(0);
            self.selected_command = Some(index.min(self.filtered_commands.len() - 1));
        }
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index).copied())
        else {
            return false;
        };

        self.state.content = format!("/{} ", entry.keyword);
        self.state.cursor = self.state.char_len();
        self.close_command_palette();
        true
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    pub fn has_focus(&self) -> bool {
        self.has_focus
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    pub fn is_empty(&self) -> bool {
        self.state.content.is_empty()
    }

    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
        self.close_command_palette();
    }

    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette
    }

    /// Rows needed to draw the composer, borders included
    pub fn height(&self, has_staged: bool) -> u16 {
        let lines = self.state.content.split('\n').count().clamp(1, MAX_VISIBLE_LINES);
        (lines + 2 + usize::from(has_staged)) as u16
    }
}

/// Draws a composer together with the files staged for the next message
pub struct ComposerView<'a> {
    pub composer: &'a ConversationComposer,
    pub staged: &'a [Attachment],
    pub disabled: bool,
    pub title: &'a str,
}

impl Widget for ComposerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let composer = self.composer;
        let border_style = if self.disabled {
            Style::default().fg(Color::DarkGray)
        } else if composer.has_focus {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Gray)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title.to_string())
            .style(border_style);
        let inner_area = block.inner(area);
        block.render(area, buf);

        let mut y = inner_area.y;
        let bottom = inner_area.y + inner_area.height;

        if !self.staged.is_empty() && y < bottom {
            let mut spans = vec![Span::styled("📎 ", Style::default().fg(Color::Cyan))];
            for (i, attachment) in self.staged.iter().enumerate() {
                spans.push(Span::styled(
                    format!("[{}] {} ({})  ", i + 1, attachment.name, attachment.display_size()),
                    Style::default().fg(Color::Cyan),
                ));
            }
            buf.set_line(inner_area.x, y, &Line::from(spans), inner_area.width);
            y += 1;
        }

        if composer.state.content.is_empty() {
            let placeholder = if self.disabled {
                "Waiting for a reply..."
            } else {
                composer.placeholder.as_str()
            };
            let placeholder_line = Line::from(vec![Span::styled(
                placeholder,
                Style::default().fg(Color::DarkGray),
            )]);
            if y < bottom {
                buf.set_line(inner_area.x, y, &placeholder_line, inner_area.width);
            }
        } else {
            let mut content = composer.state.content.clone();
            if composer.has_focus && !self.disabled {
                content.insert(composer.state.byte_index(), '▌');
            }

            let lines: Vec<&str> = content.split('\n').collect();
            let visible = (bottom - y) as usize;
            let start = lines.len().saturating_sub(visible);
            for line_text in &lines[start..] {
                if y >= bottom {
                    break;
                }
                buf.set_line(inner_area.x, y, &Line::from(vec![Span::raw(*line_text)]), inner_area.width);
                y += 1;
            }
        }

        if composer.show_command_palette && !composer.filtered_commands.is_empty() {
            let filtered = &composer.filtered_commands;
            let palette_height = (filtered.len().min(MAX_VISIBLE_LINES + 2) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, entry) in filtered.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if composer.selected_command == Some(index) {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled("  ", Style::default()),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);
                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::conversation::commands::SlashCommand;

    fn press(composer: &mut ConversationComposer, code: KeyCode) -> ComposerResult {
        composer.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(composer: &mut ConversationComposer, text: &str) {
        for c in text.chars() {
            press(composer, KeyCode::Char(c));
        }
    }

    #[test]
    fn enter_submits_without_clearing() {
        let mut composer = ConversationComposer::new("Ask");
        type_text(&mut composer, "Is a verbal lease binding?");

        let result = press(&mut composer, KeyCode::Enter);
        assert_eq!(result, ComposerResult::Submitted("Is a verbal lease binding?".to_string()));
        assert_eq!(composer.content(), "Is a verbal lease binding?");
    }

    #[test]
    fn enter_on_empty_draft_still_submits() {
        let mut composer = ConversationComposer::new("Ask");
        assert_eq!(press(&mut composer, KeyCode::Enter), ComposerResult::Submitted(String::new()));
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let mut composer = ConversationComposer::new("Ask");
        type_text(&mut composer, "a");
        composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut composer, "b");
        assert_eq!(composer.content(), "a\nb");
        assert_eq!(composer.height(false), 4);
    }

    #[test]
    fn editing_handles_multibyte_characters() {
        let mut composer = ConversationComposer::new("Ask");
        type_text(&mut composer, "café");
        press(&mut composer, KeyCode::Left);
        press(&mut composer, KeyCode::Backspace);
        assert_eq!(composer.content(), "caé");
        press(&mut composer, KeyCode::End);
        press(&mut composer, KeyCode::Backspace);
        assert_eq!(composer.content(), "ca");
    }

    #[test]
    fn slash_opens_palette_and_tab_completes() {
        let mut composer = ConversationComposer::new("Ask");
        type_text(&mut composer, "/ne");
        assert!(composer.is_palette_open());

        press(&mut composer, KeyCode::Tab);
        assert_eq!(composer.content(), "/new ");
        assert!(!composer.is_palette_open());

        let result = press(&mut composer, KeyCode::Enter);
        assert_eq!(
            result,
            ComposerResult::Command(ParsedCommand {
                command: SlashCommand::New,
                argument: None,
            })
        );
        assert!(composer.is_empty());
    }

    #[test]
    fn palette_closes_when_input_is_not_a_command() {
        let mut composer = ConversationComposer::new("Ask");
        type_text(&mut composer, "/");
        assert!(composer.is_palette_open());
        press(&mut composer, KeyCode::Backspace);
        assert!(!composer.is_palette_open());
    }
}
