use crate::attachments::PathFileSource;
use crate::config::Config;
use crate::error::Result;
use crate::ui::conversation::{
    get_help_text, ComposerResult, ComposerView, ConversationComposer, HistoryView, ParsedCommand,
    SlashCommand, ThinkingIndicator,
};
use crate::ui::{is_narrow, SidebarView};
use crate::workflow::{ChatSession, ReplyOutcome, SubmitOutcome};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::cell::Cell;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Width of the chat list in the wide layout
const SIDEBAR_WIDTH: u16 = 34;

/// Lines moved per PageUp/PageDown
const SCROLL_STEP: u16 = 5;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// One-line status shown above the composer
#[derive(Debug, Clone, PartialEq, Eq)]
enum Notice {
    Info(String),
    Error(String),
}

/// Routes user input to the chat session and draws the whole screen
pub struct ConversationManager {
    session: ChatSession,
    composer: ConversationComposer,
    config: Config,
    scroll: u16,
    sidebar_open: bool,
    show_help: bool,
    notice: Option<Notice>,
    loading_since: Option<Instant>,
    /// Where the history was last drawn, for clamping the scroll offset
    history_area: Cell<Rect>,
}

impl ConversationManager {
    pub fn new(session: ChatSession, config: Config) -> Self {
        Self {
            session,
            composer: ConversationComposer::new(format!("Ask the {}...", config.bot_name)),
            config,
            scroll: 0,
            sidebar_open: false,
            show_help: false,
            notice: None,
            loading_since: None,
            history_area: Cell::new(Rect::default()),
        }
    }

    /// Ensure there is a conversation to type into
    pub fn bootstrap(&mut self) -> Result<()> {
        self.session.bootstrap()?;
        Ok(())
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn composer(&self) -> &ConversationComposer {
        &self.composer
    }

    /// Apply arrived replies and refresh the loading indicator
    pub fn tick(&mut self) {
        for outcome in self.session.process_replies() {
            match outcome {
                ReplyOutcome::Appended { conversation_id, .. } => {
                    if self.is_active(&conversation_id) {
                        self.scroll = 0;
                    }
                }
                ReplyOutcome::Failed { error, .. } => {
                    self.notice = Some(Notice::Error(format!("Couldn't get a reply: {}", error)));
                }
            }
        }

        match (self.session.is_loading(), self.loading_since) {
            (true, None) => self.loading_since = Some(Instant::now()),
            (false, Some(_)) => self.loading_since = None,
            _ => {}
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        if self.show_help {
            self.show_help = false;
            self.composer.set_focus(true);
            return ConversationAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('d') if ctrl => return ConversationAction::Exit,
            KeyCode::Char('n') if ctrl => {
                self.new_conversation();
                return ConversationAction::None;
            }
            KeyCode::Char('b') if ctrl => {
                self.sidebar_open = !self.sidebar_open;
                return ConversationAction::None;
            }
            KeyCode::PageUp => {
                let max_scroll = self.max_scroll();
                self.scroll = self.scroll.saturating_add(SCROLL_STEP).min(max_scroll);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                let max_scroll = self.max_scroll();
                self.scroll = self.scroll.min(max_scroll).saturating_sub(SCROLL_STEP);
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(text) => {
                self.submit(&text);
                ConversationAction::None
            }
            ComposerResult::Command(command) => self.handle_slash_command(command),
            ComposerResult::None => ConversationAction::None,
        }
    }

    /// Pasted text: file paths (as dropped onto the terminal) are attached,
    /// anything else goes into the draft
    pub fn handle_paste(&mut self, text: &str) {
        let paths = dropped_paths(text);
        if paths.is_empty() {
            self.composer.insert_str(text);
        } else {
            self.attach(paths);
        }
    }

    fn submit(&mut self, text: &str) {
        if let Some(active) = self.session.store().active_id() {
            if self.session.is_loading_for(active) {
                self.notice = Some(Notice::Info(format!(
                    "{} is still answering. Your draft is kept.",
                    self.config.bot_name
                )));
                return;
            }
        }

        match self.session.submit_active(text) {
            Ok(SubmitOutcome::Sent { .. }) => {
                self.composer.clear();
                self.scroll = 0;
                self.notice = None;
            }
            Ok(SubmitOutcome::Rejected) => {}
            Ok(SubmitOutcome::Bootstrapped { .. }) => {
                self.notice = Some(Notice::Info(
                    "Started a new chat. Press Enter again to send.".to_string(),
                ));
            }
            Err(e) => {
                self.notice = Some(Notice::Error(e.to_string()));
            }
        }
    }

    fn new_conversation(&mut self) {
        match self.session.new_conversation() {
            Ok(id) => {
                info!(conversation_id = %id, "Started new conversation");
                self.scroll = 0;
                self.sidebar_open = false;
                self.notice = None;
            }
            Err(e) => self.notice = Some(Notice::Error(e.to_string())),
        }
    }

    fn attach(&mut self, paths: Vec<PathBuf>) {
        let source = PathFileSource::new(paths)
            .with_accepted_extensions(&self.config.attachments.accepted_extensions);
        self.notice = Some(match self.session.stage(&source) {
            Ok(staged) if staged.is_empty() => {
                Notice::Error("No supported files to attach".to_string())
            }
            Ok(staged) => Notice::Info(format!(
                "Attached {} file{}",
                staged.len(),
                if staged.len() == 1 { "" } else { "s" }
            )),
            Err(e) => Notice::Error(e.to_string()),
        });
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        debug!(command = command.command.command(), "Slash command");

        if !command.command.available_while_loading() {
            if let Some(active) = self.session.store().active_id() {
                if self.session.is_loading_for(active) {
                    self.notice = Some(Notice::Info(format!(
                        "/{} is unavailable while waiting for a reply",
                        command.command.command()
                    )));
                    return ConversationAction::None;
                }
            }
        }

        match command.command {
            SlashCommand::New => self.new_conversation(),
            SlashCommand::Chats => self.sidebar_open = !self.sidebar_open,
            SlashCommand::Switch => {
                let target = command.index_target().and_then(|index| {
                    self.session.store().list().get(index).map(|c| c.id.clone())
                });
                match target {
                    Some(id) => match self.session.select(&id) {
                        Ok(()) => {
                            self.scroll = 0;
                            self.sidebar_open = false;
                            self.notice = None;
                        }
                        Err(e) => self.notice = Some(Notice::Error(e.to_string())),
                    },
                    None => {
                        self.notice = Some(Notice::Error("Usage: /switch <n> (see /chats)".to_string()))
                    }
                }
            }
            SlashCommand::Attach => {
                let paths: Vec<PathBuf> = command.paths().into_iter().map(PathBuf::from).collect();
                if paths.is_empty() {
                    self.notice = Some(Notice::Error("Usage: /attach <path>...".to_string()));
                } else {
                    self.attach(paths);
                }
            }
            SlashCommand::Detach => {
                let staged = self.session.registry().staged();
                let target = command
                    .index_target()
                    .and_then(|index| staged.get(index))
                    .or_else(|| {
                        command
                            .argument()
                            .and_then(|arg| staged.iter().find(|a| a.id == arg.trim()))
                    })
                    .map(|a| a.id.clone());
                self.notice = Some(match target.and_then(|id| self.session.unstage(&id)) {
                    Some(removed) => Notice::Info(format!("Removed {}", removed.name)),
                    None => Notice::Error("Usage: /detach <n>".to_string()),
                });
            }
            SlashCommand::Help => {
                self.show_help = true;
                self.composer.set_focus(false);
            }
            SlashCommand::Bye => return ConversationAction::Exit,
        }

        ConversationAction::None
    }

    fn is_active(&self, conversation_id: &str) -> bool {
        self.session.store().active_id() == Some(conversation_id)
    }

    fn history_view(&self) -> HistoryView<'_> {
        let store = self.session.store();
        HistoryView {
            conversation: store.active(),
            bot_name: &self.config.bot_name,
            placeholder_title: &store.title_rule().placeholder,
            scroll: self.scroll,
            reserved_rows: u16::from(self.active_loading()),
        }
    }

    fn max_scroll(&self) -> u16 {
        self.history_view().max_scroll(self.history_area.get())
    }

    fn active_loading(&self) -> bool {
        self.session
            .store()
            .active_id()
            .map(|id| self.session.is_loading_for(id))
            .unwrap_or(false)
    }

    /// Draw sidebar, history, notice line and composer
    pub fn render(&self, frame: &mut Frame) {
        let area = frame.size();
        let narrow = is_narrow(area.width, self.config.ui.narrow_width);

        let chat_area = if narrow {
            area
        } else {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
                .split(area);
            self.render_sidebar(frame, columns[0]);
            columns[1]
        };

        self.render_chat(frame, chat_area, narrow);

        // Slide-over chat list in the narrow layout
        if narrow && self.sidebar_open {
            let overlay = Rect {
                width: area.width.min(SIDEBAR_WIDTH + 6),
                ..area
            };
            frame.render_widget(Clear, overlay);
            self.render_sidebar(frame, overlay);
        }

        if self.show_help {
            self.render_help(frame, area);
        }
    }

    fn render_sidebar(&self, frame: &mut Frame, area: Rect) {
        let store = self.session.store();
        let conversations = store.list();
        frame.render_widget(
            SidebarView {
                conversations: &conversations,
                active_id: store.active_id(),
                placeholder_title: &store.title_rule().placeholder,
            },
            area,
        );
    }

    fn render_chat(&self, frame: &mut Frame, area: Rect, narrow: bool) {
        let staged = self.session.registry().staged();
        let composer_height = self.composer.height(!staged.is_empty());
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(composer_height),
            ])
            .split(area);

        let mut header = vec![Span::styled(
            format!("⚖️  {}", self.config.bot_name),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if narrow {
            header.push(Span::styled(
                "   Ctrl+B chats",
                Style::default().fg(Color::DarkGray),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(header)), rows[0]);

        let loading = self.active_loading();
        self.history_area.set(rows[1]);
        frame.render_widget(self.history_view(), rows[1]);

        if loading {
            let history = rows[1];
            if history.height > 2 {
                let indicator_area = Rect {
                    x: history.x + 1,
                    y: history.y + history.height - 2,
                    width: history.width.saturating_sub(2),
                    height: 1,
                };
                frame.render_widget(
                    ThinkingIndicator {
                        bot_name: &self.config.bot_name,
                        since: self.loading_since.unwrap_or_else(Instant::now),
                    },
                    indicator_area,
                );
            }
        }

        if let Some(notice) = &self.notice {
            let line = match notice {
                Notice::Info(text) => Line::from(Span::styled(text.clone(), Style::default().fg(Color::Yellow))),
                Notice::Error(text) => Line::from(Span::styled(format!("⚠ {}", text), Style::default().fg(Color::Red))),
            };
            frame.render_widget(Paragraph::new(line), rows[2]);
        }

        frame.render_widget(
            ComposerView {
                composer: &self.composer,
                staged,
                disabled: loading,
                title: "Message",
            },
            rows[3],
        );
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let help = get_help_text();
        let height = (help.lines().count() as u16 + 4).min(area.height);
        let width = area.width.min(72);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };

        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(format!("{}\n\nPress any key to close.", help))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Help")),
            popup,
        );
    }
}

/// Paths in pasted text, if every token names an existing file
fn dropped_paths(text: &str) -> Vec<PathBuf> {
    let paths: Vec<PathBuf> = text
        .split_whitespace()
        .map(|token| {
            let token = token.trim_matches(|c| c == '\'' || c == '"');
            PathBuf::from(token.strip_prefix("file://").unwrap_or(token))
        })
        .collect();

    if !paths.is_empty() && paths.iter().all(|p| p.is_file()) {
        paths
    } else {
        Vec::new()
    }
}
