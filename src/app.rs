//! Terminal setup and the main event loop

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use tracing::{debug, info};

use crate::config::Config;
use crate::ui::{ConversationAction, ConversationManager};
use crate::workflow::ChatSession;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Run the chat UI until the user quits
pub async fn run(config: Config) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, config).await;
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(terminal: &mut Tui, config: Config) -> Result<()> {
    let tick_rate = config.tick_rate();
    let session = ChatSession::from_config(&config);
    let mut manager = ConversationManager::new(session, config);
    manager.bootstrap().context("Failed to start the first conversation")?;
    info!("Chat session started");

    loop {
        manager.tick();
        terminal.draw(|frame| manager.render(frame))?;

        // Blocking poll; the generator tasks run on the runtime's workers
        let ready = tokio::task::block_in_place(|| event::poll(tick_rate))?;
        if !ready {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                if manager.handle_key(key) == ConversationAction::Exit {
                    break;
                }
            }
            Event::Paste(text) => manager.handle_paste(&text),
            Event::Resize(width, height) => debug!(width, height, "Terminal resized"),
            _ => {}
        }
    }

    info!("Chat session ended");
    Ok(())
}

/// Put the terminal into raw, alternate-screen mode
fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    // Bracketed paste delivers a dropped file path as one event
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state
fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;
    Ok(())
}
