use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a new conversation
    New,
    /// Show or hide the chat list
    Chats,
    /// Open a conversation from the chat list
    Switch,
    /// Stage files for the next message
    Attach,
    /// Remove a staged file
    Detach,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// 1-based position in the chat list, for `/switch` and `/detach`
    pub fn index_target(&self) -> Option<usize> {
        self.argument()?
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n - 1)
    }

    /// Whitespace-separated paths, for `/attach`
    pub fn paths(&self) -> Vec<String> {
        self.argument()
            .map(|arg| arg.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new conversation",
            SlashCommand::Chats => "show or hide the chat list",
            SlashCommand::Switch => "open chat <n> from the list",
            SlashCommand::Attach => "attach files: /attach <path>...",
            SlashCommand::Detach => "remove staged file <n>",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a reply is pending.
    pub fn available_while_loading(self) -> bool {
        !matches!(self, SlashCommand::Attach | SlashCommand::Detach)
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim_start();
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].split_whitespace();
    let head = parts.next()?;
    let rest: Vec<String> = parts.map(|s| s.to_string()).collect();

    let command = SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "n" | "clear" => Some(SlashCommand::New),
        "c" | "list" | "sidebar" => Some(SlashCommand::Chats),
        "s" | "open" => Some(SlashCommand::Switch),
        "a" | "file" | "upload" => Some(SlashCommand::Attach),
        "d" | "rm" | "remove" => Some(SlashCommand::Detach),
        "h" | "?" => Some(SlashCommand::Help),
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        _ => None,
    })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\nAliases: /n for /new, /s for /switch, /a for /attach, /rm for /detach, /q for /bye");
    help.push_str("\nDrop or paste a file path into the terminal to attach it.");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keyword_and_argument() {
        let parsed = parse_slash_command("/switch 2").unwrap();
        assert_eq!(parsed.command, SlashCommand::Switch);
        assert_eq!(parsed.index_target(), Some(1));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(parse_slash_command("/q").unwrap().command, SlashCommand::Bye);
        assert_eq!(parse_slash_command("/rm 1").unwrap().command, SlashCommand::Detach);
        assert_eq!(parse_slash_command("/upload a.pdf").unwrap().command, SlashCommand::Attach);
    }

    #[test]
    fn plain_text_and_unknown_commands_are_not_commands() {
        assert!(parse_slash_command("What is a tort?").is_none());
        assert!(parse_slash_command("/objection").is_none());
        assert!(parse_slash_command("/").is_none());
    }

    #[test]
    fn attach_splits_paths() {
        let parsed = parse_slash_command("/attach lease.pdf  notice.txt").unwrap();
        assert_eq!(parsed.paths(), vec!["lease.pdf", "notice.txt"]);
    }

    #[test]
    fn zero_index_is_rejected() {
        assert_eq!(parse_slash_command("/switch 0").unwrap().index_target(), None);
        assert_eq!(parse_slash_command("/switch x").unwrap().index_target(), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for entry in command_entries() {
            assert!(help.contains(&format!("/{}", entry.keyword)));
        }
    }
}
