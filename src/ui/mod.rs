//! Terminal display layer. Every view here reads session state and never
//! mutates it; user actions go through [`conversation::ConversationManager`].

pub mod conversation;
pub mod sidebar;

pub use conversation::{ConversationAction, ConversationManager};
pub use sidebar::SidebarView;

/// Whether a terminal this wide should use the narrow single-column layout
pub fn is_narrow(width: u16, narrow_width: u16) -> bool {
    width < narrow_width
}

/// Wrap text to fit within the given width, keeping explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if current_width > 0 && current_width + word_width + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if current_width > 0 {
                current_line.push(' ');
                current_width += 1;
            }
            current_line.push_str(word);
            current_width += word_width;
        }

        lines.push(current_line);
    }

    lines
}
