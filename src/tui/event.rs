//! Keyboard handling for the dashboard.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Key action derived from a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Request a graceful shutdown
    Quit,
    /// No action
    None,
}

impl From<KeyEvent> for KeyAction {
    fn from(key: KeyEvent) -> Self {
        match key.code {
            KeyCode::Char('q') => KeyAction::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Quit,
            KeyCode::Esc => KeyAction::Quit,
            _ => KeyAction::None,
        }
    }
}
