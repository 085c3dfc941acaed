//! Keyboard shortcuts.
//!
//! `Ctrl` and `Cmd` are interchangeable so the same bindings work on every
//! platform.

use crate::commands::Command;
use crate::document::Mark;

/// A key press with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: char,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: char) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn ctrl(key: char) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }

    pub fn meta(key: char) -> Self {
        Self {
            meta: true,
            ..Self::plain(key)
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }
}

/// What a bound key press asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Shortcut {
    Command(Command),
    /// Persist immediately instead of waiting for the autosave debounce
    Save,
}

/// Resolve a key press to its shortcut, if it has one.
pub fn shortcut_for(press: &KeyPress) -> Option<Shortcut> {
    if !(press.ctrl || press.meta) {
        return None;
    }

    let mark = |mark| Some(Shortcut::Command(Command::ToggleMark { mark }));
    match (press.key.to_ascii_lowercase(), press.shift) {
        ('b', false) => mark(Mark::Bold),
        ('i', false) => mark(Mark::Italic),
        ('u', false) => mark(Mark::Underline),
        ('s', false) => Some(Shortcut::Save),
        ('a', false) => Some(Shortcut::Command(Command::SelectAll)),
        ('z', false) => Some(Shortcut::Command(Command::Undo)),
        ('z', true) | ('y', false) => Some(Shortcut::Command(Command::Redo)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_shortcuts() {
        assert_eq!(
            shortcut_for(&KeyPress::ctrl('b')),
            Some(Shortcut::Command(Command::ToggleMark { mark: Mark::Bold }))
        );
        assert_eq!(
            shortcut_for(&KeyPress::meta('i')),
            Some(Shortcut::Command(Command::ToggleMark { mark: Mark::Italic }))
        );
    }

    #[test]
    fn test_save_and_history() {
        assert_eq!(shortcut_for(&KeyPress::meta('s')), Some(Shortcut::Save));
        assert_eq!(
            shortcut_for(&KeyPress::ctrl('z')),
            Some(Shortcut::Command(Command::Undo))
        );
        assert_eq!(
            shortcut_for(&KeyPress::ctrl('Z').with_shift()),
            Some(Shortcut::Command(Command::Redo))
        );
    }

    #[test]
    fn test_unmodified_keys_are_not_shortcuts() {
        assert_eq!(shortcut_for(&KeyPress::plain('b')), None);
        assert_eq!(shortcut_for(&KeyPress::ctrl('q')), None);
    }
}
