// Keybindings for the thumbnail grid
// A single data-driven table of (modifiers, key-or-button) -> Action
//
// Default bindings:
// - Arrow keys / hjkl, Home, End, PageUp, PageDown: move focus and select
//   - with Shift: extend the range from the anchor
//   - with Ctrl: move focus only
// - Ctrl+A: Select all
// - Ctrl+I: Invert selection
// - Escape / middle click: Clear selection
// - Enter: Open focused item
// - Ctrl+Enter: Open selection in a new page
// - Delete: Delete selected files
// - Ctrl+Delete: Remove selected from this view
// - F7 / Shift+F7: Archive / send back to inbox
// - F5: Refresh selected thumbnails
// - Ctrl+E: Export selection

use std::collections::HashMap;

use bitflags::bitflags;
use once_cell::sync::Lazy;

use super::actions::Action;

bitflags! {
    /// Modifier keys held during an input event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const CTRL = 0b0001;
        const SHIFT = 0b0010;
        const ALT = 0b0100;
    }
}

impl Modifiers {
    pub fn ctrl(self) -> bool {
        self.contains(Modifiers::CTRL)
    }

    pub fn shift(self) -> bool {
        self.contains(Modifiers::SHIFT)
    }
}

/// Navigation direction for grid movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

impl Direction {
    /// Index reached by moving from `from` in a grid of `count` items.
    ///
    /// Left and right wrap across rows; up and down stay in the column and
    /// stop at the first or last row.
    pub fn step(self, from: usize, count: usize, columns: usize, page_rows: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let last = count - 1;
        let columns = columns.max(1);
        let page = page_rows.max(1) * columns;
        let from = from.min(last);

        match self {
            Direction::Up => from.checked_sub(columns).unwrap_or(from),
            Direction::Down => {
                if from / columns < last / columns {
                    (from + columns).min(last)
                } else {
                    from
                }
            }
            Direction::Left => from.saturating_sub(1),
            Direction::Right => (from + 1).min(last),
            Direction::Home => 0,
            Direction::End => last,
            Direction::PageUp => from.saturating_sub(page),
            Direction::PageDown => (from + page).min(last),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Enter,
    Escape,
    Delete,
    F(u8),
    /// A printable key, stored lowercase.
    Char(char),
}

impl Key {
    pub fn char(c: char) -> Self {
        Key::Char(c.to_ascii_lowercase())
    }

    fn direction(self) -> Option<Direction> {
        match self {
            Key::Up | Key::Char('k') => Some(Direction::Up),
            Key::Down | Key::Char('j') => Some(Direction::Down),
            Key::Left | Key::Char('h') => Some(Direction::Left),
            Key::Right | Key::Char('l') => Some(Direction::Right),
            Key::Home => Some(Direction::Home),
            Key::End => Some(Direction::End),
            Key::PageUp => Some(Direction::PageUp),
            Key::PageDown => Some(Direction::PageDown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Key(Key),
    Button(PointerButton),
}

/// Lookup table from modifier set and input to action.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<(Modifiers, Input), Action>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, modifiers: Modifiers, input: Input, action: Action) {
        self.bindings.insert((modifiers, Self::normalise(input)), action);
    }

    pub fn unbind(&mut self, modifiers: Modifiers, input: Input) -> Option<Action> {
        self.bindings.remove(&(modifiers, Self::normalise(input)))
    }

    pub fn resolve(&self, modifiers: Modifiers, input: Input) -> Option<Action> {
        self.bindings
            .get(&(modifiers, Self::normalise(input)))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn normalise(input: Input) -> Input {
        match input {
            Input::Key(Key::Char(c)) => Input::Key(Key::char(c)),
            other => other,
        }
    }

    fn defaults() -> Self {
        let mut table = Self::new();
        let none = Modifiers::empty();
        let ctrl = Modifiers::CTRL;
        let shift = Modifiers::SHIFT;

        let nav_keys = [
            Key::Up,
            Key::Down,
            Key::Left,
            Key::Right,
            Key::Home,
            Key::End,
            Key::PageUp,
            Key::PageDown,
            Key::Char('h'),
            Key::Char('j'),
            Key::Char('k'),
            Key::Char('l'),
        ];
        for key in nav_keys {
            let Some(direction) = key.direction() else {
                continue;
            };
            table.bind(none, Input::Key(key), Action::Navigate(direction));
            table.bind(shift, Input::Key(key), Action::Extend(direction));
            table.bind(ctrl | shift, Input::Key(key), Action::Extend(direction));
            table.bind(ctrl, Input::Key(key), Action::MoveFocus(direction));
        }

        table.bind(ctrl, Input::Key(Key::Char('a')), Action::SelectAll);
        table.bind(ctrl, Input::Key(Key::Char('i')), Action::InvertSelection);
        table.bind(none, Input::Key(Key::Escape), Action::ClearSelection);
        table.bind(none, Input::Key(Key::Enter), Action::OpenFocused);
        table.bind(ctrl, Input::Key(Key::Enter), Action::OpenInNewPage);
        table.bind(none, Input::Key(Key::Delete), Action::DeleteSelected);
        table.bind(ctrl, Input::Key(Key::Delete), Action::RemoveSelected);
        table.bind(none, Input::Key(Key::F(7)), Action::ArchiveSelected);
        table.bind(shift, Input::Key(Key::F(7)), Action::InboxSelected);
        table.bind(none, Input::Key(Key::F(5)), Action::RefreshThumbnails);
        table.bind(ctrl, Input::Key(Key::Char('e')), Action::ExportSelection);

        // Middle click resets regardless of modifiers
        for bits in 0..=Modifiers::all().bits() {
            let modifiers = Modifiers::from_bits_truncate(bits);
            table.bind(
                modifiers,
                Input::Button(PointerButton::Middle),
                Action::ClearSelection,
            );
        }
        table
    }
}

static DEFAULT_BINDINGS: Lazy<BindingTable> = Lazy::new(BindingTable::defaults);

/// The built-in bindings, constructed once.
pub fn default_bindings() -> &'static BindingTable {
    &DEFAULT_BINDINGS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_step_vertical() {
        // 10 items, 3 columns: rows [0..2] [3..5] [6..8] [9]
        assert_eq!(Direction::Up.step(4, 10, 3, 2), 1);
        assert_eq!(Direction::Up.step(1, 10, 3, 2), 1);
        assert_eq!(Direction::Down.step(4, 10, 3, 2), 7);
        // Row above the short last row clamps to the last item
        assert_eq!(Direction::Down.step(8, 10, 3, 2), 9);
        assert_eq!(Direction::Down.step(9, 10, 3, 2), 9);
    }

    #[test]
    fn test_direction_step_wraps_horizontally() {
        assert_eq!(Direction::Right.step(2, 10, 3, 2), 3);
        assert_eq!(Direction::Left.step(3, 10, 3, 2), 2);
        assert_eq!(Direction::Left.step(0, 10, 3, 2), 0);
        assert_eq!(Direction::Right.step(9, 10, 3, 2), 9);
    }

    #[test]
    fn test_direction_step_paging() {
        assert_eq!(Direction::PageDown.step(0, 100, 4, 3), 12);
        assert_eq!(Direction::PageUp.step(5, 100, 4, 3), 0);
        assert_eq!(Direction::PageDown.step(95, 100, 4, 3), 99);
        assert_eq!(Direction::Home.step(50, 100, 4, 3), 0);
        assert_eq!(Direction::End.step(50, 100, 4, 3), 99);
    }

    #[test]
    fn test_default_navigation_bindings() {
        let table = default_bindings();
        assert_eq!(
            table.resolve(Modifiers::empty(), Input::Key(Key::Down)),
            Some(Action::Navigate(Direction::Down))
        );
        assert_eq!(
            table.resolve(Modifiers::empty(), Input::Key(Key::Char('j'))),
            Some(Action::Navigate(Direction::Down))
        );
        assert_eq!(
            table.resolve(Modifiers::SHIFT, Input::Key(Key::Home)),
            Some(Action::Extend(Direction::Home))
        );
        assert_eq!(
            table.resolve(Modifiers::CTRL, Input::Key(Key::Left)),
            Some(Action::MoveFocus(Direction::Left))
        );
    }

    #[test]
    fn test_char_keys_are_case_insensitive() {
        let table = default_bindings();
        assert_eq!(
            table.resolve(Modifiers::CTRL, Input::Key(Key::Char('A'))),
            Some(Action::SelectAll)
        );
    }

    #[test]
    fn test_middle_click_any_modifiers() {
        let table = default_bindings();
        for modifiers in [Modifiers::empty(), Modifiers::CTRL | Modifiers::SHIFT] {
            assert_eq!(
                table.resolve(modifiers, Input::Button(PointerButton::Middle)),
                Some(Action::ClearSelection)
            );
        }
        assert_eq!(
            table.resolve(Modifiers::empty(), Input::Button(PointerButton::Primary)),
            None
        );
    }

    #[test]
    fn test_unbound_input_resolves_to_none() {
        let mut table = BindingTable::new();
        assert!(table.is_empty());
        table.bind(Modifiers::ALT, Input::Key(Key::F(2)), Action::SelectNone);
        assert_eq!(
            table.unbind(Modifiers::ALT, Input::Key(Key::F(2))),
            Some(Action::SelectNone)
        );
        assert_eq!(table.resolve(Modifiers::ALT, Input::Key(Key::F(2))), None);
    }
}
