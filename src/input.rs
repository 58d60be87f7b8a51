use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Select(u8),
    TabCycle,
    Enter,
    Back,
    EnterFilter,
    ClearFilter,
    EnterSearch,
    EnterLogs,
    EnterActions,
    EnterExport,
    Sort,
    Refresh,
    Up,
    Down,
    PageUp,
    PageDown,
    TextInput(char),
    Backspace,
    Space,
}

pub fn map_key(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Search | InputMode::LogsSearch => map_text_mode_key(key),
        InputMode::Normal
        | InputMode::Filter
        | InputMode::Logs
        | InputMode::ActionMenu
        | InputMode::CommandOutput => map_normal_mode_key(key),
    }
}

fn map_normal_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::PageDown)
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::PageUp),
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => None,
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char(c) if c.is_ascii_digit() => {
            c.to_digit(10).map(|digit| Action::Select(digit as u8))
        }
        KeyCode::Char('j') => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('k') => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Tab => Some(Action::TabCycle),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Char('f') => Some(Action::EnterFilter),
        KeyCode::Char('c') => Some(Action::ClearFilter),
        KeyCode::Char('/') => Some(Action::EnterSearch),
        KeyCode::Char('l') => Some(Action::EnterLogs),
        KeyCode::Char('a') => Some(Action::EnterActions),
        KeyCode::Char('e') => Some(Action::EnterExport),
        KeyCode::Char('s') => Some(Action::Sort),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char(' ') => Some(Action::Space),
        KeyCode::Backspace => Some(Action::Backspace),
        _ => None,
    }
}

fn map_text_mode_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Down => Some(Action::Down),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Char(' ') if key.modifiers.is_empty() => Some(Action::Space),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(Action::TextInput(c))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, map_key};
    use crate::app::InputMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn normal_mode_maps_quit() {
        let action = map_key(InputMode::Normal, key(KeyCode::Char('q')));
        assert_eq!(action, Some(Action::Quit));
    }

    #[test]
    fn normal_mode_maps_digits_to_select() {
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('3'))),
            Some(Action::Select(3))
        );
        assert_eq!(
            map_key(InputMode::Normal, key(KeyCode::Char('0'))),
            Some(Action::Select(0))
        );
    }

    #[test]
    fn normal_mode_maps_single_key_commands() {
        let cases = [
            ('f', Action::EnterFilter),
            ('c', Action::ClearFilter),
            ('/', Action::EnterSearch),
            ('l', Action::EnterLogs),
            ('a', Action::EnterActions),
            ('e', Action::EnterExport),
            ('s', Action::Sort),
            ('r', Action::Refresh),
            (' ', Action::Space),
        ];
        for (c, expected) in cases {
            assert_eq!(map_key(InputMode::Normal, key(KeyCode::Char(c))), Some(expected));
        }
    }

    #[test]
    fn normal_mode_maps_ctrl_paging() {
        let down = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        let up = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Normal, down), Some(Action::PageDown));
        assert_eq!(map_key(InputMode::Normal, up), Some(Action::PageUp));
    }

    #[test]
    fn logs_mode_uses_normal_bindings() {
        assert_eq!(
            map_key(InputMode::Logs, key(KeyCode::Tab)),
            Some(Action::TabCycle)
        );
        assert_eq!(
            map_key(InputMode::Logs, key(KeyCode::Char('/'))),
            Some(Action::EnterSearch)
        );
    }

    #[test]
    fn text_mode_maps_printable_chars() {
        assert_eq!(
            map_key(InputMode::Search, key(KeyCode::Char('q'))),
            Some(Action::TextInput('q'))
        );
        let shifted = KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(
            map_key(InputMode::LogsSearch, shifted),
            Some(Action::TextInput('A'))
        );
    }

    #[test]
    fn text_mode_keeps_space_and_editing_keys() {
        assert_eq!(
            map_key(InputMode::Search, key(KeyCode::Char(' '))),
            Some(Action::Space)
        );
        assert_eq!(
            map_key(InputMode::Search, key(KeyCode::Backspace)),
            Some(Action::Backspace)
        );
        assert_eq!(
            map_key(InputMode::LogsSearch, key(KeyCode::Esc)),
            Some(Action::Back)
        );
    }

    #[test]
    fn text_mode_rejects_ctrl_c() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(InputMode::Search, ctrl_c), None);
        assert_eq!(map_key(InputMode::Normal, ctrl_c), Some(Action::Quit));
    }
}
