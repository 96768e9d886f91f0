use std::collections::{BTreeMap, HashMap};

use crossterm::event::KeyCode;

use crate::error::{Result, SelectorError};

/// Everything a key press can ask the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    ToggleMember,
    Keep,
    Delete,
    CompleteGroup,
    Undo,
    /// Toggle membership of the first N visible rows, 0 meaning all rows.
    SelectRows(u8),
    GridLarger,
    GridSmaller,
    Help,
    Quit,
}

impl Action {
    pub fn name(self) -> String {
        match self {
            Action::MoveLeft => "left".to_string(),
            Action::MoveRight => "right".to_string(),
            Action::MoveUp => "up".to_string(),
            Action::MoveDown => "down".to_string(),
            Action::ToggleMember => "toggle".to_string(),
            Action::Keep => "keep".to_string(),
            Action::Delete => "delete".to_string(),
            Action::CompleteGroup => "complete".to_string(),
            Action::Undo => "undo".to_string(),
            Action::SelectRows(0) => "select_all".to_string(),
            Action::SelectRows(n) => format!("select_rows_{}", n),
            Action::GridLarger => "grid_larger".to_string(),
            Action::GridSmaller => "grid_smaller".to_string(),
            Action::Help => "help".to_string(),
            Action::Quit => "quit".to_string(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let action = match name {
            "left" => Action::MoveLeft,
            "right" => Action::MoveRight,
            "up" => Action::MoveUp,
            "down" => Action::MoveDown,
            "toggle" => Action::ToggleMember,
            "keep" => Action::Keep,
            "delete" => Action::Delete,
            "complete" => Action::CompleteGroup,
            "undo" => Action::Undo,
            "select_all" => Action::SelectRows(0),
            "grid_larger" => Action::GridLarger,
            "grid_smaller" => Action::GridSmaller,
            "help" => Action::Help,
            "quit" => Action::Quit,
            other => {
                let n: u8 = other.strip_prefix("select_rows_")?.parse().ok()?;
                if !(1..=9).contains(&n) {
                    return None;
                }
                Action::SelectRows(n)
            }
        };
        Some(action)
    }

    pub fn description(self) -> String {
        match self {
            Action::MoveLeft => "Focus left".to_string(),
            Action::MoveRight => "Focus right".to_string(),
            Action::MoveUp => "Focus up".to_string(),
            Action::MoveDown => "Focus down".to_string(),
            Action::ToggleMember => "Add/focus/remove image in group".to_string(),
            Action::Keep => "Label focused image keep".to_string(),
            Action::Delete => "Label focused image delete".to_string(),
            Action::CompleteGroup => "Save group".to_string(),
            Action::Undo => "Undo last label or delete".to_string(),
            Action::SelectRows(0) => "Toggle all visible images".to_string(),
            Action::SelectRows(n) => format!("Toggle first {} row(s)", n),
            Action::GridLarger => "Bigger grid".to_string(),
            Action::GridSmaller => "Smaller grid".to_string(),
            Action::Help => "Show/hide help".to_string(),
            Action::Quit => "Quit".to_string(),
        }
    }
}

pub fn parse_key(raw: &str) -> Option<KeyCode> {
    let code = match raw.to_ascii_lowercase().as_str() {
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "enter" => KeyCode::Enter,
        "space" => KeyCode::Char(' '),
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };
    Some(code)
}

pub fn key_name(code: KeyCode) -> String {
    match code {
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Backspace => "Backspace".to_string(),
        KeyCode::Delete => "Del".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Char(c) => c.to_string(),
        other => format!("{:?}", other),
    }
}

/// Key to action table. Letters are case-sensitive, so `C` means Shift+c.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<KeyCode, Action>,
}

impl Default for Keymap {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        let defaults: &[(KeyCode, Action)] = &[
            (KeyCode::Left, Action::MoveLeft),
            (KeyCode::Char('h'), Action::MoveLeft),
            (KeyCode::Right, Action::MoveRight),
            (KeyCode::Char('l'), Action::MoveRight),
            (KeyCode::Up, Action::MoveUp),
            (KeyCode::Char('k'), Action::MoveUp),
            (KeyCode::Down, Action::MoveDown),
            (KeyCode::Char('j'), Action::MoveDown),
            (KeyCode::Char(' '), Action::ToggleMember),
            (KeyCode::Enter, Action::ToggleMember),
            (KeyCode::Char('s'), Action::Keep),
            (KeyCode::Char('='), Action::Keep),
            (KeyCode::Char('d'), Action::Delete),
            (KeyCode::Backspace, Action::Delete),
            (KeyCode::Char('C'), Action::CompleteGroup),
            (KeyCode::Char('u'), Action::Undo),
            (KeyCode::Char('0'), Action::SelectRows(0)),
            (KeyCode::Char('A'), Action::SelectRows(0)),
            (KeyCode::Char('+'), Action::GridLarger),
            (KeyCode::Char('-'), Action::GridSmaller),
            (KeyCode::Char('?'), Action::Help),
            (KeyCode::Char('q'), Action::Quit),
            (KeyCode::Esc, Action::Quit),
        ];
        for (code, action) in defaults {
            bindings.insert(*code, *action);
        }
        for n in 1..=9u8 {
            bindings.insert(KeyCode::Char((b'0' + n) as char), Action::SelectRows(n));
        }
        Self { bindings }
    }
}

impl Keymap {
    /// Default table with `overrides` applied. Each listed action loses its
    /// default keys and gets exactly the keys given.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut keymap = Self::default();
        for (name, keys) in overrides {
            let action = Action::from_name(name)
                .ok_or_else(|| SelectorError::Config(format!("Unknown action in [keys]: {}", name)))?;
            keymap.bindings.retain(|_, bound| *bound != action);
            for raw in keys {
                let code = parse_key(raw).ok_or_else(|| {
                    SelectorError::Config(format!("Unknown key '{}' for action {}", raw, name))
                })?;
                if let Some(previous) = keymap.bindings.insert(code, action) {
                    if previous != action {
                        log::warn!("Key '{}' rebound from {} to {}", raw, previous.name(), name);
                    }
                }
            }
        }
        Ok(keymap)
    }

    pub fn action_for(&self, code: KeyCode) -> Option<Action> {
        self.bindings.get(&code).copied()
    }

    /// Key names bound to `action`, sorted for stable display.
    pub fn keys_for(&self, action: Action) -> Vec<String> {
        let mut keys: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(code, _)| key_name(*code))
            .collect();
        keys.sort();
        keys
    }

    /// Lines for the help popup, one per action that has a key.
    pub fn help_lines(&self) -> Vec<(String, String)> {
        let mut actions = vec![
            Action::MoveLeft,
            Action::MoveRight,
            Action::MoveUp,
            Action::MoveDown,
            Action::ToggleMember,
            Action::Keep,
            Action::Delete,
            Action::CompleteGroup,
            Action::Undo,
            Action::SelectRows(0),
        ];
        actions.extend((1..=9).map(Action::SelectRows));
        actions.extend([Action::GridLarger, Action::GridSmaller, Action::Help, Action::Quit]);

        actions
            .into_iter()
            .filter_map(|action| {
                let keys = self.keys_for(action);
                (!keys.is_empty()).then(|| (keys.join("/"), action.description()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let keymap = Keymap::default();
        assert_eq!(keymap.action_for(KeyCode::Char('s')), Some(Action::Keep));
        assert_eq!(keymap.action_for(KeyCode::Char('=')), Some(Action::Keep));
        assert_eq!(keymap.action_for(KeyCode::Backspace), Some(Action::Delete));
        assert_eq!(keymap.action_for(KeyCode::Char('C')), Some(Action::CompleteGroup));
        assert_eq!(keymap.action_for(KeyCode::Char('c')), None);
        assert_eq!(keymap.action_for(KeyCode::Char('3')), Some(Action::SelectRows(3)));
        assert_eq!(keymap.action_for(KeyCode::Char('A')), Some(Action::SelectRows(0)));
    }

    #[test]
    fn test_action_names_round_trip() {
        for n in 0..=9u8 {
            let action = Action::SelectRows(n);
            assert_eq!(Action::from_name(&action.name()), Some(action));
        }
        assert_eq!(Action::from_name("select_rows_10"), None);
        assert_eq!(Action::from_name("explode"), None);
    }

    #[test]
    fn test_overrides_replace_default_keys() {
        let mut overrides = BTreeMap::new();
        overrides.insert("keep".to_string(), vec!["k".to_string(), "Enter".to_string()]);
        let keymap = Keymap::with_overrides(&overrides).unwrap();

        assert_eq!(keymap.action_for(KeyCode::Char('k')), Some(Action::Keep));
        assert_eq!(keymap.action_for(KeyCode::Enter), Some(Action::Keep));
        assert_eq!(keymap.action_for(KeyCode::Char('s')), None);
        assert_eq!(keymap.keys_for(Action::Keep), vec!["Enter", "k"]);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("fly".to_string(), vec!["f".to_string()]);
        assert!(matches!(Keymap::with_overrides(&overrides), Err(SelectorError::Config(_))));

        let mut overrides = BTreeMap::new();
        overrides.insert("keep".to_string(), vec!["ctrl-alt-k".to_string()]);
        assert!(Keymap::with_overrides(&overrides).is_err());
    }
}
