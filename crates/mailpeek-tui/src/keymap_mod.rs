use std::collections::HashMap;

use anyhow::{Result, anyhow};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Action {
    Up,
    Down,
    PageUp,
    PageDown,
    Select,
    Back,
    Search,
    Quit,
}

impl Action {
    const ALL: [Action; 8] = [
        Action::Quit,
        Action::Search,
        Action::Select,
        Action::Back,
        Action::Up,
        Action::Down,
        Action::PageUp,
        Action::PageDown,
    ];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "up" => Some(Action::Up),
            "down" => Some(Action::Down),
            "page_up" => Some(Action::PageUp),
            "page_down" => Some(Action::PageDown),
            "select" => Some(Action::Select),
            "back" => Some(Action::Back),
            "search" => Some(Action::Search),
            "quit" => Some(Action::Quit),
            _ => None,
        }
    }

    fn help(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::PageUp => "page up",
            Action::PageDown => "page down",
            Action::Select => "select",
            Action::Back => "back",
            Action::Search => "search",
            Action::Quit => "quit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyBinding {
    code: KeyCode,
    modifiers: KeyModifiers,
    label: String,
}

impl KeyBinding {
    pub(crate) fn parse(raw: &str) -> Result<Self> {
        let label = raw.trim().to_string();
        let (modifiers, name) = if label.to_ascii_lowercase().starts_with("ctrl+") {
            (KeyModifiers::CONTROL, &label["ctrl+".len()..])
        } else {
            (KeyModifiers::NONE, label.as_str())
        };
        let code = match name.to_ascii_lowercase().as_str() {
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "pgup" | "pageup" => KeyCode::PageUp,
            "pgdown" | "pagedown" => KeyCode::PageDown,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "enter" => KeyCode::Enter,
            "esc" | "escape" => KeyCode::Esc,
            "tab" => KeyCode::Tab,
            "backspace" => KeyCode::Backspace,
            "space" => KeyCode::Char(' '),
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => return Err(anyhow!("unknown key name {:?}", raw)),
                }
            }
        };
        Ok(Self {
            code,
            modifiers,
            label,
        })
    }

    pub(crate) fn matches(&self, key: &KeyEvent) -> bool {
        // Shift is implied by the character itself.
        let mods = key.modifiers.difference(KeyModifiers::SHIFT);
        key.code == self.code && mods == self.modifiers
    }
}

/// Key bindings, built once at startup and shared with the browser.
#[derive(Debug, Clone)]
pub(crate) struct KeyMap {
    bindings: HashMap<Action, Vec<KeyBinding>>,
}

impl Default for KeyMap {
    fn default() -> Self {
        let defaults: [(Action, &[&str]); 8] = [
            (Action::Up, &["k", "up"]),
            (Action::Down, &["j", "down"]),
            (Action::PageUp, &["pgup", "ctrl+u"]),
            (Action::PageDown, &["pgdown", "ctrl+d"]),
            (Action::Select, &["enter"]),
            (Action::Back, &["x"]),
            (Action::Search, &["/", "f"]),
            (Action::Quit, &["q", "ctrl+c"]),
        ];
        let bindings = defaults
            .into_iter()
            .map(|(action, keys)| {
                let keys = keys
                    .iter()
                    .filter_map(|k| KeyBinding::parse(k).ok())
                    .collect();
                (action, keys)
            })
            .collect();
        Self { bindings }
    }
}

impl KeyMap {
    /// Defaults with per-action replacements, e.g. `search = ["/"]`.
    pub(crate) fn with_overrides(overrides: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut map = Self::default();
        for (name, keys) in overrides {
            let action =
                Action::from_name(name).ok_or_else(|| anyhow!("unknown key action {:?}", name))?;
            let parsed = keys
                .iter()
                .map(|k| KeyBinding::parse(k))
                .collect::<Result<Vec<_>>>()?;
            if parsed.is_empty() {
                return Err(anyhow!("key action {:?} has no keys", name));
            }
            map.bindings.insert(action, parsed);
        }
        Ok(map)
    }

    pub(crate) fn matches(&self, action: Action, key: &KeyEvent) -> bool {
        self.bindings
            .get(&action)
            .is_some_and(|keys| keys.iter().any(|b| b.matches(key)))
    }

    pub(crate) fn action_for(&self, key: &KeyEvent) -> Option<Action> {
        Action::ALL.into_iter().find(|a| self.matches(*a, key))
    }

    /// Help text for every action. `compact` shows only the first key of
    /// each action.
    pub(crate) fn help_line(&self, compact: bool) -> String {
        let order = [
            Action::Up,
            Action::Down,
            Action::PageUp,
            Action::PageDown,
            Action::Select,
            Action::Back,
            Action::Search,
            Action::Quit,
        ];
        order
            .iter()
            .filter_map(|action| {
                let keys = self.bindings.get(action)?;
                let labels = if compact {
                    keys.first()?.label.clone()
                } else {
                    keys.iter()
                        .map(|k| k.label.as_str())
                        .collect::<Vec<_>>()
                        .join("/")
                };
                Some(format!("{} {}", labels, action.help()))
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}
