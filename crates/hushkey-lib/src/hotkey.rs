//! Hotkey codec: converts between `"Ctrl+Alt+N"` strings and [`KeyCombination`].
//!
//! Two entry points:
//! - [`parse`] is lenient: unknown modifier tokens are skipped and an
//!   unresolvable key falls back to [`DEFAULT_HOTKEY`] with a warning, so a
//!   bad config string never stops the app from starting.
//! - `str::parse::<KeyCombination>()` is strict and returns a [`HotkeyError`].
//!   Used for validation and by the CLI.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Separator between tokens in a hotkey string.
pub const DELIMITER: char = '+';

/// Combination used when a hotkey string cannot be parsed.
pub const DEFAULT_HOTKEY: KeyCombination = KeyCombination {
    modifiers: ModifierSet::of(&[Modifier::Ctrl, Modifier::Alt]),
    key: Key::Letter('N'),
};

// ── Errors ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyError {
    /// The string was empty or whitespace-only.
    Empty,
    /// The last token did not name a known key.
    UnknownKey(String),
    /// A non-final token did not name a modifier (strict parsing only).
    UnknownModifier(String),
}

impl fmt::Display for HotkeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotkeyError::Empty => write!(f, "hotkey is empty"),
            HotkeyError::UnknownKey(k) => write!(f, "unknown key \"{k}\""),
            HotkeyError::UnknownModifier(m) => write!(f, "unknown modifier \"{m}\""),
        }
    }
}

impl std::error::Error for HotkeyError {}

/// Recoverable warning produced when [`parse`] falls back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyWarning {
    pub input: String,
    pub reason: HotkeyError,
}

impl fmt::Display for HotkeyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not parse hotkey \"{}\" ({}), using {DEFAULT_HOTKEY}",
            self.input, self.reason
        )
    }
}

// ── Modifiers ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Win,
}

impl Modifier {
    /// All modifiers in canonical formatting order.
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Win];

    const fn bit(self) -> u8 {
        match self {
            Modifier::Ctrl => 0b0001,
            Modifier::Alt => 0b0010,
            Modifier::Shift => 0b0100,
            Modifier::Win => 0b1000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
            Modifier::Win => "Win",
        }
    }

    /// Resolve a modifier name (case-insensitive, common aliases accepted).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "ctl" => Some(Modifier::Ctrl),
            "alt" | "option" | "menu" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "win" | "windows" | "super" | "meta" | "cmd" | "command" | "logo" => {
                Some(Modifier::Win)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order-independent set of modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub const EMPTY: ModifierSet = ModifierSet(0);

    /// Build a set from a slice (usable in `const` context).
    pub const fn of(modifiers: &[Modifier]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < modifiers.len() {
            bits |= modifiers[i].bit();
            i += 1;
        }
        ModifierSet(bits)
    }

    pub fn insert(&mut self, m: Modifier) {
        self.0 |= m.bit();
    }

    pub fn remove(&mut self, m: Modifier) {
        self.0 &= !m.bit();
    }

    pub fn contains(self, m: Modifier) -> bool {
        self.0 & m.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate members in canonical order (Ctrl, Alt, Shift, Win).
    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl From<Modifier> for ModifierSet {
    fn from(m: Modifier) -> Self {
        ModifierSet(m.bit())
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = ModifierSet::EMPTY;
        for m in iter {
            set.insert(m);
        }
        set
    }
}

impl BitOr for Modifier {
    type Output = ModifierSet;
    fn bitor(self, rhs: Modifier) -> ModifierSet {
        ModifierSet(self.bit() | rhs.bit())
    }
}

impl BitOr<Modifier> for ModifierSet {
    type Output = ModifierSet;
    fn bitor(self, rhs: Modifier) -> ModifierSet {
        ModifierSet(self.0 | rhs.bit())
    }
}

impl BitOr for ModifierSet {
    type Output = ModifierSet;
    fn bitor(self, rhs: ModifierSet) -> ModifierSet {
        ModifierSet(self.0 | rhs.0)
    }
}

impl BitOrAssign<Modifier> for ModifierSet {
    fn bitor_assign(&mut self, rhs: Modifier) {
        self.insert(rhs);
    }
}

impl fmt::Display for ModifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "{DELIMITER}")?;
            }
            f.write_str(m.name())?;
        }
        Ok(())
    }
}

// ── Keys ──

/// A single non-modifier key.
///
/// Payload variants hold validated values: `Letter` is `'A'..='Z'`,
/// `Digit` and `Numpad` are `0..=9`, `Function` is `1..=24`. Use
/// [`Key::from_name`] or the constructors to build them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Letter(char),
    Digit(u8),
    Function(u8),
    Numpad(u8),
    Space,
    Enter,
    Tab,
    Escape,
    Backspace,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    CapsLock,
    NumLock,
    ScrollLock,
    PrintScreen,
    Pause,
    Minus,
    Equal,
    BracketLeft,
    BracketRight,
    Backslash,
    Semicolon,
    Quote,
    Comma,
    Period,
    Slash,
    Backquote,
    NumpadAdd,
    NumpadSubtract,
    NumpadMultiply,
    NumpadDivide,
    NumpadDecimal,
}

/// Named keys: canonical name first, then accepted aliases (all compared
/// case-insensitively). Aliases cover the names older configs were written with.
const NAMED_KEYS: &[(Key, &[&str])] = &[
    (Key::Space, &["Space", "Spacebar"]),
    (Key::Enter, &["Enter", "Return"]),
    (Key::Tab, &["Tab"]),
    (Key::Escape, &["Escape", "Esc"]),
    (Key::Backspace, &["Backspace", "Back"]),
    (Key::Insert, &["Insert", "Ins"]),
    (Key::Delete, &["Delete", "Del"]),
    (Key::Home, &["Home"]),
    (Key::End, &["End"]),
    (Key::PageUp, &["PageUp", "PgUp", "Prior"]),
    (Key::PageDown, &["PageDown", "PgDn", "Next"]),
    (Key::Up, &["Up", "ArrowUp"]),
    (Key::Down, &["Down", "ArrowDown"]),
    (Key::Left, &["Left", "ArrowLeft"]),
    (Key::Right, &["Right", "ArrowRight"]),
    (Key::CapsLock, &["CapsLock", "Capital"]),
    (Key::NumLock, &["NumLock"]),
    (Key::ScrollLock, &["ScrollLock", "Scroll"]),
    (Key::PrintScreen, &["PrintScreen", "PrtSc", "Snapshot"]),
    (Key::Pause, &["Pause", "Break"]),
    (Key::Minus, &["Minus", "OemMinus"]),
    (Key::Equal, &["Equal", "Equals", "OemPlus"]),
    (Key::BracketLeft, &["BracketLeft", "LeftBracket", "OemOpenBrackets", "Oem4"]),
    (Key::BracketRight, &["BracketRight", "RightBracket", "OemCloseBrackets", "Oem6"]),
    (Key::Backslash, &["Backslash", "OemPipe", "Oem5"]),
    (Key::Semicolon, &["Semicolon", "OemSemicolon", "Oem1"]),
    (Key::Quote, &["Quote", "OemQuotes", "Oem7"]),
    (Key::Comma, &["Comma", "OemComma"]),
    (Key::Period, &["Period", "Dot", "OemPeriod"]),
    (Key::Slash, &["Slash", "OemQuestion", "Oem2"]),
    (Key::Backquote, &["Backquote", "Grave", "Oemtilde", "Oem3"]),
    (Key::NumpadAdd, &["NumpadAdd", "Add"]),
    (Key::NumpadSubtract, &["NumpadSubtract", "Subtract"]),
    (Key::NumpadMultiply, &["NumpadMultiply", "Multiply"]),
    (Key::NumpadDivide, &["NumpadDivide", "Divide"]),
    (Key::NumpadDecimal, &["NumpadDecimal", "Decimal"]),
];

impl Key {
    pub fn letter(c: char) -> Option<Key> {
        let c = c.to_ascii_uppercase();
        c.is_ascii_uppercase().then_some(Key::Letter(c))
    }

    pub fn digit(n: u8) -> Option<Key> {
        (n <= 9).then_some(Key::Digit(n))
    }

    pub fn function(n: u8) -> Option<Key> {
        (1..=24).contains(&n).then_some(Key::Function(n))
    }

    pub fn numpad(n: u8) -> Option<Key> {
        (n <= 9).then_some(Key::Numpad(n))
    }

    /// Resolve a key name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Key> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(k) = Key::letter(c) {
                return Some(k);
            }
            if let Some(d) = c.to_digit(10) {
                return Key::digit(d as u8);
            }
        }

        let lower = name.to_ascii_lowercase();

        // "D5" is how some frameworks name the top-row digit keys.
        if let Some(rest) = lower.strip_prefix('d')
            && rest.len() == 1
            && let Ok(n) = rest.parse::<u8>()
        {
            return Key::digit(n);
        }
        if let Some(rest) = lower.strip_prefix('f')
            && let Ok(n) = rest.parse::<u8>()
        {
            return Key::function(n);
        }
        for prefix in ["numpad", "num", "kp"] {
            if let Some(rest) = lower.strip_prefix(prefix)
                && let Ok(n) = rest.parse::<u8>()
            {
                return Key::numpad(n);
            }
        }

        NAMED_KEYS
            .iter()
            .find(|(_, names)| names.iter().any(|n| n.eq_ignore_ascii_case(&lower)))
            .map(|(key, _)| *key)
    }

    /// Canonical name, as written by [`format`].
    pub fn name(&self) -> String {
        match self {
            Key::Letter(c) => c.to_string(),
            Key::Digit(n) => n.to_string(),
            Key::Function(n) => format!("F{n}"),
            Key::Numpad(n) => format!("Num{n}"),
            named => NAMED_KEYS
                .iter()
                .find(|(k, _)| k == named)
                .map(|(_, names)| names[0].to_string())
                .unwrap_or_else(|| format!("{named:?}")),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ── Combination ──

/// A modifier set plus exactly one non-modifier key.
///
/// An empty modifier set is valid and fires on the bare key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombination {
    pub modifiers: ModifierSet,
    pub key: Key,
}

impl KeyCombination {
    pub fn new(modifiers: impl Into<ModifierSet>, key: Key) -> Self {
        KeyCombination {
            modifiers: modifiers.into(),
            key,
        }
    }
}

impl Default for KeyCombination {
    fn default() -> Self {
        DEFAULT_HOTKEY
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.modifiers.is_empty() {
            write!(f, "{}{DELIMITER}", self.modifiers)?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for KeyCombination {
    type Err = HotkeyError;

    /// Strict parse: unknown modifiers and keys are errors.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(HotkeyError::Empty);
        }
        let tokens: Vec<&str> = s.split(DELIMITER).map(str::trim).collect();
        let (key_token, modifier_tokens) = tokens
            .split_last()
            .ok_or(HotkeyError::Empty)?;

        let mut modifiers = ModifierSet::EMPTY;
        for token in modifier_tokens {
            let m = Modifier::from_name(token)
                .ok_or_else(|| HotkeyError::UnknownModifier(token.to_string()))?;
            modifiers.insert(m);
        }
        let key =
            Key::from_name(key_token).ok_or_else(|| HotkeyError::UnknownKey(key_token.to_string()))?;
        Ok(KeyCombination { modifiers, key })
    }
}

// ── Lenient codec ──

/// Parse a hotkey string, returning the fallback warning (if any) instead of logging it.
///
/// Unknown modifier tokens are skipped. If the key token doesn't resolve, the
/// result is [`DEFAULT_HOTKEY`] together with a [`HotkeyWarning`].
pub fn parse_with_warning(text: &str) -> (KeyCombination, Option<HotkeyWarning>) {
    let warn = |reason| {
        (
            DEFAULT_HOTKEY,
            Some(HotkeyWarning {
                input: text.to_string(),
                reason,
            }),
        )
    };

    if text.trim().is_empty() {
        return warn(HotkeyError::Empty);
    }

    let tokens: Vec<&str> = text.split(DELIMITER).map(str::trim).collect();
    let Some((key_token, modifier_tokens)) = tokens.split_last() else {
        return warn(HotkeyError::Empty);
    };

    let mut modifiers = ModifierSet::EMPTY;
    for token in modifier_tokens {
        match Modifier::from_name(token) {
            Some(m) => modifiers.insert(m),
            None => log::debug!("[hotkey] ignoring unknown modifier \"{token}\" in \"{text}\""),
        }
    }

    match Key::from_name(key_token) {
        Some(key) => (KeyCombination { modifiers, key }, None),
        None => warn(HotkeyError::UnknownKey(key_token.to_string())),
    }
}

/// Parse a hotkey string, logging a warning and returning [`DEFAULT_HOTKEY`]
/// when it can't be resolved. Never fails.
pub fn parse(text: &str) -> KeyCombination {
    let (combination, warning) = parse_with_warning(text);
    if let Some(w) = warning {
        log::warn!("[hotkey] {w}");
    }
    combination
}

/// Format a combination in canonical form (`Ctrl+Alt+Shift+Win+Key`).
pub fn format(combination: &KeyCombination) -> String {
    combination.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo(mods: &[Modifier], key: Key) -> KeyCombination {
        KeyCombination::new(ModifierSet::of(mods), key)
    }

    #[test]
    fn parses_default_string() {
        assert_eq!(parse("Ctrl+Alt+N"), DEFAULT_HOTKEY);
    }

    #[test]
    fn modifier_order_does_not_matter() {
        assert_eq!(parse("Alt+Ctrl+N"), parse("Ctrl+Alt+N"));
        assert_eq!(
            parse("Shift+Win+Ctrl+F9"),
            combo(&[Modifier::Ctrl, Modifier::Shift, Modifier::Win], Key::Function(9))
        );
    }

    #[test]
    fn parsing_is_case_insensitive() {
        assert_eq!(parse("ctrl+ALT+n"), DEFAULT_HOTKEY);
        assert_eq!(parse("CONTROL+shift+pageup"), combo(&[Modifier::Ctrl, Modifier::Shift], Key::PageUp));
    }

    #[test]
    fn whitespace_around_tokens_is_trimmed() {
        assert_eq!(parse(" Ctrl + Alt + N "), DEFAULT_HOTKEY);
    }

    #[test]
    fn unknown_modifier_is_ignored() {
        let c = parse("Ctrl+Hyper+M");
        assert_eq!(c, combo(&[Modifier::Ctrl], Key::Letter('M')));
    }

    #[test]
    fn duplicate_modifiers_collapse() {
        let c = parse("Ctrl+Ctrl+Control+K");
        assert_eq!(c.modifiers.len(), 1);
        assert!(c.modifiers.contains(Modifier::Ctrl));
    }

    #[test]
    fn bare_key_has_no_modifiers() {
        let c = parse("F13");
        assert!(c.modifiers.is_empty());
        assert_eq!(c.key, Key::Function(13));
    }

    #[test]
    fn unknown_key_falls_back_to_default_with_warning() {
        let (c, w) = parse_with_warning("Ctrl+Shift+Banana");
        assert_eq!(c, DEFAULT_HOTKEY);
        let w = w.unwrap();
        assert_eq!(w.reason, HotkeyError::UnknownKey("Banana".into()));
        assert!(w.to_string().contains("Ctrl+Alt+N"));
    }

    #[test]
    fn malformed_inputs_fall_back_to_default() {
        for input in ["", "   ", "+", "Ctrl+", "Ctrl+Alt", "++++", "F25", "Ctrl+NN", "D10"] {
            let (c, w) = parse_with_warning(input);
            assert_eq!(c, DEFAULT_HOTKEY, "input {input:?}");
            assert!(w.is_some(), "input {input:?} should warn");
        }
    }

    #[test]
    fn modifier_as_last_token_is_not_a_key() {
        let (c, w) = parse_with_warning("Ctrl+Shift");
        assert_eq!(c, DEFAULT_HOTKEY);
        assert_eq!(w.unwrap().reason, HotkeyError::UnknownKey("Shift".into()));
    }

    #[test]
    fn legacy_key_names_resolve() {
        assert_eq!(Key::from_name("D5"), Some(Key::Digit(5)));
        assert_eq!(Key::from_name("NumPad7"), Some(Key::Numpad(7)));
        assert_eq!(Key::from_name("OemMinus"), Some(Key::Minus));
        assert_eq!(Key::from_name("Return"), Some(Key::Enter));
        assert_eq!(Key::from_name("Esc"), Some(Key::Escape));
        assert_eq!(Key::from_name("next"), Some(Key::PageDown));
    }

    #[test]
    fn format_uses_canonical_order_and_names() {
        let c = combo(&[Modifier::Win, Modifier::Shift, Modifier::Alt, Modifier::Ctrl], Key::Escape);
        assert_eq!(format(&c), "Ctrl+Alt+Shift+Win+Escape");
        assert_eq!(format(&parse("alt+ctrl+d5")), "Ctrl+Alt+5");
        assert_eq!(format(&parse("kp3")), "Num3");
    }

    #[test]
    fn format_then_parse_roundtrips() {
        let samples = [
            DEFAULT_HOTKEY,
            combo(&[], Key::Function(24)),
            combo(&[Modifier::Shift], Key::Digit(0)),
            combo(&[Modifier::Ctrl, Modifier::Win], Key::Numpad(9)),
            combo(&[Modifier::Alt], Key::Backquote),
            combo(&[Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Win], Key::Pause),
            combo(&[Modifier::Ctrl], Key::NumpadDecimal),
        ];
        for c in samples {
            assert_eq!(parse(&format(&c)), c, "roundtrip of {c}");
        }
    }

    #[test]
    fn every_named_key_roundtrips() {
        for (key, _) in NAMED_KEYS {
            let c = combo(&[Modifier::Ctrl], *key);
            assert_eq!(parse(&format(&c)), c);
        }
    }

    #[test]
    fn strict_parse_reports_errors() {
        assert_eq!("".parse::<KeyCombination>(), Err(HotkeyError::Empty));
        assert_eq!(
            "Ctrl+Hyper+M".parse::<KeyCombination>(),
            Err(HotkeyError::UnknownModifier("Hyper".into()))
        );
        assert_eq!(
            "Ctrl+Banana".parse::<KeyCombination>(),
            Err(HotkeyError::UnknownKey("Banana".into()))
        );
        assert_eq!("Win+Space".parse::<KeyCombination>(), Ok(combo(&[Modifier::Win], Key::Space)));
    }

    #[test]
    fn modifier_set_operations() {
        let mut set = Modifier::Ctrl | Modifier::Alt;
        assert_eq!(set.len(), 2);
        set |= Modifier::Shift;
        assert!(set.contains(Modifier::Shift));
        set.remove(Modifier::Ctrl);
        assert!(!set.contains(Modifier::Ctrl));
        assert_eq!(set.to_string(), "Alt+Shift");
        let collected: ModifierSet = [Modifier::Win, Modifier::Win].into_iter().collect();
        assert_eq!(collected, ModifierSet::from(Modifier::Win));
    }

    #[test]
    fn key_constructors_validate() {
        assert_eq!(Key::letter('q'), Some(Key::Letter('Q')));
        assert_eq!(Key::letter('1'), None);
        assert_eq!(Key::function(0), None);
        assert_eq!(Key::function(24), Some(Key::Function(24)));
        assert_eq!(Key::digit(10), None);
    }
}
