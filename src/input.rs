//! GPUI keystrokes as terminal input.
//!
//! [`keystroke_to_input`] turns a [`Keystroke`] into the text an engine reports
//! through `on_data`. Cursor keys follow the terminal's `APP_CURSOR` mode
//! (`ESC [ A` normally, `ESC O A` in application mode); Ctrl+letter maps to the
//! C0 control range; Alt prefixes ESC.
//!
//! | Key | Input |
//! |-----|-------|
//! | Enter | `\r` |
//! | Backspace | `\x7f` |
//! | Shift+Tab | `\x1b[Z` |
//! | Home / End | `\x1b[H` / `\x1b[F` |
//! | PageUp / PageDown | `\x1b[5~` / `\x1b[6~` |
//! | F1-F4 | `\x1bOP` - `\x1bOS` |
//! | F5-F12 | `\x1b[15~` - `\x1b[24~` |

use alacritty_terminal::term::TermMode;
use gpui::Keystroke;

/// The input `keystroke` produces, or `None` for keys that type nothing.
pub fn keystroke_to_input(keystroke: &Keystroke, mode: TermMode) -> Option<String> {
    let modifiers = &keystroke.modifiers;
    let key = keystroke.key.as_str();

    let app_cursor = mode.contains(TermMode::APP_CURSOR);
    if let Some(sequence) = named_key(key, modifiers.shift, modifiers.control, app_cursor) {
        return Some(sequence.to_owned());
    }

    let mut chars = key.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    };

    if modifiers.control {
        return single.and_then(control_char).map(String::from);
    }

    if modifiers.alt {
        return single
            .filter(char::is_ascii)
            .map(|ch| format!("\x1b{ch}"));
    }

    // key_char carries what was actually typed, shift and layout included.
    if let Some(key_char) = &keystroke.key_char {
        return Some(key_char.clone());
    }

    single.map(|ch| {
        if modifiers.shift {
            ch.to_ascii_uppercase().to_string()
        } else {
            ch.to_string()
        }
    })
}

fn named_key(key: &str, shift: bool, control: bool, app_cursor: bool) -> Option<&'static str> {
    let cursor = |normal, application| if app_cursor { application } else { normal };

    Some(match key {
        "space" if control => "\x00",
        "space" => " ",
        "enter" => "\r",
        "escape" => "\x1b",
        "backspace" => "\x7f",
        "tab" if shift => "\x1b[Z",
        "tab" => "\t",
        "up" => cursor("\x1b[A", "\x1bOA"),
        "down" => cursor("\x1b[B", "\x1bOB"),
        "right" => cursor("\x1b[C", "\x1bOC"),
        "left" => cursor("\x1b[D", "\x1bOD"),
        "home" => "\x1b[H",
        "end" => "\x1b[F",
        "pageup" => "\x1b[5~",
        "pagedown" => "\x1b[6~",
        "insert" => "\x1b[2~",
        "delete" => "\x1b[3~",
        "f1" => "\x1bOP",
        "f2" => "\x1bOQ",
        "f3" => "\x1bOR",
        "f4" => "\x1bOS",
        "f5" => "\x1b[15~",
        "f6" => "\x1b[17~",
        "f7" => "\x1b[18~",
        "f8" => "\x1b[19~",
        "f9" => "\x1b[20~",
        "f10" => "\x1b[21~",
        "f11" => "\x1b[23~",
        "f12" => "\x1b[24~",
        _ => return None,
    })
}

fn control_char(ch: char) -> Option<char> {
    if ch.is_ascii_alphabetic() {
        return Some(((ch.to_ascii_uppercase() as u8) - b'@') as char);
    }
    match ch {
        '[' => Some('\x1b'),
        '\\' => Some('\x1c'),
        ']' => Some('\x1d'),
        '^' => Some('\x1e'),
        '_' => Some('\x1f'),
        '?' => Some('\x7f'),
        _ => None,
    }
}
