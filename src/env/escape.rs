//! Single-quote literals for the supported shells

use crate::credvalidate::is_bidi_control;

/// Characters PowerShell accepts as a single quote
const POWERSHELL_QUOTES: [char; 5] = ['\'', '\u{2018}', '\u{2019}', '\u{201A}', '\u{201B}'];

/// Drop control characters and bidi overrides
pub fn strip_unsafe(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && !is_bidi_control(*c))
        .collect()
}

/// bash and zsh: close the quote, emit a double-quoted `'`, reopen
pub fn escape_posix(value: &str) -> String {
    format!("'{}'", strip_unsafe(value).replace('\'', r#"'"'"'"#))
}

/// fish: backslashes first, then quotes
pub fn escape_fish(value: &str) -> String {
    let s = strip_unsafe(value).replace('\\', r"\\").replace('\'', r"'\''");
    format!("'{s}'")
}

/// PowerShell: every quote-like character is doubled
pub fn escape_powershell(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in strip_unsafe(value).chars() {
        if POWERSHELL_QUOTES.contains(&c) {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}
