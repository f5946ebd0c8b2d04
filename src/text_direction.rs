//! Per-line text direction detection.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Layout direction of a line of text.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextDirection {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

impl TextDirection {
    /// Value for an HTML `dir` attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }
}

impl fmt::Display for TextDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit marks, embeddings, overrides and isolates.
static BIDI_CONTROLS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[\x{200E}\x{200F}\x{202A}-\x{202E}\x{2066}-\x{2069}]").ok());

/// First strong character wins: Hebrew, Arabic (with supplements and
/// presentation forms) versus basic and extended Latin.
static STRONG_CHAR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<rtl>[\x{0590}-\x{05FF}\x{0600}-\x{06FF}\x{0750}-\x{077F}",
        r"\x{0870}-\x{08FF}\x{FB50}-\x{FDFF}\x{FE70}-\x{FEFF}])",
        r"|(?P<ltr>[A-Za-z\x{00C0}-\x{024F}])",
    ))
    .ok()
});

fn strip_bidi_controls(text: &str) -> std::borrow::Cow<'_, str> {
    match BIDI_CONTROLS.as_ref() {
        Some(regex) => regex.replace_all(text, ""),
        None => std::borrow::Cow::Borrowed(text),
    }
}

/// Classify a line as right-to-left or left-to-right.
///
/// Defaults to [`TextDirection::Ltr`] when no strong character is found.
#[must_use]
pub fn get_text_direction(text: &str) -> TextDirection {
    let normalized = strip_bidi_controls(text);

    STRONG_CHAR
        .as_ref()
        .and_then(|regex| regex.captures(&normalized))
        .map_or(TextDirection::Ltr, |caps| {
            if caps.name("rtl").is_some() {
                TextDirection::Rtl
            } else {
                TextDirection::Ltr
            }
        })
}

/// Split on `\n` or `\r\n`.
#[must_use]
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Direction of every line of a message.
#[must_use]
pub fn line_directions(text: &str) -> Vec<(&str, TextDirection)> {
    split_lines(text)
        .into_iter()
        .map(|line| (line, get_text_direction(line)))
        .collect()
}
