//! Pure value/selection arithmetic for text-entry controls.
//!
//! Every mutation the typing engine performs is computed here over a
//! [`EditSnapshot`] of the control and applied by the caller. Offsets are
//! character offsets, not byte offsets.

use std::sync::LazyLock;

use fancy_regex::Regex;

/// What the engine needs to know about a control before editing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EditSnapshot {
    pub(crate) value: String,
    /// `None` means the control type exposes no selection range; edits then
    /// use end-of-text semantics.
    pub(crate) selection: Option<(usize, usize)>,
    /// Date controls only accept a spliced value that round-trips as a
    /// complete calendar date.
    pub(crate) reject_invalid_date: bool,
    /// Already gated on the control types that honor `maxlength`.
    pub(crate) max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub(crate) value: String,
    pub(crate) caret: usize,
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `char_idx`-th character, clamped to the end.
fn byte_at(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(byte, _)| byte)
        .unwrap_or(s.len())
}

fn splice(value: &str, start: usize, end: usize, insert: &str) -> String {
    let from = byte_at(value, start);
    let to = byte_at(value, end.max(start));
    format!("{}{}{}", &value[..from], insert, &value[to..])
}

pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    value[..byte_at(value, max)].to_string()
}

pub(crate) fn insertion(snap: &EditSnapshot, new_entry: &str) -> Edit {
    let value = &snap.value;
    let len = char_len(value);
    let entry_len = char_len(new_entry);

    let (mut new_value, mut caret) = match snap.selection {
        // No selection range: appended at the end.
        None => (format!("{value}{new_entry}"), len + entry_len),
        Some((start, end)) if start == end => {
            let start = start.min(len);
            (splice(value, start, start, new_entry), start + entry_len)
        }
        // The selected region is replaced regardless of direction.
        Some((start, end)) => {
            let start = start.min(len);
            let end = end.min(len);
            (splice(value, start, end, new_entry), start + entry_len)
        }
    };

    // A date control silently rejects incomplete values while the caret math
    // still advances over the rejected text.
    if snap.reject_invalid_date && !is_valid_date_string(&new_value) {
        new_value = value.clone();
    }

    if let Some(max) = snap.max_length {
        if char_len(&new_value) > max {
            new_value = truncate_chars(&new_value, max);
        }
        if caret > max {
            caret = max;
        }
    }

    Edit {
        value: new_value,
        caret,
    }
}

pub(crate) fn backspace(snap: &EditSnapshot) -> Edit {
    let value = &snap.value;
    let len = char_len(value);

    match snap.selection {
        // End-of-text semantics: drop the final character.
        None => Edit {
            value: truncate_chars(value, len.saturating_sub(1)),
            caret: 0,
        },
        Some((start, end)) if start == end => {
            let start = start.min(len);
            if start == 0 {
                Edit {
                    value: value.clone(),
                    caret: 0,
                }
            } else {
                Edit {
                    value: splice(value, start - 1, end.min(len), ""),
                    caret: start - 1,
                }
            }
        }
        Some((start, end)) => {
            let start = start.min(len);
            Edit {
                value: splice(value, start, end.min(len), ""),
                caret: start,
            }
        }
    }
}

pub(crate) fn forward_delete(snap: &EditSnapshot) -> Edit {
    let value = &snap.value;
    let len = char_len(value);

    match snap.selection {
        // End-of-text caret: nothing ahead of it to delete.
        None => Edit {
            value: value.clone(),
            caret: 0,
        },
        Some((start, end)) if start == end => {
            let start = start.min(len);
            let new_value = if start == len {
                value.clone()
            } else {
                splice(value, start, start + 1, "")
            };
            Edit {
                value: new_value,
                caret: start,
            }
        }
        Some((start, end)) => {
            let start = start.min(len);
            Edit {
                value: splice(value, start, end.min(len), ""),
                caret: start,
            }
        }
    }
}

// Valid floating-point number per the HTML value sanitization algorithm,
// with the leading-dot form browsers accept on re-parse.
static NUMBER_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(\d+(\.\d+)?|\.\d+)([eE][-+]?\d+)?$").unwrap()
});

static DATE_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());

pub(crate) fn is_valid_number_string(value: &str) -> bool {
    NUMBER_VALUE.is_match(value).unwrap_or(false)
}

/// A full `yyyy-mm-dd` string naming a real calendar date.
pub(crate) fn is_valid_date_string(value: &str) -> bool {
    let Ok(Some(captures)) = DATE_VALUE.captures(value) else {
        return false;
    };
    let field = |idx: usize| {
        captures
            .get(idx)
            .and_then(|m| m.as_str().parse::<u32>().ok())
    };
    let (Some(year), Some(month), Some(day)) = (field(1), field(2), field(3)) else {
        return false;
    };
    if month == 0 || month > 12 || day == 0 {
        return false;
    }
    day <= days_in_month(year, month)
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}
