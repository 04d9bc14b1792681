//! Parameter extraction: structured values and sub-ranges from command arguments.

use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::document::{Argument, Document, Fragment};

/// Remove exactly one leading and one trailing delimiter.
/// Returns `None` when `text` is too short to carry both delimiters.
pub fn strip_group(text: &str) -> Option<&str> {
    if text.len() < 2 {
        return None;
    }
    let mut chars = text.chars();
    chars.next()?;
    chars.next_back()?;
    return Some(chars.as_str());
}

/// Split `body` with `separator` and locate every piece inside `body`.
///
/// Each range is found by scanning forward from the end of the previous piece
/// for the piece's text, so a piece that also occurs verbatim between the
/// previous piece and its real position (possible after an empty piece) is
/// located at that earlier occurrence. Trailing empty pieces are dropped.
pub fn split_to_sub_ranges(body: &str, separator: &Regex) -> Vec<Range<usize>> {
    let mut pieces: Vec<&str> = separator.split(body).collect();
    if pieces.len() > 1 {
        while pieces.last().is_some_and(|p| return p.is_empty()) {
            pieces.pop();
        }
    }

    let mut ranges = Vec::with_capacity(pieces.len());
    let mut offset = 0_usize;
    for piece in pieces {
        let Some(found) = body.get(offset..).and_then(|rest| return rest.find(piece)) else {
            continue;
        };
        let start = offset.saturating_add(found);
        let end = start.saturating_add(piece.len());
        ranges.push(start..end);
        offset = end;
    }
    return ranges;
}

/// Absolute ranges of the separated values inside `argument`.
pub fn extract_sub_parameter_ranges(
    document: &Document,
    argument: &Argument,
    separator: &Regex,
) -> Vec<Range<usize>> {
    let Some(body) = strip_group(document.text(&argument.range)) else {
        return Vec::new();
    };
    let body_start = argument.range.start.saturating_add(1);
    return split_to_sub_ranges(body, separator)
        .into_iter()
        .map(|r| return body_start.saturating_add(r.start)..body_start.saturating_add(r.end))
        .collect();
}

/// Insertion-ordered `key=value` options of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OptionalParameters {
    /// Entries in document order.
    entries: Vec<(String, String)>,
}

impl OptionalParameters {
    /// Value of `key`; empty for bare keys.
    pub fn get(&self, key: &str) -> Option<&str> {
        return self.entries.iter().find(|(k, _)| return k == key).map(|(_, v)| return v.as_str());
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: String, value: String) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| return *k == key) {
            entry.1 = value;
            return;
        }
        self.entries.push((key, value));
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        return self.entries.iter().map(|(k, v)| return (k.as_str(), v.as_str()));
    }
}

/// Build the option map of all `optional` arguments.
///
/// Top-level text and the inner text of directly nested groups are
/// concatenated, split on `,` and then on `=`. Commands at the top level
/// contribute nothing.
pub fn parse_optional_parameters<'a>(
    document: &Document,
    optional: impl IntoIterator<Item = &'a Argument>,
) -> OptionalParameters {
    let mut flattened = String::new();
    for argument in optional {
        for fragment in &argument.content {
            match fragment {
                Fragment::Text(range) => flattened.push_str(document.text(range)),
                Fragment::Group { range, .. } => {
                    flattened.push_str(strip_group(document.text(range)).unwrap_or(""));
                },
                Fragment::Command(_) => {},
            }
        }
    }

    let mut parameters = OptionalParameters::default();
    if flattened.trim().is_empty() {
        return parameters;
    }
    for parameter in flattened.split(',') {
        let mut parts = parameter.split('=');
        let key = parts.next().unwrap_or("").trim().to_string();
        let value = parts.next().unwrap_or("").trim().to_string();
        parameters.insert(key, value);
    }
    return parameters;
}

/// Text of each required argument, one entry per argument.
///
/// Literal text is kept as written; a nested command contributes its token
/// (`\foo`). Nested groups contribute nothing, so an argument holding only a
/// group yields an empty string.
pub fn parse_required_parameters<'a>(
    document: &Document,
    required: impl IntoIterator<Item = &'a Argument>,
) -> Vec<String> {
    return required
        .into_iter()
        .map(|argument| {
            let mut value = String::new();
            for fragment in &argument.content {
                match fragment {
                    Fragment::Text(range) => value.push_str(document.text(range)),
                    Fragment::Command(id) => value.push_str(document.command_name(*id)),
                    Fragment::Group { .. } => {},
                }
            }
            return value;
        })
        .collect();
}

/// Absolute range of the value of `key` in a `key=value` option list,
/// braces included when the value is a group.
pub fn option_value_range(document: &Document, argument: &Argument, key: &str) -> Option<Range<usize>> {
    let inner = argument.inner();
    let body = document.text(&inner);

    for entry in split_top_level(body, b',') {
        let text = body.get(entry.clone())?;
        let Some(equals) = text.find('=') else {
            continue;
        };
        if text.get(..equals).map(str::trim) != Some(key) {
            continue;
        }
        let value = text.get(equals.saturating_add(1)..)?;
        let leading = value.len().saturating_sub(value.trim_start().len());
        let trimmed = value.trim();
        let start = inner
            .start
            .saturating_add(entry.start)
            .saturating_add(equals)
            .saturating_add(1)
            .saturating_add(leading);
        return Some(start..start.saturating_add(trimmed.len()));
    }
    return None;
}

/// Ranges of `body` between top-level `separator` bytes, ignoring braced content.
fn split_top_level(body: &str, separator: u8) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0_usize;
    for (i, byte) in body.bytes().enumerate() {
        match byte {
            b'{' => depth = depth.saturating_add(1),
            b'}' => depth = depth.saturating_sub(1),
            b if b == separator && depth == 0 => {
                ranges.push(start..i);
                start = i.saturating_add(1);
            },
            _ => {},
        }
    }
    ranges.push(start..body.len());
    return ranges;
}
