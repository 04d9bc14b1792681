//! Label occurrences and the naming context they live in.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::catalog::{CommandCatalog, FloatKind, SectioningLevel};
use crate::document::{Document, NodeId};
use crate::params::{option_value_range, strip_group};

/// Settings the label convention reads, passed explicitly to every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConventionSettings {
    /// Deepest sectioning level whose labels are checked.
    pub minimum_section_level: SectioningLevel,
}

impl Default for ConventionSettings {
    fn default() -> Self {
        return Self {
            minimum_section_level: SectioningLevel::Subsection,
        };
    }
}

/// The unit a label names, which decides its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "context", content = "kind", rename_all = "lowercase")]
pub enum LabelContext {
    /// Inside a float-like environment.
    Float(FloatKind),
    /// No enforced prefix.
    Other,
    /// After a sectioning command of the given level.
    Section(SectioningLevel),
}

impl LabelContext {
    /// Expected label prefix, `None` for `Other`.
    pub const fn prefix(&self) -> Option<&'static str> {
        return match self {
            Self::Float(kind) => Some(kind.prefix()),
            Self::Other => None,
            Self::Section(level) => Some(level.prefix()),
        };
    }
}

impl std::fmt::Display for LabelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return match self {
            Self::Float(kind) => write!(f, "{}", kind.name()),
            Self::Other => f.write_str("other"),
            Self::Section(level) => f.write_str(level.command().trim_start_matches('\\')),
        };
    }
}

/// How a label is written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    /// A labelling command such as `\label{name}`.
    Command,
    /// A `label=` option of a listing-like environment such as `lstlisting`.
    OptionValue {
        /// The float kind of that environment.
        kind: FloatKind,
    },
}

/// One label definition in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelOccurrence {
    /// Range highlighted by diagnostics about this label.
    pub anchor: Range<usize>,
    /// The labelling command, or the environment's `\begin` command.
    pub command: NodeId,
    /// Label text as written, without delimiters.
    pub name: String,
    /// Range rewritten when the label is renamed.
    pub name_range: Range<usize>,
    /// Command or option form.
    pub source: LabelSource,
}

impl LabelOccurrence {
    /// Source text that replaces `name_range` to rename this label to `name`.
    pub fn replacement(&self, name: &str) -> String {
        return match self.source {
            LabelSource::Command => name.to_string(),
            LabelSource::OptionValue { .. } => format!("{{{name}}}"),
        };
    }
}

/// Every label defined in `document`, in document order.
pub fn label_occurrences(document: &Document, catalog: &CommandCatalog) -> Vec<LabelOccurrence> {
    let mut labels = Vec::new();
    for id in document.commands() {
        let name = document.command_name(id);
        if catalog.labels.contains(name) {
            labels.extend(command_label(document, id));
        } else if name == "\\begin" {
            labels.extend(option_label(document, id));
        }
    }
    return labels;
}

/// Label defined by a labelling command's first required argument.
///
/// A blank name such as `\label{}` defines nothing.
fn command_label(document: &Document, id: NodeId) -> Option<LabelOccurrence> {
    let argument = document.command(id)?.first_required_argument()?;
    let name = strip_group(document.text(&argument.range))?;
    if name.trim().is_empty() {
        return None;
    }
    return Some(LabelOccurrence {
        anchor: document.node(id).range.clone(),
        command: id,
        name: name.to_string(),
        name_range: argument.inner(),
        source: LabelSource::Command,
    });
}

/// Label given as a `label=` option of a listing-like environment's `\begin`.
///
/// Name and range both come from the first top-level `label=` entry; the name
/// is the value without its enclosing braces.
fn option_label(document: &Document, begin: NodeId) -> Option<LabelOccurrence> {
    let environment = document.parent(begin)?;
    let name = &document.environment(environment)?.name;
    if !CommandCatalog::takes_label_option(name) {
        return None;
    }
    let kind = FloatKind::from_environment(name)?;

    let name_range = document
        .command(begin)?
        .optional_arguments()
        .find_map(|argument| return option_value_range(document, argument, "label"))?;
    let value = document.text(&name_range);
    let label = value
        .strip_prefix('{')
        .and_then(|inner| return inner.strip_suffix('}'))
        .unwrap_or(value);
    if label.trim().is_empty() {
        return None;
    }

    return Some(LabelOccurrence {
        anchor: document.node(environment).range.clone(),
        command: begin,
        name: label.to_string(),
        name_range,
        source: LabelSource::OptionValue { kind },
    });
}

/// The naming context of `label`.
///
/// The nearest enclosing float-like environment wins over any sectioning
/// command. Otherwise the nearest preceding sectioning command at the same or
/// an outer nesting level decides; a section deeper than
/// `settings.minimum_section_level` is not checked.
pub fn context_of(document: &Document, label: &LabelOccurrence, settings: &ConventionSettings) -> LabelContext {
    if let LabelSource::OptionValue { kind } = label.source {
        return LabelContext::Float(kind);
    }

    if let Some(kind) = document
        .enclosing_environment(label.command)
        .and_then(|env| return document.environment(env))
        .and_then(|env| return FloatKind::from_environment(&env.name))
    {
        return LabelContext::Float(kind);
    }

    return match nearest_section(document, label.command) {
        Some(level) if level <= settings.minimum_section_level => LabelContext::Section(level),
        Some(_) | None => LabelContext::Other,
    };
}

/// Level of the nearest sectioning command before `id` at its nesting level or above.
fn nearest_section(document: &Document, id: NodeId) -> Option<SectioningLevel> {
    let mut current = id;
    loop {
        for sibling in document.previous_siblings(current) {
            if let Some(level) = SectioningLevel::from_command(document.command_name(sibling)) {
                return Some(level);
            }
        }
        current = document.parent(current)?;
        if let Some(level) = SectioningLevel::from_command(document.command_name(current)) {
            return Some(level);
        }
    }
}
