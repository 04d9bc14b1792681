//! Command and environment name sets that drive classification.
//!
//! The catalog is a plain value: built from defaults, optionally extended by
//! the `[commands]` table of `.texref.toml`, then borrowed by every analysis.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Commands whose first required argument names one or more labels.
const REFERENCE_COMMANDS: &[&str] = &[
    "\\ref", "\\eqref", "\\pageref", "\\autoref", "\\nameref", "\\vref", "\\Vref", "\\fref",
    "\\Fref", "\\cref", "\\Cref", "\\cpageref", "\\Cpageref", "\\labelcref", "\\namecref",
    "\\nameCref",
];

/// Commands that define a label.
const LABEL_COMMANDS: &[&str] = &["\\label"];

/// Commands whose first required argument is a URL.
const URL_COMMANDS: &[&str] = &["\\url", "\\href"];

/// Commands whose first required argument names one or more files.
const FILE_COMMANDS: &[&str] = &[
    "\\input", "\\include", "\\includeonly", "\\subfile", "\\includegraphics",
    "\\bibliography", "\\addbibresource", "\\lstinputlisting", "\\inputminted",
];

/// Commands whose first required argument is the macro they define.
const MACRO_DEFINITIONS: &[&str] = &[
    "\\newcommand", "\\renewcommand", "\\providecommand", "\\DeclareMathOperator",
    "\\DeclareRobustCommand", "\\NewDocumentCommand", "\\RenewDocumentCommand",
];

/// Commands whose first required argument is the environment they define.
const ENVIRONMENT_DEFINITIONS: &[&str] = &[
    "\\newenvironment", "\\renewenvironment", "\\NewDocumentEnvironment",
    "\\RenewDocumentEnvironment",
];

/// Environments whose body is raw text up to the matching `\end`.
const VERBATIM_ENVIRONMENTS: &[&str] = &["verbatim", "verbatim*", "Verbatim", "lstlisting", "minted", "comment"];

/// Separator used to split multi-valued arguments when the config sets none.
pub const DEFAULT_PARAMETER_SEPARATOR: &str = ",";

/// Sectioning commands ordered from the outermost to the innermost unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectioningLevel {
    /// `\part`
    Part,
    /// `\chapter`
    Chapter,
    /// `\section`
    Section,
    /// `\subsection`
    Subsection,
    /// `\subsubsection`
    Subsubsection,
    /// `\paragraph`
    Paragraph,
    /// `\subparagraph`
    Subparagraph,
}

impl SectioningLevel {
    /// Every level, outermost first.
    pub const ALL: [Self; 7] = [
        Self::Part,
        Self::Chapter,
        Self::Section,
        Self::Subsection,
        Self::Subsubsection,
        Self::Paragraph,
        Self::Subparagraph,
    ];

    /// Look up the level of a sectioning command token; starred forms count too.
    pub fn from_command(name: &str) -> Option<Self> {
        let bare = name.strip_suffix('*').unwrap_or(name);
        return Self::ALL.into_iter().find(|level| return level.command() == bare);
    }

    /// The command token that opens a unit of this level.
    pub const fn command(self) -> &'static str {
        return match self {
            Self::Part => "\\part",
            Self::Chapter => "\\chapter",
            Self::Section => "\\section",
            Self::Subsection => "\\subsection",
            Self::Subsubsection => "\\subsubsection",
            Self::Paragraph => "\\paragraph",
            Self::Subparagraph => "\\subparagraph",
        };
    }

    /// Label prefix expected for labels in a unit of this level.
    pub const fn prefix(self) -> &'static str {
        return match self {
            Self::Part => "part:",
            Self::Chapter => "ch:",
            Self::Section => "sec:",
            Self::Subsection => "subsec:",
            Self::Subsubsection => "subsubsec:",
            Self::Paragraph => "par:",
            Self::Subparagraph => "subpar:",
        };
    }
}

/// The kind of labelled block a float-like environment declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatKind {
    /// `algorithm`
    Algorithm,
    /// `equation`, `align` and friends.
    Equation,
    /// `figure`, `subfigure`, `wrapfigure`
    Figure,
    /// `lstlisting`, `listing`, `minted`
    Listing,
    /// `table`, `subtable`, `longtable`
    Table,
}

impl FloatKind {
    /// Map an environment name to the float kind it declares.
    pub fn from_environment(name: &str) -> Option<Self> {
        let bare = name.strip_suffix('*').unwrap_or(name);
        return match bare {
            "figure" | "subfigure" | "wrapfigure" => Some(Self::Figure),
            "table" | "subtable" | "longtable" => Some(Self::Table),
            "lstlisting" | "listing" | "minted" => Some(Self::Listing),
            "algorithm" => Some(Self::Algorithm),
            "equation" | "align" | "gather" | "multline" | "eqnarray" => Some(Self::Equation),
            _ => None,
        };
    }

    /// Lowercase name of the kind.
    pub const fn name(self) -> &'static str {
        return match self {
            Self::Algorithm => "algorithm",
            Self::Equation => "equation",
            Self::Figure => "figure",
            Self::Listing => "listing",
            Self::Table => "table",
        };
    }

    /// Label prefix expected for labels inside this kind of block.
    pub const fn prefix(self) -> &'static str {
        return match self {
            Self::Algorithm => "alg:",
            Self::Equation => "eq:",
            Self::Figure => "fig:",
            Self::Listing => "lst:",
            Self::Table => "tab:",
        };
    }
}

/// Extra command names supplied by the `[commands]` config table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandExtensions {
    /// Additional file-including commands.
    #[serde(default)]
    pub file: Vec<String>,
    /// Additional label-defining commands.
    #[serde(default)]
    pub label: Vec<String>,
    /// Additional label-reference commands.
    #[serde(default)]
    pub reference: Vec<String>,
    /// Additional URL commands.
    #[serde(default)]
    pub url: Vec<String>,
}

/// Name sets consulted by the parser, the classifier and the label engine.
#[derive(Debug, Clone)]
pub struct CommandCatalog {
    /// Environment-defining commands.
    pub environment_definitions: HashSet<String>,
    /// File-including commands.
    pub files: HashSet<String>,
    /// Label-defining commands.
    pub labels: HashSet<String>,
    /// Macro-defining commands.
    pub macro_definitions: HashSet<String>,
    /// Splits multi-valued required arguments into sub-parameters.
    pub parameter_separator: Regex,
    /// Label-reference commands.
    pub references: HashSet<String>,
    /// URL commands.
    pub urls: HashSet<String>,
}

impl Default for CommandCatalog {
    fn default() -> Self {
        return Self {
            environment_definitions: owned(ENVIRONMENT_DEFINITIONS),
            files: owned(FILE_COMMANDS),
            labels: owned(LABEL_COMMANDS),
            macro_definitions: owned(MACRO_DEFINITIONS),
            parameter_separator: default_separator(),
            references: owned(REFERENCE_COMMANDS),
            urls: owned(URL_COMMANDS),
        };
    }
}

impl CommandCatalog {
    /// Build a catalog from the defaults plus configured extensions.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if `separator` is not a valid regex.
    pub fn with_extensions(extensions: &CommandExtensions, separator: Option<&str>) -> Result<Self, Error> {
        let mut catalog = Self::default();
        catalog.files.extend(extensions.file.iter().map(|c| return command_token(c)));
        catalog.labels.extend(extensions.label.iter().map(|c| return command_token(c)));
        catalog.references.extend(extensions.reference.iter().map(|c| return command_token(c)));
        catalog.urls.extend(extensions.url.iter().map(|c| return command_token(c)));

        if let Some(pattern) = separator {
            catalog.parameter_separator = Regex::new(pattern).map_err(|source| {
                return Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                };
            })?;
        }
        return Ok(catalog);
    }

    /// Whether the body of environment `name` is raw text.
    pub fn is_verbatim_environment(name: &str) -> bool {
        return VERBATIM_ENVIRONMENTS.contains(&name);
    }

    /// Whether labels of environment `name` are given as a `label=` option.
    pub fn takes_label_option(name: &str) -> bool {
        return name == "lstlisting";
    }
}

/// Normalize a configured command name to its token form with a backslash.
fn command_token(name: &str) -> String {
    if name.starts_with('\\') {
        return name.to_string();
    }
    return format!("\\{name}");
}

/// Collect a static name list into an owned set.
fn owned(names: &[&str]) -> HashSet<String> {
    return names.iter().map(|n| return (*n).to_string()).collect();
}

/// The bare-comma separator.
#[allow(clippy::expect_used, reason = "literal pattern is a compile-time invariant")]
fn default_separator() -> Regex {
    return Regex::new(DEFAULT_PARAMETER_SEPARATOR).expect("valid separator regex");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sectioning_levels_are_ordered_outermost_first() {
        assert!(SectioningLevel::Part < SectioningLevel::Chapter);
        assert!(SectioningLevel::Section < SectioningLevel::Subsection);
        assert!(SectioningLevel::Paragraph < SectioningLevel::Subparagraph);
    }

    #[test]
    fn starred_sections_keep_their_level() {
        assert_eq!(SectioningLevel::from_command("\\section*"), Some(SectioningLevel::Section));
        assert_eq!(SectioningLevel::from_command("\\label"), None);
    }

    #[test]
    fn extensions_accept_names_without_backslash() {
        let extensions = CommandExtensions {
            reference: vec!["myref".to_string(), "\\otherref".to_string()],
            ..CommandExtensions::default()
        };
        let catalog = CommandCatalog::with_extensions(&extensions, None).unwrap();
        assert!(catalog.references.contains("\\myref"));
        assert!(catalog.references.contains("\\otherref"));
        assert!(catalog.references.contains("\\cref"));
    }

    #[test]
    fn invalid_separator_is_reported() {
        let result = CommandCatalog::with_extensions(&CommandExtensions::default(), Some("("));
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }
}
