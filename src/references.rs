//! Reference classification: what a command occurrence points at.

use std::ops::Range;
use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::CommandCatalog;
use crate::document::{Argument, Document, NodeId};
use crate::params::extract_sub_parameter_ranges;

/// What a reference resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// The command names its own definition site.
    Definition,
    /// A file on disk.
    File,
    /// A label defined somewhere in the file set.
    Label,
    /// A web address.
    Url,
}

impl ReferenceKind {
    /// Lowercase name, as used in output.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::Definition => "definition",
            Self::File => "file",
            Self::Label => "label",
            Self::Url => "url",
        };
    }
}

/// One resolvable reference produced by a command occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// What the reference points at.
    pub kind: ReferenceKind,
    /// Absolute byte range of the referring text in the document.
    pub range: Range<usize>,
    /// Referenced name: sub-parameter text, or the command token for definitions.
    pub target: String,
}

/// Where a command or environment is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionSite {
    /// File containing the definition.
    pub file: PathBuf,
    /// One-based line of the defining command.
    pub line: u32,
    /// Absolute byte range of the defining command.
    pub range: Range<usize>,
}

/// Reports file references of commands that take file arguments.
pub trait FileArgumentResolver {
    /// File references of `command`, empty when it takes no file argument.
    fn file_references(&self, document: &Document, command: NodeId) -> Vec<Reference>;
}

/// Locates definition sites for the command at a given node.
pub trait DefinitionResolver {
    /// Every definition the command could resolve to.
    fn definitions(&self, document: &Document, command: NodeId) -> Vec<DefinitionSite>;
}

/// File resolver driven by the catalog's file-including commands.
pub struct FileCommands<'a> {
    /// Source of the command set and separator.
    catalog: &'a CommandCatalog,
}

impl<'a> FileCommands<'a> {
    /// Resolve file arguments of the commands listed in `catalog`.
    pub const fn new(catalog: &'a CommandCatalog) -> Self {
        return Self { catalog };
    }
}

impl FileArgumentResolver for FileCommands<'_> {
    fn file_references(&self, document: &Document, command: NodeId) -> Vec<Reference> {
        if !self.catalog.files.contains(document.command_name(command)) {
            return Vec::new();
        }
        let Some(argument) = document.command(command).and_then(|c| return c.first_required_argument()) else {
            return Vec::new();
        };
        return sub_parameter_references(document, argument, self.catalog, ReferenceKind::File);
    }
}

/// Classifies command occurrences into references.
pub struct Classifier<'a> {
    /// Command sets and separator.
    catalog: &'a CommandCatalog,
    /// Definition lookup for rule 4.
    definitions: &'a dyn DefinitionResolver,
    /// File argument lookup for rule 2.
    files: &'a dyn FileArgumentResolver,
}

impl<'a> Classifier<'a> {
    /// Build a classifier over the given collaborators.
    pub fn new(
        catalog: &'a CommandCatalog,
        files: &'a dyn FileArgumentResolver,
        definitions: &'a dyn DefinitionResolver,
    ) -> Self {
        return Self {
            catalog,
            definitions,
            files,
        };
    }

    /// The catalog this classifier reads.
    pub const fn catalog(&self) -> &'a CommandCatalog {
        return self.catalog;
    }

    /// References of the command at `command`, all of one kind.
    ///
    /// Rules are tried in order and the first match wins: label references,
    /// file references, URLs, then the command's own definition. A definition
    /// reference is only produced when it resolves to at least one site.
    pub fn classify(&self, document: &Document, command: NodeId) -> Vec<Reference> {
        let Some(parsed) = document.command(command) else {
            return Vec::new();
        };
        let name = document.command_name(command);
        let first = parsed.first_required_argument();

        if let Some(argument) = first
            && self.catalog.references.contains(name)
        {
            return sub_parameter_references(document, argument, self.catalog, ReferenceKind::Label);
        }

        if first.is_some() {
            let files = self.files.file_references(document, command);
            if !files.is_empty() {
                return files;
            }
        }

        if let Some(argument) = first
            && self.catalog.urls.contains(name)
        {
            return sub_parameter_references(document, argument, self.catalog, ReferenceKind::Url);
        }

        if self.definitions.definitions(document, command).is_empty() {
            return Vec::new();
        }
        return vec![Reference {
            kind: ReferenceKind::Definition,
            range: parsed.name.clone(),
            target: name.to_string(),
        }];
    }
}

/// One reference of `kind` per separated value of `argument`.
fn sub_parameter_references(
    document: &Document,
    argument: &Argument,
    catalog: &CommandCatalog,
    kind: ReferenceKind,
) -> Vec<Reference> {
    return extract_sub_parameter_ranges(document, argument, &catalog.parameter_separator)
        .into_iter()
        .map(|range| {
            return Reference {
                kind,
                target: document.text(&range).to_string(),
                range,
            };
        })
        .collect();
}
