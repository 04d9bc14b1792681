//! Index of user macro and environment definitions across a file set.

use std::collections::HashMap;

use crate::catalog::CommandCatalog;
use crate::document::{Document, NodeId};
use crate::fileset::FileSet;
use crate::params::parse_required_parameters;
use crate::references::{DefinitionResolver, DefinitionSite};

/// Definition sites keyed by the macro token or environment name they define.
#[derive(Debug, Clone, Default)]
pub struct DefinitionIndex {
    /// `\newenvironment{name}` and friends, keyed by `name`.
    environments: HashMap<String, Vec<DefinitionSite>>,
    /// `\newcommand{\name}` and friends, keyed by `\name`.
    macros: HashMap<String, Vec<DefinitionSite>>,
}

impl DefinitionIndex {
    /// Collect every definition in `files`.
    pub fn build(files: &FileSet, catalog: &CommandCatalog) -> Self {
        let mut index = Self::default();
        for (_, document) in files.documents() {
            index.add_document(document, catalog);
        }
        log::debug!(
            "indexed {} macro and {} environment definitions",
            index.macros.len(),
            index.environments.len()
        );
        return index;
    }

    /// Collect the definitions of one document.
    pub fn add_document(&mut self, document: &Document, catalog: &CommandCatalog) {
        for id in document.commands() {
            let name = document.command_name(id);
            let table = if catalog.macro_definitions.contains(name) {
                &mut self.macros
            } else if catalog.environment_definitions.contains(name) {
                &mut self.environments
            } else {
                continue;
            };
            let Some(defined) = first_required_text(document, id) else {
                continue;
            };
            let range = document.node(id).range.clone();
            table.entry(defined.trim().to_string()).or_default().push(DefinitionSite {
                file: document.path().to_path_buf(),
                line: document.line_of(range.start),
                range,
            });
        }
    }

    /// Definition sites of an environment name.
    pub fn environment(&self, name: &str) -> &[DefinitionSite] {
        return self.environments.get(name).map_or(&[], Vec::as_slice);
    }

    /// Definition sites of a macro token such as `\foo`.
    pub fn macro_definition(&self, token: &str) -> &[DefinitionSite] {
        return self.macros.get(token).map_or(&[], Vec::as_slice);
    }
}

impl DefinitionResolver for DefinitionIndex {
    fn definitions(&self, document: &Document, command: NodeId) -> Vec<DefinitionSite> {
        let name = document.command_name(command);
        let sites = if name == "\\begin" || name == "\\end" {
            first_required_text(document, command).map_or(&[][..], |env| return self.environment(env.trim()))
        } else {
            self.macro_definition(name)
        };
        return sites.to_vec();
    }
}

/// Text of the first required argument of `command`, if non-empty.
fn first_required_text(document: &Document, command: NodeId) -> Option<String> {
    let first = document.command(command)?.first_required_argument()?;
    let text = parse_required_parameters(document, [first]).pop()?;
    if text.trim().is_empty() {
        return None;
    }
    return Some(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(source: &str) -> (Document, DefinitionIndex) {
        let doc = Document::parse("defs.tex", source).unwrap();
        let mut index = DefinitionIndex::default();
        index.add_document(&doc, &CommandCatalog::default());
        return (doc, index);
    }

    fn command_named(doc: &Document, name: &str) -> NodeId {
        return doc.commands().find(|c| return doc.command_name(*c) == name).unwrap();
    }

    #[test]
    fn macro_definitions_are_keyed_by_token() {
        let (doc, index) = index("\\newcommand{\\R}{\\mathbb{R}}\n\\R");
        let sites = index.macro_definition("\\R");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].line, 1);
        assert_eq!(doc.text(&sites[0].range), "\\newcommand{\\R}{\\mathbb{R}}");
    }

    #[test]
    fn begin_and_end_resolve_through_environment_name() {
        let (doc, index) = index("\\newenvironment{proof}{}{}\n\\begin{proof}x\\end{proof}");
        let begin = command_named(&doc, "\\begin");
        let end = command_named(&doc, "\\end");
        assert_eq!(index.definitions(&doc, begin).len(), 1);
        assert_eq!(index.definitions(&doc, end).len(), 1);
        assert_eq!(index.definitions(&doc, begin)[0].line, 1);
    }

    #[test]
    fn redefinitions_are_all_kept() {
        let (_, index) = index("\\newcommand{\\x}{a}\n\\renewcommand{\\x}{b}");
        assert_eq!(index.macro_definition("\\x").len(), 2);
    }

    #[test]
    fn unknown_commands_have_no_definitions() {
        let (doc, index) = index("\\begin{itemize}\\end{itemize} \\emph{x}");
        for id in doc.commands() {
            assert!(index.definitions(&doc, id).is_empty());
        }
    }
}
