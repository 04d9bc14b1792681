//! Label convention checks and rename propagation.
//!
//! A label's expected name follows from its context (`sec:`, `fig:`, ...).
//! Renaming a label rewrites its own argument and every label reference to
//! it across the file set, returned as one plan for the host to apply.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::PathBuf;

use serde::Serialize;

use crate::context::{ConventionSettings, LabelContext, LabelOccurrence, context_of, label_occurrences};
use crate::fileset::{FileId, FileSet, TextEdit};
use crate::references::Classifier;
use crate::slug::canonical_name;

/// Message attached to every label that breaks the naming convention.
pub const UNCONVENTIONAL_LABEL: &str = "Unconventional label prefix";

/// Every edit needed to rename one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    /// Edits across the file set; the label's own edit comes first.
    pub edits: Vec<TextEdit>,
    /// Conventional name.
    pub new_name: String,
    /// Name as currently written.
    pub old_name: String,
}

/// A label whose name does not match its context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelDiagnostic {
    /// Context that decided the expected name.
    pub context: LabelContext,
    /// Conventional name.
    pub expected: String,
    /// File path relative to the project root.
    pub file: PathBuf,
    /// Name as currently written.
    pub label: String,
    /// One-based line of the anchor start.
    pub line: u32,
    /// Human readable summary.
    pub message: &'static str,
    /// Highlighted range: the labelling command, or the whole environment.
    pub range: Range<usize>,
}

/// One label with its context, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEntry {
    /// Conventional name in this context.
    pub canonical: String,
    /// Context of the label.
    pub context: LabelContext,
    /// File path relative to the project root.
    pub file: PathBuf,
    /// One-based line of the label.
    pub line: u32,
    /// Name as currently written.
    pub name: String,
}

/// A rename left out of a fix batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRename {
    /// Name that would have been written.
    pub new_name: String,
    /// Name as currently written.
    pub old_name: String,
    /// Why the rename was not applied.
    pub reason: String,
}

/// Renames that can be applied together, and the ones that cannot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixPlan {
    /// Plans safe to apply in one batch.
    pub renames: Vec<RenamePlan>,
    /// Plans withheld because applying them would merge labels.
    pub skipped: Vec<SkippedRename>,
}

impl FixPlan {
    /// Edits of every applicable rename.
    pub fn edits(&self) -> Vec<TextEdit> {
        return self.renames.iter().flat_map(|p| return p.edits.iter().cloned()).collect();
    }
}

/// Applies the label naming convention to a file set.
pub struct LabelConvention<'a> {
    /// Reference classification used to find label references.
    classifier: &'a Classifier<'a>,
    /// Documents under analysis.
    files: &'a FileSet,
    /// Convention settings.
    settings: ConventionSettings,
}

impl<'a> LabelConvention<'a> {
    /// Check labels of `files` with `settings`.
    pub const fn new(files: &'a FileSet, classifier: &'a Classifier<'a>, settings: ConventionSettings) -> Self {
        return Self {
            classifier,
            files,
            settings,
        };
    }

    /// Every label occurrence in the file set, file by file.
    pub fn occurrences(&self) -> Vec<(FileId, LabelOccurrence)> {
        return self
            .files
            .documents()
            .flat_map(|(file, document)| {
                return label_occurrences(document, self.classifier.catalog())
                    .into_iter()
                    .map(move |label| return (file, label));
            })
            .collect();
    }

    /// Context and conventional name of `label` in `file`.
    fn expected(&self, file: FileId, label: &LabelOccurrence) -> Option<(LabelContext, String)> {
        let document = self.files.document(file)?;
        let context = context_of(document, label, &self.settings);
        return Some((context, canonical_name(&context, &label.name)));
    }

    /// Plan renaming `label` to its conventional name.
    ///
    /// Returns `None` for labels without an enforced prefix and for labels
    /// that already follow the convention.
    pub fn propose_rename(&self, file: FileId, label: &LabelOccurrence) -> Option<RenamePlan> {
        let (context, new_name) = self.expected(file, label)?;
        if context == LabelContext::Other || new_name == label.name {
            return None;
        }
        let document = self.files.document(file)?;

        let mut edits = vec![TextEdit {
            file: document.path().to_path_buf(),
            range: label.name_range.clone(),
            replacement: label.replacement(&new_name),
        }];
        for (referring, reference) in self.files.label_references(self.classifier, &label.name) {
            let Some(referring) = self.files.document(referring) else {
                continue;
            };
            edits.push(TextEdit {
                file: referring.path().to_path_buf(),
                range: reference.range,
                replacement: new_name.clone(),
            });
        }

        return Some(RenamePlan {
            edits,
            new_name,
            old_name: label.name.clone(),
        });
    }

    /// Warn about `label` when its name does not match its context.
    pub fn diagnose(&self, file: FileId, label: &LabelOccurrence) -> Option<LabelDiagnostic> {
        let (context, expected) = self.expected(file, label)?;
        if context == LabelContext::Other || expected == label.name {
            return None;
        }
        let document = self.files.document(file)?;
        return Some(LabelDiagnostic {
            context,
            expected,
            file: document.path().to_path_buf(),
            label: label.name.clone(),
            line: document.line_of(label.anchor.start),
            message: UNCONVENTIONAL_LABEL,
            range: label.anchor.clone(),
        });
    }

    /// Diagnostics for every label in the file set.
    pub fn check(&self) -> Vec<LabelDiagnostic> {
        return self
            .occurrences()
            .iter()
            .filter_map(|(file, label)| return self.diagnose(*file, label))
            .collect();
    }

    /// Every label with its context and conventional name.
    pub fn labels(&self) -> Vec<LabelEntry> {
        let mut entries = Vec::new();
        for (file, label) in self.occurrences() {
            let (Some(document), Some((context, canonical))) = (self.files.document(file), self.expected(file, &label))
            else {
                continue;
            };
            entries.push(LabelEntry {
                canonical,
                context,
                file: document.path().to_path_buf(),
                line: document.line_of(label.anchor.start),
                name: label.name,
            });
        }
        return entries;
    }

    /// Rename plans for the whole file set, minus those that would merge labels.
    ///
    /// A rename is withheld when its label is defined more than once, when
    /// another label already has the new name, or when another rename in the
    /// batch produces the same new name.
    pub fn fix_plan(&self) -> FixPlan {
        let occurrences = self.occurrences();
        let mut defined: HashMap<&str, usize> = HashMap::new();
        for (_, label) in &occurrences {
            let count = defined.entry(label.name.as_str()).or_default();
            *count = count.saturating_add(1);
        }

        let candidates: Vec<RenamePlan> = occurrences
            .iter()
            .filter_map(|(file, label)| return self.propose_rename(*file, label))
            .collect();
        let mut targets: BTreeMap<&str, usize> = BTreeMap::new();
        for plan in &candidates {
            let count = targets.entry(plan.new_name.as_str()).or_default();
            *count = count.saturating_add(1);
        }

        let mut fix = FixPlan::default();
        for plan in &candidates {
            let reason = if defined.get(plan.old_name.as_str()).is_some_and(|n| return *n > 1) {
                Some("label is defined more than once")
            } else if defined.contains_key(plan.new_name.as_str()) {
                Some("a label with the new name already exists")
            } else if targets.get(plan.new_name.as_str()).is_some_and(|n| return *n > 1) {
                Some("another label would be renamed to the same name")
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    log::warn!("not renaming `{}` to `{}`: {reason}", plan.old_name, plan.new_name);
                    fix.skipped.push(SkippedRename {
                        new_name: plan.new_name.clone(),
                        old_name: plan.old_name.clone(),
                        reason: reason.to_string(),
                    });
                },
                None => fix.renames.push(plan.clone()),
            }
        }
        return fix;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::CommandCatalog;
    use crate::definitions::DefinitionIndex;
    use crate::document::Document;
    use crate::references::FileCommands;

    fn file_set(files: &[(&str, &str)]) -> FileSet {
        let documents = files.iter().map(|(p, s)| return Document::parse(*p, *s).unwrap()).collect();
        return FileSet::from_documents("/project", documents);
    }

    /// Run `f` with a convention over `set` using default settings.
    fn with_convention<T>(set: &FileSet, f: impl FnOnce(&LabelConvention<'_>) -> T) -> T {
        let catalog = CommandCatalog::default();
        let files = FileCommands::new(&catalog);
        let definitions = DefinitionIndex::build(set, &catalog);
        let classifier = Classifier::new(&catalog, &files, &definitions);
        let convention = LabelConvention::new(set, &classifier, ConventionSettings::default());
        return f(&convention);
    }

    fn apply(set: &FileSet, edits: &[TextEdit]) -> Vec<String> {
        return set.stage(edits).unwrap().into_iter().map(|s| return s.contents).collect();
    }

    #[test]
    fn section_label_rename_updates_references() {
        let set = file_set(&[("main.tex", "\\section{some section}\n\\label{some-section}\nsee \\ref{some-section}")]);
        let plan = with_convention(&set, |c| {
            let (file, label) = c.occurrences().remove(0);
            return c.propose_rename(file, &label).unwrap();
        });
        assert_eq!(plan.new_name, "sec:some-section");
        assert_eq!(plan.edits.len(), 2);
        assert_eq!(
            apply(&set, &plan.edits),
            vec!["\\section{some section}\n\\label{sec:some-section}\nsee \\ref{sec:some-section}".to_string()]
        );
    }

    #[test]
    fn conventional_labels_have_no_plan_or_warning() {
        let set = file_set(&[("main.tex", "\\section{A}\\label{sec:a}\\begin{figure}\\label{fig:b}\\end{figure}")]);
        with_convention(&set, |c| {
            assert!(c.check().is_empty());
            for (file, label) in c.occurrences() {
                assert!(c.propose_rename(file, &label).is_none());
            }
        });
    }

    #[test]
    fn other_context_is_never_renamed() {
        let set = file_set(&[("main.tex", "\\label{free form}")]);
        with_convention(&set, |c| {
            assert!(c.check().is_empty());
            assert!(c.fix_plan().renames.is_empty());
        });
    }

    #[test]
    fn diagnostic_anchors_on_label_command() {
        let set = file_set(&[("main.tex", "\\chapter{A}\n\\label{intro}")]);
        let diagnostics = with_convention(&set, |c| return c.check());
        assert_eq!(diagnostics.len(), 1);
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.message, UNCONVENTIONAL_LABEL);
        assert_eq!(diagnostic.expected, "ch:intro");
        assert_eq!(diagnostic.line, 2);
        let (_, document) = set.documents().next().unwrap();
        assert_eq!(document.text(&diagnostic.range), "\\label{intro}");
    }

    #[test]
    fn duplicate_labels_are_not_fixed() {
        let set = file_set(&[("main.tex", "\\section{A}\\label{x}\\section{B}\\label{x}")]);
        let fix = with_convention(&set, |c| return c.fix_plan());
        assert!(fix.renames.is_empty());
        assert_eq!(fix.skipped.len(), 2);
    }

    #[test]
    fn renames_onto_existing_labels_are_not_fixed() {
        let set = file_set(&[("main.tex", "\\label{sec:a}\\section{A}\\label{a}")]);
        let fix = with_convention(&set, |c| return c.fix_plan());
        assert!(fix.renames.is_empty());
        assert_eq!(fix.skipped[0].old_name, "a");
    }

    #[test]
    fn colliding_renames_are_not_fixed() {
        let set = file_set(&[("main.tex", "\\section{A}\\label{a b}\\section{B}\\label{a  b}")]);
        let fix = with_convention(&set, |c| return c.fix_plan());
        assert!(fix.renames.is_empty());
        assert_eq!(fix.skipped.len(), 2);
    }

    #[test]
    fn labels_lists_context_and_canonical_name() {
        let set = file_set(&[("main.tex", "\\begin{table}\\label{t}\\end{table}")]);
        let entries = with_convention(&set, |c| return c.labels());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].canonical, "tab:t");
        assert_eq!(entries[0].context.prefix(), Some("tab:"));
    }
}
