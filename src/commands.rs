//! Core CLI commands for texref: check, fix, labels, refs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;

use crate::catalog::CommandCatalog;
use crate::config::Config;
use crate::definitions::DefinitionIndex;
use crate::diagnostics;
use crate::error::Error;
use crate::fileset::FileSet;
use crate::references::{Classifier, FileCommands, ReferenceKind};
use crate::rename::LabelConvention;

/// Exit code when labels break the convention.
const EXIT_UNCONVENTIONAL: u8 = 1;

/// Output format of the listing commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Pretty-printed JSON on stdout.
    Json,
    /// One line per item on stdout.
    #[default]
    Text,
}

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Options {
    /// Explicit config file; `None` reads `.texref.toml` in the root.
    pub config: Option<PathBuf>,
    /// Output format.
    pub format: Format,
    /// Project root.
    pub root: PathBuf,
}

impl Options {
    /// Load the config these options point at.
    ///
    /// # Errors
    ///
    /// Returns config loading errors.
    pub fn load_config(&self) -> Result<Config, Error> {
        return match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(&self.root),
        };
    }
}

/// Everything a command needs, loaded once per run.
struct Project {
    /// Command sets built from the config.
    catalog: CommandCatalog,
    /// Project configuration.
    config: Config,
    /// Parsed sources.
    files: FileSet,
}

impl Project {
    /// Load config, catalog and sources.
    ///
    /// # Errors
    ///
    /// Returns config, pattern, or I/O errors. Files that fail to parse are
    /// reported on stderr and left out.
    fn load(options: &Options) -> Result<Self, Error> {
        let config = options.load_config()?;
        let catalog = config.catalog()?;
        let files = FileSet::load(&options.root, &config)?;
        for skipped in files.skipped() {
            diagnostics::print_error(skipped);
        }
        return Ok(Self {
            catalog,
            config,
            files,
        });
    }

    /// Run `f` against a label convention over this project.
    fn with_convention<T>(&self, f: impl FnOnce(&LabelConvention<'_>) -> T) -> T {
        let files = FileCommands::new(&self.catalog);
        let definitions = DefinitionIndex::build(&self.files, &self.catalog);
        let classifier = Classifier::new(&self.catalog, &files, &definitions);
        let convention = LabelConvention::new(&self.files, &classifier, self.config.settings());
        return f(&convention);
    }
}

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    return Ok(());
}

/// Report every label that breaks the naming convention.
/// Exits 1 when any label does, 0 otherwise.
///
/// # Errors
///
/// Returns errors from config loading or scanning.
pub fn check(options: &Options) -> Result<ExitCode, Error> {
    let project = Project::load(options)?;
    let (diagnostics, count) = project.with_convention(|c| return (c.check(), c.occurrences().len()));

    match options.format {
        Format::Json => print_json(&diagnostics)?,
        Format::Text => print!("{}", diagnostics::render_label_diagnostics(&diagnostics)),
    }

    if diagnostics.is_empty() {
        eprintln!("All {count} labels follow the convention");
        return Ok(ExitCode::SUCCESS);
    }
    eprintln!("{} unconventional labels", diagnostics.len());
    return Ok(ExitCode::from(EXIT_UNCONVENTIONAL));
}

/// Rename every unconventional label and its references.
///
/// All edits are validated before anything is written; with `dry_run` the
/// edits are only reported. Exits with 1 when some renames were withheld,
/// since those labels still break the convention.
///
/// # Errors
///
/// Returns errors from config loading, scanning, edit validation, or file I/O.
pub fn fix(options: &Options, dry_run: bool) -> Result<ExitCode, Error> {
    let project = Project::load(options)?;
    let plan = project.with_convention(|c| return c.fix_plan());

    if plan.renames.is_empty() && plan.skipped.is_empty() && options.format == Format::Text {
        eprintln!("All labels follow the convention, nothing to fix.");
        return Ok(ExitCode::SUCCESS);
    }

    let staged = project.files.stage(&plan.edits())?;
    if dry_run {
        log::debug!("dry run: {} files would change", staged.len());
    } else {
        project.files.commit(&staged)?;
    }

    match options.format {
        Format::Json => print_json(&plan)?,
        Format::Text => diagnostics::print_markdown(&diagnostics::render_fix_report(&plan, dry_run)),
    }
    if !plan.skipped.is_empty() {
        return Ok(ExitCode::from(EXIT_UNCONVENTIONAL));
    }
    return Ok(ExitCode::SUCCESS);
}

/// List every label with its context and conventional name.
///
/// # Errors
///
/// Returns errors from config loading or scanning.
pub fn labels(options: &Options) -> Result<ExitCode, Error> {
    let project = Project::load(options)?;
    let entries = project.with_convention(|c| return c.labels());

    match options.format {
        Format::Json => print_json(&entries)?,
        Format::Text => {
            for entry in &entries {
                println!(
                    "{}:{}  {}  [{}]  -> {}",
                    entry.file.display(),
                    entry.line,
                    entry.name,
                    entry.context,
                    entry.canonical
                );
            }
        },
    }
    return Ok(ExitCode::SUCCESS);
}

/// One classified reference, for listing.
#[derive(Debug, Serialize)]
struct ReferenceEntry<'a> {
    /// File path relative to the project root.
    file: &'a Path,
    /// What the reference points at.
    kind: ReferenceKind,
    /// One-based line of the reference.
    line: u32,
    /// Referenced name.
    target: String,
}

/// List every reference in the project, optionally only of one kind.
///
/// # Errors
///
/// Returns errors from config loading or scanning.
pub fn refs(options: &Options, kind: Option<ReferenceKind>) -> Result<ExitCode, Error> {
    let project = Project::load(options)?;
    let files = FileCommands::new(&project.catalog);
    let definitions = DefinitionIndex::build(&project.files, &project.catalog);
    let classifier = Classifier::new(&project.catalog, &files, &definitions);

    let mut entries = Vec::new();
    for (file, command) in project.files.commands() {
        let Some(document) = project.files.document(file) else {
            continue;
        };
        for reference in classifier.classify(document, command) {
            if kind.is_some_and(|k| return k != reference.kind) {
                continue;
            }
            entries.push(ReferenceEntry {
                file: document.path(),
                kind: reference.kind,
                line: document.line_of(reference.range.start),
                target: reference.target,
            });
        }
    }

    match options.format {
        Format::Json => print_json(&entries)?,
        Format::Text => {
            for entry in &entries {
                println!(
                    "{}:{}  {}  {}",
                    entry.file.display(),
                    entry.line,
                    entry.kind.as_str(),
                    entry.target
                );
            }
        },
    }
    return Ok(ExitCode::SUCCESS);
}
