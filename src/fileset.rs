//! The set of parsed source files under a project root, and batched edits to it.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::document::{Document, NodeId};
use crate::error::Error;
use crate::references::{Classifier, Reference, ReferenceKind};

/// Maximum source file size (16 MiB).
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Index of a document inside its `FileSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(usize);

/// A replacement of one byte range in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    /// File path relative to the project root.
    pub file: PathBuf,
    /// Byte range replaced in the current contents.
    pub range: Range<usize>,
    /// New text for the range.
    pub replacement: String,
}

/// New contents of one file after a batch of edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// File path relative to the project root.
    pub file: PathBuf,
    /// Full text with every edit applied.
    pub contents: String,
}

/// Parsed documents of one project, in path order.
#[derive(Debug, Default)]
pub struct FileSet {
    /// Documents ordered by relative path.
    documents: Vec<Document>,
    /// Project root the document paths are relative to.
    root: PathBuf,
    /// Files that could not be loaded, with the reason.
    skipped: Vec<Error>,
}

impl FileSet {
    /// Load every source file under `root` that the config selects.
    ///
    /// Files that are too large or fail to parse are skipped with a warning
    /// and reported by [`FileSet::skipped`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a selected file cannot be read. Files that are
    /// not valid UTF-8 are skipped instead.
    pub fn load(root: &Path, config: &Config) -> Result<Self, Error> {
        let mut documents = Vec::new();
        let mut skipped = Vec::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| return e.file_type().is_file() && config.is_source_file(e.path()))
        {
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            if !config.should_scan(&relative.to_string_lossy()) {
                log::debug!("skipping {} (excluded by config)", relative.display());
                continue;
            }

            match load_document(path, relative) {
                Ok(document) => documents.push(document),
                Err(Error::Io(e)) if e.kind() != std::io::ErrorKind::InvalidData => return Err(Error::Io(e)),
                Err(error) => {
                    log::warn!("skipping file: {error}");
                    skipped.push(error);
                },
            }
        }

        log::debug!("loaded {} documents from {}", documents.len(), root.display());
        return Ok(Self::from_documents(root, documents).with_skipped(skipped));
    }

    /// Build a file set from already parsed documents.
    pub fn from_documents(root: impl Into<PathBuf>, mut documents: Vec<Document>) -> Self {
        documents.sort_by(|a, b| return a.path().cmp(b.path()));
        return Self {
            documents,
            root: root.into(),
            skipped: Vec::new(),
        };
    }

    /// Attach load failures to report later.
    fn with_skipped(mut self, skipped: Vec<Error>) -> Self {
        self.skipped = skipped;
        return self;
    }

    /// Every command occurrence across the file set, file by file.
    pub fn commands(&self) -> impl Iterator<Item = (FileId, NodeId)> + '_ {
        return self
            .documents()
            .flat_map(|(file, document)| return document.commands().map(move |id| return (file, id)));
    }

    /// The document with id `file`.
    pub fn document(&self, file: FileId) -> Option<&Document> {
        return self.documents.get(file.0);
    }

    /// All documents with their ids.
    pub fn documents(&self) -> impl Iterator<Item = (FileId, &Document)> {
        return self.documents.iter().enumerate().map(|(i, d)| return (FileId(i), d));
    }

    /// Id of the document loaded from `path` (relative to the root).
    pub fn find(&self, path: &Path) -> Option<FileId> {
        return self.documents.iter().position(|d| return d.path() == path).map(FileId);
    }

    /// Every label reference across the file set whose target is `name`.
    pub fn label_references(&self, classifier: &Classifier<'_>, name: &str) -> Vec<(FileId, Reference)> {
        let mut found = Vec::new();
        for (file, command) in self.commands() {
            let Some(document) = self.document(file) else {
                continue;
            };
            if !classifier.catalog().references.contains(document.command_name(command)) {
                continue;
            }
            found.extend(
                classifier
                    .classify(document, command)
                    .into_iter()
                    .filter(|r| return r.kind == ReferenceKind::Label && r.target == name)
                    .map(|r| return (file, r)),
            );
        }
        return found;
    }

    /// Files that could not be loaded.
    pub fn skipped(&self) -> &[Error] {
        return &self.skipped;
    }

    /// Apply `edits` to in-memory copies of the affected files.
    ///
    /// Nothing is applied unless every edit is valid, so a failed batch leaves
    /// no partial result behind.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if an edit names a file outside the set,
    /// `Error::EditOutOfBounds` if a range does not fit the file or splits a
    /// character, or `Error::EditOverlap` if two ranges of one file intersect.
    pub fn stage(&self, edits: &[TextEdit]) -> Result<Vec<StagedFile>, Error> {
        let mut by_file: BTreeMap<&Path, Vec<&TextEdit>> = BTreeMap::new();
        for edit in edits {
            by_file.entry(edit.file.as_path()).or_default().push(edit);
        }

        let mut staged = Vec::with_capacity(by_file.len());
        for (path, mut file_edits) in by_file {
            let document = self
                .find(path)
                .and_then(|id| return self.document(id))
                .ok_or_else(|| return Error::FileNotFound { path: path.to_path_buf() })?;
            let source = document.source();

            file_edits.sort_by_key(|e| return (e.range.start, e.range.end));
            validate_edits(path, source, &file_edits)?;

            // Descending order keeps earlier offsets valid.
            let mut contents = source.to_string();
            for edit in file_edits.iter().rev() {
                contents.replace_range(edit.range.clone(), &edit.replacement);
            }
            staged.push(StagedFile {
                file: path.to_path_buf(),
                contents,
            });
        }
        return Ok(staged);
    }

    /// Write staged contents back to disk under the project root.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a file cannot be written.
    pub fn commit(&self, staged: &[StagedFile]) -> Result<(), Error> {
        for file in staged {
            let path = self.root.join(&file.file);
            std::fs::write(&path, &file.contents)?;
            log::info!("updated {}", file.file.display());
        }
        return Ok(());
    }
}

/// Read and parse one source file, enforcing the size limit.
fn load_document(path: &Path, relative: PathBuf) -> Result<Document, Error> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_FILE_SIZE {
        return Err(Error::FileTooLarge {
            file: relative,
            max_bytes: MAX_FILE_SIZE,
            size_bytes: size,
        });
    }
    let source = std::fs::read_to_string(path)?;
    return Document::parse(relative, source);
}

/// Check sorted edits of one file against its source.
fn validate_edits(path: &Path, source: &str, edits: &[&TextEdit]) -> Result<(), Error> {
    let mut previous: Option<&Range<usize>> = None;
    for edit in edits {
        let range = &edit.range;
        let fits = range.start <= range.end
            && range.end <= source.len()
            && source.is_char_boundary(range.start)
            && source.is_char_boundary(range.end);
        if !fits {
            return Err(Error::EditOutOfBounds {
                len: source.len(),
                file: path.to_path_buf(),
                range: range.clone(),
            });
        }
        if let Some(first) = previous
            && range.start < first.end
        {
            return Err(Error::EditOverlap {
                file: path.to_path_buf(),
                first: first.clone(),
                second: range.clone(),
            });
        }
        previous = Some(range);
    }
    return Ok(());
}
