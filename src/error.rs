/// Crate-level error types for texref diagnostics.
use std::ops::Range;
use std::path::PathBuf;

/// All errors in texref carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the file, range, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-level error type re-exported as texref::Error")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A config file named on the command line does not exist.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// Two edits of one rename batch touch the same bytes.
    #[error("overlapping edits in {}: {}..{} and {}..{}", file.display(), first.start, first.end, second.start, second.end)]
    EditOverlap {
        /// File receiving the edits.
        file: PathBuf,
        /// Earlier edit range.
        first: Range<usize>,
        /// Later edit range that starts before `first` ends.
        second: Range<usize>,
    },

    /// An edit range does not fall inside the current file contents.
    #[error("edit out of bounds in {}: {}..{} (file is {len} bytes)", file.display(), range.start, range.end)]
    EditOutOfBounds {
        /// Length of the file contents in bytes.
        len: usize,
        /// File receiving the edit.
        file: PathBuf,
        /// Offending byte range.
        range: Range<usize>,
    },

    /// A referenced source file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Source file exceeds the size limit.
    #[error("file too large ({size_bytes} bytes, max {max_bytes}): {}", file.display())]
    FileTooLarge {
        /// File that exceeded the size limit.
        file: PathBuf,
        /// Maximum allowed file size in bytes.
        max_bytes: u64,
        /// Actual file size in bytes.
        size_bytes: u64,
    },

    /// A separator pattern from the config is not a valid regex.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as written in the config.
        pattern: String,
        /// The wrapped regex error.
        source: regex::Error,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON output could not be serialized.
    #[error("json: {0}")]
    Json(
        /// The wrapped serialization error.
        #[from]
        serde_json::Error,
    ),

    /// The document parser could not build a tree.
    #[error("parse failed: {}:{line}: {reason}", file.display())]
    ParseFailed {
        /// File that failed to parse.
        file: PathBuf,
        /// One-based line of the offending token.
        line: u32,
        /// Description of the parse failure.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The filesystem watcher could not be set up.
    #[error("watch: {reason}")]
    Watch {
        /// Description of the watcher failure.
        reason: String,
    },
}
