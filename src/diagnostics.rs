use std::fmt::Write as _;
use std::ops::Range;
use std::path::Path;

use crate::error::Error;
use crate::rename::{FixPlan, LabelDiagnostic};

/// ANSI bold for headings on stderr.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    print_markdown(&render_error(e));
}

/// Print a markdown block to stderr with bold headings.
pub fn print_markdown(md: &str) {
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::EditOverlap { file, first, second } => render_edit_overlap(file, first, second),
        Error::FileTooLarge {
            file,
            size_bytes,
            max_bytes,
        } => render_file_too_large(file, *size_bytes, *max_bytes),
        Error::InvalidPattern { pattern, source } => render_invalid_pattern(pattern, source),
        Error::ParseFailed { file, line, reason } => render_parse_failed(file, *line, reason),
        _ => render_generic(e),
    };
}

/// Errors that need no more than a heading and one paragraph.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::ConfigNotFound { path } => format!(
            "\
# Error: Config Not Found

`{}` does not exist.

## Fix

Check the `--config` path, or drop the flag to use `.texref.toml` in the root.
",
            path.display()
        ),

        Error::EditOutOfBounds { len, file, range } => format!(
            "\
# Error: Edit Out Of Bounds

Edit {}..{} does not fit `{}` ({len} bytes). The file changed since it was loaded.
",
            range.start,
            range.end,
            file.display()
        ),

        Error::FileNotFound { path } => format!(
            "\
# Error: File Not Found

`{}` does not exist.
",
            path.display()
        ),

        Error::Io(e) => format!(
            "\
# Error: I/O

{e}
"
        ),

        Error::TomlDe(e) => format!(
            "\
# Error: Invalid TOML

{e}

## Fix

Check `.texref.toml` against the keys `include`, `exclude`, `extensions`,
`minimum_section_level`, `parameter_separator` and the `[commands]` table.
"
        ),

        Error::Watch { reason } => format!(
            "\
# Error: Watch

{reason}
"
        ),

        _ => format!(
            "\
# Error

{e}
"
        ),
    };
}

/// Two edits of one batch touch the same bytes.
fn render_edit_overlap(file: &Path, first: &Range<usize>, second: &Range<usize>) -> String {
    return format!(
        "\
# Error: Overlapping Edits

Edits {}..{} and {}..{} in `{}` overlap. No file was changed.
",
        first.start,
        first.end,
        second.start,
        second.end,
        file.display()
    );
}

/// Source file over the size limit.
fn render_file_too_large(file: &Path, size_bytes: u64, max_bytes: u64) -> String {
    return format!(
        "\
# Error: File Too Large

`{}` is {size_bytes} bytes (max {max_bytes}).
",
        file.display()
    );
}

/// Bad `parameter_separator` regex.
fn render_invalid_pattern(pattern: &str, source: &regex::Error) -> String {
    return format!(
        "\
# Error: Invalid Pattern

`{pattern}` is not a valid regular expression:

    {source}

## Fix

Correct `parameter_separator` in `.texref.toml`, or remove it to split on `,`.
"
    );
}

/// Unbalanced markup.
fn render_parse_failed(file: &Path, line: u32, reason: &str) -> String {
    return format!(
        "\
# Error: Parse Failed

Could not parse `{}:{line}`: {reason}
",
        file.display()
    );
}

/// Render label convention warnings as one markdown block.
pub fn render_label_diagnostics(diagnostics: &[LabelDiagnostic]) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        let _ = writeln!(
            out,
            "{}:{}  {}: `{}` (expected `{}`)",
            diagnostic.file.display(),
            diagnostic.line,
            diagnostic.message,
            diagnostic.label,
            diagnostic.expected
        );
    }
    if !diagnostics.is_empty() {
        out.push_str("\n## Fix\n\n    texref fix\n");
    }
    return out;
}

/// Render a markdown summary of a fix batch.
pub fn render_fix_report(plan: &FixPlan, dry_run: bool) -> String {
    let mut out = String::new();
    if !plan.renames.is_empty() {
        out.push_str(if dry_run { "## Would rename\n\n" } else { "## Renamed\n\n" });
        for rename in &plan.renames {
            let references = rename.edits.len().saturating_sub(1);
            let _ = writeln!(
                out,
                "- `{}` -> `{}` ({references} references)",
                rename.old_name, rename.new_name
            );
            if dry_run {
                for edit in &rename.edits {
                    let _ = writeln!(
                        out,
                        "  - {} {}..{} -> `{}`",
                        edit.file.display(),
                        edit.range.start,
                        edit.range.end,
                        edit.replacement
                    );
                }
            }
        }
        out.push('\n');
    }

    if !plan.skipped.is_empty() {
        out.push_str("## Skipped\n\n");
        for skipped in &plan.skipped {
            let _ = writeln!(
                out,
                "- `{}` -> `{}`: {}",
                skipped.old_name, skipped.new_name, skipped.reason
            );
        }
        out.push('\n');
    }
    return out;
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::context::LabelContext;
    use crate::fileset::TextEdit;
    use crate::rename::{RenamePlan, SkippedRename, UNCONVENTIONAL_LABEL};

    #[test]
    fn parse_failure_names_file_and_line() {
        let md = render_error(&Error::ParseFailed {
            file: PathBuf::from("main.tex"),
            line: 3,
            reason: "unclosed `{`".to_string(),
        });
        assert!(md.starts_with("# Error: Parse Failed"));
        assert!(md.contains("`main.tex:3`"));
    }

    #[test]
    fn label_diagnostics_list_expected_name() {
        let md = render_label_diagnostics(&[LabelDiagnostic {
            context: LabelContext::Other,
            expected: "sec:a".to_string(),
            file: PathBuf::from("main.tex"),
            label: "a".to_string(),
            line: 2,
            message: UNCONVENTIONAL_LABEL,
            range: 0..9,
        }]);
        assert!(md.contains("main.tex:2  Unconventional label prefix: `a` (expected `sec:a`)"));
        assert!(md.contains("texref fix"));
    }

    #[test]
    fn fix_report_lists_renames_and_skips() {
        let plan = FixPlan {
            renames: vec![RenamePlan {
                edits: vec![TextEdit {
                    file: PathBuf::from("main.tex"),
                    range: 7..8,
                    replacement: "sec:a".to_string(),
                }],
                new_name: "sec:a".to_string(),
                old_name: "a".to_string(),
            }],
            skipped: vec![SkippedRename {
                new_name: "sec:b".to_string(),
                old_name: "b".to_string(),
                reason: "label is defined more than once".to_string(),
            }],
        };
        let md = render_fix_report(&plan, true);
        assert!(md.contains("## Would rename"));
        assert!(md.contains("- `a` -> `sec:a` (0 references)"));
        assert!(md.contains("main.tex 7..8 -> `sec:a`"));
        assert!(md.contains("- `b` -> `sec:b`: label is defined more than once"));
    }
}
