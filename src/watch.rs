//! File watcher: runs `check` on startup, then re-runs on source changes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::commands::{self, Options};
use crate::config::{CONFIG_FILE, Config};
use crate::diagnostics;
use crate::error::Error;

/// Debounce delay between filesystem events and re-check.
const DEBOUNCE_MS: u64 = 100;

/// Exit code reported when a re-check itself fails.
const EXIT_ERROR: u8 = 2;

/// Decides which changed paths warrant a re-check.
///
/// Holds the config the source filter reads and reloads it whenever the
/// config file itself changes.
struct RelevanceFilter {
    /// Config whose extensions and include/exclude lists apply.
    config: Config,
    /// Where the config is loaded from.
    options: Options,
}

impl RelevanceFilter {
    /// Whether any of `paths` can affect the result of `check`.
    ///
    /// A changed config is reloaded first, so a new extension list applies
    /// to the same batch of events. A config that fails to load keeps the
    /// previous one.
    fn accepts(&mut self, paths: &[PathBuf]) -> bool {
        let config_changed = paths.iter().any(|p| return self.is_config(p));
        if config_changed {
            match self.options.load_config() {
                Ok(config) => self.config = config,
                Err(e) => log::warn!("keeping previous config: {e}"),
            }
            return true;
        }
        return paths.iter().any(|p| return self.is_scanned_source(p));
    }

    /// Whether `path` is a source file the current config would scan.
    fn is_scanned_source(&self, path: &Path) -> bool {
        return self.config.is_source_file(path)
            && path
                .strip_prefix(&self.options.root)
                .ok()
                .is_none_or(|relative| return self.config.should_scan(&relative.to_string_lossy()));
    }

    /// Whether `path` is the config file being watched.
    fn is_config(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        return match &self.options.config {
            Some(explicit) => explicit.file_name() == Some(name),
            None => name == CONFIG_FILE,
        };
    }
}

/// Create a filesystem watcher that sends events on the given channel.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<()>,
    mut filter: RelevanceFilter,
) -> Result<notify::RecommendedWatcher, Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
            )
            && filter.accepts(&event.paths)
        {
            let _ = tx.send(());
        }
    })
    .map_err(|e| {
        return Error::Watch {
            reason: format!("watcher setup failed: {e}"),
        };
    });
}

/// Entry point for the watch command.
///
/// Runs an initial check, then watches the project root and re-checks on
/// changes to source files or the config. Each check loads a fresh snapshot.
///
/// # Errors
///
/// Returns errors from config loading or watcher setup.
pub fn run(options: &Options) -> Result<ExitCode, Error> {
    eprintln!("watch: initial check");
    let mut last_code = run_check(options);

    let filter = RelevanceFilter {
        config: options.load_config()?,
        options: options.clone(),
    };
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx, filter)?;
    watcher
        .watch(&options.root, RecursiveMode::Recursive)
        .map_err(|e| {
            return Error::Watch {
                reason: format!("cannot watch {}: {e}", options.root.display()),
            };
        })?;

    eprintln!("watch: monitoring {}, press Ctrl+C to stop", options.root.display());

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}
        eprintln!("watch: change detected, re-checking...");
        last_code = run_check(options);
    }

    return Ok(last_code);
}

/// Run check once and print result. Returns the exit code from check.
fn run_check(options: &Options) -> ExitCode {
    return match commands::check(options) {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_ERROR)
        },
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::commands::Format;

    fn filter(root: &Path) -> RelevanceFilter {
        return RelevanceFilter {
            config: Config::default(),
            options: Options {
                config: None,
                format: Format::Text,
                root: root.to_path_buf(),
            },
        };
    }

    #[test]
    fn only_sources_and_config_trigger_rechecks() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = filter(dir.path());
        assert!(filter.accepts(&[dir.path().join("chapters/intro.tex")]));
        assert!(filter.accepts(&[dir.path().join(CONFIG_FILE)]));
        assert!(!filter.accepts(&[dir.path().join("main.pdf")]));
        assert!(!filter.accepts(&[dir.path().join("main.aux")]));
    }

    #[test]
    fn config_changes_reload_the_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = filter(dir.path());
        let notes = dir.path().join("notes.sty");
        assert!(!filter.accepts(std::slice::from_ref(&notes)));

        std::fs::write(dir.path().join(CONFIG_FILE), "extensions = [\"sty\"]\nexclude = [\"build/\"]\n").unwrap();
        assert!(filter.accepts(&[dir.path().join(CONFIG_FILE)]));
        assert!(filter.accepts(std::slice::from_ref(&notes)));
        assert!(!filter.accepts(&[dir.path().join("main.tex")]));
        assert!(!filter.accepts(&[dir.path().join("build/out.sty")]));
    }

    #[test]
    fn broken_config_keeps_the_previous_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = filter(dir.path());
        std::fs::write(dir.path().join(CONFIG_FILE), "extensions = 3\n").unwrap();
        assert!(filter.accepts(&[dir.path().join(CONFIG_FILE)]));
        assert!(filter.accepts(&[dir.path().join("main.tex")]));
    }
}
