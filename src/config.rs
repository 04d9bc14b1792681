use std::path::{Path, PathBuf};

use crate::catalog::{CommandCatalog, CommandExtensions, SectioningLevel};
use crate::context::ConventionSettings;
use crate::error::Error;

/// Name of the project configuration file looked up in the root directory.
pub const CONFIG_FILE: &str = ".texref.toml";

/// Project configuration loaded from `.texref.toml`.
/// Include/exclude patterns are path prefixes applied to source files.
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog extensions from the `[commands]` table.
    commands: CommandExtensions,
    /// Path prefixes skipped even when included.
    exclude: Vec<String>,
    /// File extensions treated as sources, without the dot.
    extensions: Vec<String>,
    /// Path prefixes to scan; empty scans everything.
    include: Vec<String>,
    /// Deepest sectioning level whose labels are checked.
    minimum_section_level: SectioningLevel,
    /// Regex splitting multi-valued arguments; `None` keeps the bare comma.
    parameter_separator: Option<String>,
}

/// Raw TOML structure for `.texref.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TexrefTomlConfig {
    /// `[commands]` table.
    #[serde(default)]
    commands: CommandExtensions,
    /// `exclude = [...]`
    #[serde(default)]
    exclude: Vec<String>,
    /// `extensions = [...]`
    extensions: Option<Vec<String>>,
    /// `include = [...]`
    #[serde(default)]
    include: Vec<String>,
    /// `minimum_section_level = "..."`
    minimum_section_level: Option<SectioningLevel>,
    /// `parameter_separator = "..."`
    parameter_separator: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            commands: CommandExtensions::default(),
            exclude: Vec::new(),
            extensions: default_extensions(),
            include: Vec::new(),
            minimum_section_level: ConventionSettings::default().minimum_section_level,
            parameter_separator: None,
        };
    }
}

impl Config {
    /// Load config from `.texref.toml` in the given root directory.
    /// Returns a default that scans everything if the file doesn't exist.
    /// A file that exists but is malformed is an error, never a silent default.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no {CONFIG_FILE} in {}, using defaults", root.display());
                return Ok(Self::default());
            },
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Load config from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if `path` does not exist, `Error::Io`
    /// if it cannot be read, or `Error::TomlDe` if the TOML is malformed.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound {
                    path: PathBuf::from(path),
                });
            },
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: TexrefTomlConfig = toml::from_str(content)?;
        let defaults = Self::default();
        return Ok(Self {
            commands: raw.commands,
            exclude: raw.exclude,
            extensions: raw.extensions.unwrap_or(defaults.extensions),
            include: raw.include,
            minimum_section_level: raw.minimum_section_level.unwrap_or(defaults.minimum_section_level),
            parameter_separator: raw.parameter_separator,
        });
    }

    /// Build the command catalog this config describes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if `parameter_separator` is not a valid regex.
    pub fn catalog(&self) -> Result<CommandCatalog, Error> {
        return CommandCatalog::with_extensions(&self.commands, self.parameter_separator.as_deref());
    }

    /// Label convention settings.
    pub const fn settings(&self) -> ConventionSettings {
        return ConventionSettings {
            minimum_section_level: self.minimum_section_level,
        };
    }

    /// Whether a file with this path has a source extension.
    pub fn is_source_file(&self, path: &Path) -> bool {
        return path
            .extension()
            .and_then(|ext| return ext.to_str())
            .is_some_and(|ext| return self.extensions.iter().any(|e| return e == ext));
    }

    /// Check whether a source file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

/// `tex` and `ltx`.
fn default_extensions() -> Vec<String> {
    return vec!["tex".to_string(), "ltx".to_string()];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.is_source_file(Path::new("a/b.tex")));
        assert!(config.is_source_file(Path::new("c.ltx")));
        assert!(!config.is_source_file(Path::new("notes.md")));
        assert_eq!(config.settings(), ConventionSettings::default());
        assert!(config.should_scan("anything.tex"));
    }

    #[test]
    fn include_and_exclude_are_prefixes() {
        let config = Config::parse("include = [\"chapters/\"]\nexclude = [\"chapters/old\"]").unwrap();
        assert!(config.should_scan("chapters/intro.tex"));
        assert!(!config.should_scan("chapters/old/intro.tex"));
        assert!(!config.should_scan("main.tex"));
    }

    #[test]
    fn section_level_and_commands_are_read() {
        let toml = "minimum_section_level = \"paragraph\"\nparameter_separator = \",\\\\s*\"\n\n[commands]\nreference = [\"myref\"]\n";
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.settings().minimum_section_level, SectioningLevel::Paragraph);
        let catalog = config.catalog().unwrap();
        assert!(catalog.references.contains("\\myref"));
        assert!(catalog.parameter_separator.is_match(", "));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(Config::parse("inclde = []"), Err(Error::TomlDe(_))));
    }

    #[test]
    fn missing_explicit_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    fn missing_root_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.should_scan("main.tex"));
    }
}
