//! Label and reference analysis for LaTeX-like markup.
//!
//! Parses `\command[options]{arguments}` sources into a read-only tree,
//! classifies command occurrences as label, file, URL or definition
//! references, and checks labels against a prefix convention (`sec:`,
//! `fig:`, `lst:`, ...), producing rename plans that update every reference
//! across a multi-file project.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod context;
pub mod definitions;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod fileset;
pub mod params;
pub mod references;
pub mod rename;
pub mod slug;
pub mod watch;

pub use error::Error;
