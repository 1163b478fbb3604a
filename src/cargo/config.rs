//! Ambient configuration: the working directory, toolchain binary, verbosity,
//! and scratch-file layout shared by every component of the pipeline.
//!
//! Mirrors cargo's `util::config::Config` in spirit — a small struct created
//! once at startup and threaded through by reference — but carries only the
//! handful of fields this pipeline actually reads.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

use crate::error::HookResult;

/// Default basename of the `build-metadata/` directory, relative to `cwd`.
pub const METADATA_DIR: &str = "build-metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

pub struct Config {
    cwd: PathBuf,
    toolchain: String,
    verbosity: Verbosity,
    shell: Shell,
}

impl Config {
    /// Minimal initialization; does not touch disk beyond `current_dir`.
    pub fn new(verbosity: Verbosity) -> HookResult<Config> {
        let cwd = env::current_dir()?;
        let toolchain = env::var("HOOKWEAVE_TOOLCHAIN").unwrap_or_else(|_| "go".to_string());
        Ok(Config {
            cwd,
            toolchain,
            verbosity,
            shell: Shell::new(),
        })
    }

    #[cfg(test)]
    pub fn for_test(cwd: PathBuf) -> Config {
        Config {
            cwd,
            toolchain: "go".to_string(),
            verbosity: Verbosity::Normal,
            shell: Shell::new(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn toolchain(&self) -> &str {
        &self.toolchain
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn shell(&mut self) -> &mut Shell {
        &mut self.shell
    }

    /// `build-metadata/` rooted at `cwd`, created on first use.
    pub fn metadata_dir(&self) -> HookResult<PathBuf> {
        let dir = self.cwd.join(METADATA_DIR);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// A thin status-printing wrapper over stderr, in the style of cargo's
/// `Shell`: colored verb/message pairs for progress, plain lines for
/// warnings, nothing for status output when quiet.
pub struct Shell {
    stream: StandardStream,
}

impl Shell {
    pub fn new() -> Shell {
        Shell {
            stream: StandardStream::stderr(termcolor::ColorChoice::Auto),
        }
    }

    pub fn status(&mut self, verb: &str, message: impl std::fmt::Display) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Green)).set_bold(true);
        let _ = self.stream.set_color(&spec);
        let _ = write!(self.stream, "{verb:>12}");
        let _ = self.stream.reset();
        let _ = writeln!(self.stream, " {message}");
    }

    pub fn warn(&mut self, message: impl std::fmt::Display) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Yellow)).set_bold(true);
        let _ = self.stream.set_color(&spec);
        let _ = write!(self.stream, "{:>12}", "warning:");
        let _ = self.stream.reset();
        let _ = writeln!(self.stream, " {message}");
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new()
    }
}
