//! Crate-wide error type.
//!
//! Mirrors the taxonomy in the design doc: a handful of fatal variants that
//! abort the current run, plus the expectation that callers downgrade the
//! non-fatal rows (toolchain exit, source parse failure, file emission
//! failure, import-path derivation failure) into [`crate::engine::RunReport`]
//! warnings instead of propagating them as `Err`.

use std::path::PathBuf;

use thiserror::Error;

pub type HookResult<T> = Result<T, HookError>;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to launch toolchain `{toolchain}`")]
    ToolchainLaunch {
        toolchain: String,
        #[source]
        source: std::io::Error,
    },

    #[error("toolchain exited with status {status} while capturing the build trace")]
    ToolchainExit { status: i32 },

    #[error("malformed here-document in trace at line {line}: unterminated before EOF")]
    TraceParse { line: usize },

    #[error("manifest `{path}` does not declare a `ProvideHooks` function")]
    ManifestMissingProvideHooks { path: PathBuf },

    #[error("failed to parse manifest `{path}`: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    #[error("manifest `{path}` declares `ProvideHooks` but it yields zero directives")]
    ManifestEmpty { path: PathBuf },

    #[error("could not resolve a module path for manifest `{path}`: no module manifest found above it")]
    ManifestImportPath { path: PathBuf },

    #[error("failed to parse source file `{path}`: {reason}")]
    SourceParse { path: PathBuf, reason: String },

    #[error("failed to emit instrumented file `{path}`: {source}")]
    FileEmission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("replay of rewritten build script exited with status {status}")]
    ReplayExit { status: i32 },

    #[error("mode `{0}` is not implemented by the core pipeline")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
