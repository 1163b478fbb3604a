//! Thin CLI front end: parses flags, dispatches to the library pipeline,
//! and prints a summary. Mirrors cargo's own `src/bin` split — this binary
//! carries no pipeline logic of its own.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use hookweave::config::{Config, Verbosity};
use hookweave::engine::{persist_and_replay, run_pipeline};
use hookweave::error::HookError;
use hookweave::manifest::read_manifest;
use hookweave::trace::{capture_structured, capture_text, parse_trace, Command};

#[derive(Parser)]
#[command(name = "hookweave", version, about = "Build-time function instrumentation compiler")]
struct Cli {
    /// Increase log verbosity; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// A hook manifest to instrument against. May be repeated; presence of
    /// at least one implies `compile-with-hooks` when no mode is given.
    #[arg(long = "manifest", value_name = "PATH", global = true)]
    manifests: Vec<PathBuf>,

    #[command(subcommand)]
    mode: Option<Mode>,

    /// Arguments forwarded verbatim to the toolchain's `build` invocation.
    #[arg(last = true)]
    build_args: Vec<String>,
}

#[derive(Subcommand, Clone, Copy)]
enum Mode {
    /// Capture the build trace in text mode; do not instrument.
    Capture,
    /// Capture the build trace via the toolchain's structured (-json) output.
    StructuredCapture,
    /// Capture, instrument, and replay — the default once a manifest is given.
    CompileWithHooks,
    /// Produce the rewritten scratch tree and command list without replaying.
    GenerateOnly,
    /// Print the planned rewrites; touch nothing on disk beyond the trace files.
    DryRun,
    /// Print the parsed command list as JSON.
    Dump,
    /// Out of scope: interactive replay.
    Interactive,
    /// Out of scope: call-graph dump.
    CallGraph,
    /// Out of scope: pack-file listing.
    PackFiles,
    /// Out of scope: work-directory dump.
    WorkDir,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose > 0 {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();

    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let verbosity = if cli.verbose > 0 { Verbosity::Verbose } else { Verbosity::Normal };
    let mut config = Config::new(verbosity).context("initializing configuration")?;

    let mode = cli.mode.unwrap_or(if cli.manifests.is_empty() {
        Mode::Capture
    } else {
        Mode::CompileWithHooks
    });

    match mode {
        Mode::Capture => {
            let outcome = capture_text(&config, &cli.build_args).context("capturing build trace")?;
            config.shell().status("Captured", outcome.trace_path.display());
            warn_on_nonzero_exit(&mut config, outcome.toolchain_exit_code);
        }
        Mode::StructuredCapture => {
            let outcome =
                capture_structured(&config, &cli.build_args).context("capturing structured build trace")?;
            config.shell().status("Captured", outcome.trace_path.display());
            if let Some(count) = outcome.structured_record_count {
                config.shell().status("Extracted", format!("{count} structured record(s)"));
            }
            warn_on_nonzero_exit(&mut config, outcome.toolchain_exit_code);
        }
        Mode::CompileWithHooks | Mode::GenerateOnly | Mode::DryRun => {
            let dry_run = matches!(mode, Mode::DryRun);
            let generate_only = matches!(mode, Mode::GenerateOnly);
            compile_with_hooks(&mut config, &cli, dry_run, generate_only)?;
        }
        Mode::Dump => dump(&mut config, &cli)?,
        Mode::Interactive => return Err(HookError::NotImplemented("interactive").into()),
        Mode::CallGraph => return Err(HookError::NotImplemented("call-graph").into()),
        Mode::PackFiles => return Err(HookError::NotImplemented("pack-files").into()),
        Mode::WorkDir => return Err(HookError::NotImplemented("work-dir").into()),
    }

    Ok(())
}

fn warn_on_nonzero_exit(config: &mut Config, code: i32) {
    if code != 0 {
        config
            .shell()
            .warn(format!("toolchain exited with status {code} during capture; partial trace kept"));
    }
}

fn compile_with_hooks(config: &mut Config, cli: &Cli, dry_run: bool, generate_only: bool) -> anyhow::Result<()> {
    anyhow::ensure!(!cli.manifests.is_empty(), "compile-with-hooks requires at least one --manifest");

    let outcome = capture_text(config, &cli.build_args).context("capturing build trace")?;
    warn_on_nonzero_exit(config, outcome.toolchain_exit_code);
    let trace_text = std::fs::read_to_string(&outcome.trace_path).context("reading captured trace")?;
    let commands = parse_trace(&trace_text).context("parsing build trace")?;

    let mut directives = Vec::new();
    for manifest_path in &cli.manifests {
        let manifest = read_manifest(manifest_path)
            .with_context(|| format!("reading manifest {}", manifest_path.display()))?;
        if manifest.import_path_is_fallback {
            config.shell().warn(format!(
                "manifest {} has no resolvable module path; falling back to package name `{}`",
                manifest_path.display(),
                manifest.import_path
            ));
        }
        directives.extend(manifest.directives);
    }

    let (report, rewritten) = run_pipeline(&commands, &directives).context("running instrumentation engine")?;
    for warning in &report.warnings {
        config.shell().warn(warning);
    }
    config.shell().status(
        "Instrumented",
        format!(
            "{} file(s) across {} package(s), {} trampoline(s)",
            report.files_instrumented, report.packages_matched, report.trampolines_emitted
        ),
    );

    if generate_only {
        persist_and_replay(config, &rewritten, true).context("persisting rewritten trace")?;
        return Ok(());
    }

    persist_and_replay(config, &rewritten, dry_run).context("replaying rewritten trace")?;
    if dry_run {
        config.shell().status("Dry run", "no replay performed");
    } else {
        config.shell().status("Replayed", "rewritten build trace");
    }
    Ok(())
}

fn dump(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    let outcome = capture_text(config, &cli.build_args).context("capturing build trace")?;
    let text = std::fs::read_to_string(&outcome.trace_path).context("reading captured trace")?;
    let commands = parse_trace(&text).context("parsing build trace")?;
    let view: Vec<CommandView> = commands.iter().map(CommandView::from).collect();
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

#[derive(Serialize)]
struct CommandView {
    executable: String,
    args: Vec<String>,
    multiline: bool,
}

impl From<&Command> for CommandView {
    fn from(cmd: &Command) -> Self {
        CommandView {
            executable: cmd.executable.clone(),
            args: cmd.args.clone(),
            multiline: cmd.multiline,
        }
    }
}
