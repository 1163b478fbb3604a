//! C5: the instrumentation engine. Ties the pre-pass (`trace`), matching
//! (`matcher`), file emission (`instrument`/`trampoline`), and command-list
//! rewriting (`rewrite`) together into the single pipeline described in
//! spec §4.5, plus replay.

pub mod instrument;
pub mod matcher;
pub mod rewrite;
pub mod trampoline;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::analyzer::extract_functions;
use crate::config::Config;
use crate::error::{HookError, HookResult};
use crate::manifest::{HookDirective, HookKind};
use crate::process::process;
use crate::trace::{build_package_table, find_work_dir, Command};

pub use matcher::{match_file, Match};

pub const REPLAY_SCRIPT_NAME: &str = "replay_script.sh";
pub const MODIFIED_TRACE_NAME: &str = "go-build-modified.log";

/// Summary of a single pipeline run, printed by the CLI and useful for
/// tests: what was seen, what was touched, and anything non-fatal that went
/// wrong along the way (spec §7's non-fatal rows all land here instead of
/// aborting the run).
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub commands_seen: usize,
    pub packages_matched: usize,
    pub files_instrumented: usize,
    pub trampolines_emitted: usize,
    pub warnings: Vec<String>,
}

/// Runs the C5 pipeline against an already-parsed command list: matches
/// functions against `directives`, emits instrumented files and trampoline
/// files into the toolchain's scratch tree, and returns the rewritten
/// command list alongside the report. Does not persist or replay the
/// rewritten trace — see [`persist_and_replay`] for that. `directives` may
/// come from more than one manifest; each carries its own
/// `manifest_import_path`, so a shared trampoline file binds each weak
/// external to the right manifest.
pub fn run_pipeline(
    commands: &[Command],
    directives: &[HookDirective],
) -> HookResult<(RunReport, Vec<Command>)> {
    let mut report = RunReport {
        commands_seen: commands.len(),
        ..Default::default()
    };

    let Some(work_dir) = find_work_dir(commands) else {
        report
            .warnings
            .push("no WORK= token found in trace; nothing to instrument".to_string());
        return Ok((report, commands.to_vec()));
    };

    let packages = build_package_table(commands, &work_dir)?;
    log::debug!("pre-pass found {} package(s) in trace", packages.len());

    let mut file_replacements: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut trampoline_paths: HashMap<String, PathBuf> = HashMap::new();
    let mut matched_packages: HashSet<String> = HashSet::new();

    for cmd in commands {
        if !cmd.is_compile() {
            continue;
        }
        let (Some(pkg), Some(build_id)) = (cmd.package(), cmd.build_id(&work_dir)) else {
            continue;
        };

        let mut package_matches: Vec<Match> = Vec::new();
        let mut files_for_match: Vec<PathBuf> = Vec::new();
        let mut per_file: HashMap<PathBuf, Vec<usize>> = HashMap::new();

        for file in cmd.pack_files() {
            if !file.ends_with(".go") {
                continue;
            }
            let path = resolve_source_path(file);
            let functions = match extract_functions(&path) {
                Ok(f) => f,
                Err(e) => {
                    let msg = format!("skipping {}: {e}", path.display());
                    log::warn!("{msg}");
                    report.warnings.push(msg);
                    continue;
                }
            };
            let matches = match_file(pkg, functions, directives);
            if matches.is_empty() {
                continue;
            }
            for m in matches {
                per_file.entry(path.clone()).or_default().push(package_matches.len());
                package_matches.push(m);
                if !files_for_match.contains(&path) {
                    files_for_match.push(path.clone());
                }
            }
        }

        if package_matches.is_empty() {
            continue;
        }
        matched_packages.insert(pkg.to_string());

        let scratch_src = Path::new(&work_dir).join(&build_id).join("src");
        fs::create_dir_all(&scratch_src).map_err(HookError::Io)?;

        for path in &files_for_match {
            if file_replacements.contains_key(path) {
                continue; // idempotent: a given (package, basename) is emitted at most once per run
            }
            let idxs = &per_file[path];
            let refs: Vec<&Match> = idxs.iter().map(|&i| &package_matches[i]).collect();
            let source = fs::read_to_string(path).map_err(|e| HookError::SourceParse {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let instrumented = instrument::instrument_source(&source, &refs);
            let basename = path.file_name().ok_or_else(|| HookError::SourceParse {
                path: path.clone(),
                reason: "source path has no file name".to_string(),
            })?;
            let dest = scratch_src.join(basename);
            fs::write(&dest, instrumented).map_err(|source| HookError::FileEmission {
                path: dest.clone(),
                source,
            })?;
            log::info!("instrumented {} -> {}", path.display(), dest.display());
            file_replacements.insert(path.clone(), dest);
            report.files_instrumented += 1;
        }

        let has_before_after = package_matches
            .iter()
            .any(|m| matches!(m.directive.kind, HookKind::BeforeAfter | HookKind::Both));
        if has_before_after && !trampoline_paths.contains_key(pkg) {
            let refs: Vec<&Match> = package_matches.iter().collect();
            let text = trampoline::render_trampoline_file(pkg, &refs);
            let dest = scratch_src.join("otel_trampolines.go");
            fs::write(&dest, text).map_err(|source| HookError::FileEmission {
                path: dest.clone(),
                source,
            })?;
            log::info!("emitted trampoline file {}", dest.display());
            trampoline_paths.insert(pkg.to_string(), dest);
            report.trampolines_emitted += 1;
        }
    }

    report.packages_matched = matched_packages.len();
    let rewritten = rewrite::rewrite_commands(commands, &file_replacements, &trampoline_paths);
    Ok((report, rewritten))
}

fn resolve_source_path(file: &str) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(p)
    }
}

/// Persists the rewritten command list to `build-metadata/go-build-modified.log`
/// and, unless `dry_run`, writes `replay_script.sh` (mode 0755) and invokes
/// it through the system shell (spec §4.5.5 / §6).
pub fn persist_and_replay(config: &Config, rewritten: &[Command], dry_run: bool) -> HookResult<Option<i32>> {
    let metadata_dir = config.metadata_dir()?;
    let modified_path = metadata_dir.join(MODIFIED_TRACE_NAME);
    let lines: Vec<String> = rewritten.iter().map(Command::to_shell_string).collect();
    fs::write(&modified_path, lines.join("\n") + "\n")?;
    log::info!("wrote rewritten trace to {}", modified_path.display());

    if dry_run {
        return Ok(None);
    }

    let script_path = metadata_dir.join(REPLAY_SCRIPT_NAME);
    let mut script = String::from("#!/bin/sh\nset -e\n");
    for line in &lines {
        if line.is_empty() {
            continue;
        }
        script.push_str(&format!("echo '+ {}'\n", line.replace('\'', "'\\''")));
        script.push_str(line);
        script.push('\n');
    }
    fs::write(&script_path, script)?;
    set_executable(&script_path)?;
    log::info!("wrote replay script to {}", script_path.display());

    let mut cmd = process("sh");
    cmd.arg(&script_path).cwd(config.cwd());
    log::debug!("replaying rewritten trace via `{cmd}`");
    let code = cmd.exec_inherited()?;
    if code != 0 {
        return Err(HookError::ReplayExit { status: code });
    }
    Ok(Some(code))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> HookResult<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> HookResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::HookDirective;
    use std::io::Write as _;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn trivial_match_emits_instrumented_file_and_trampoline() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let src = write(dir.path(), "src/main.go", "package main\n\nfunc foo() {\n\tprintln(\"x\")\n}\n");

        let commands = vec![
            Command::parse_line(&format!("echo WORK={}", work.display())),
            Command::parse_line(&format!(
                "/bin/compile -p main -o {}/b001/_pkg_.a -pack {}",
                work.display(),
                src.display()
            )),
        ];
        let directives = vec![HookDirective {
            package: "main".to_string(),
            function: "foo".to_string(),
            receiver: None,
            kind: HookKind::BeforeAfter,
            manifest_import_path: "example.com/demo/hooks".to_string(),
        }];

        let (report, rewritten) = run_pipeline(&commands, &directives).unwrap();
        assert_eq!(report.files_instrumented, 1);
        assert_eq!(report.trampolines_emitted, 1);
        assert_eq!(report.packages_matched, 1);

        let instrumented_path = work.join("b001").join("src").join("main.go");
        let instrumented = fs::read_to_string(&instrumented_path).unwrap();
        assert!(instrumented.contains("OtelBeforeTrampoline_Foo"));

        let compile_cmd = &rewritten[1];
        assert!(compile_cmd.args.iter().any(|a| a.contains("b001/src/main.go")));
        assert!(compile_cmd.args.iter().any(|a| a.contains("otel_trampolines.go")));
    }

    #[test]
    fn non_matching_manifest_leaves_commands_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let src = write(dir.path(), "src/main.go", "package main\n\nfunc foo() {}\n");

        let commands = vec![
            Command::parse_line(&format!("echo WORK={}", work.display())),
            Command::parse_line(&format!(
                "/bin/compile -p main -o {}/b001/_pkg_.a -pack {}",
                work.display(),
                src.display()
            )),
        ];
        let directives = vec![HookDirective {
            package: "nonexistent".to_string(),
            function: "foo".to_string(),
            receiver: None,
            kind: HookKind::BeforeAfter,
            manifest_import_path: "example.com/demo".to_string(),
        }];

        let (report, rewritten) = run_pipeline(&commands, &directives).unwrap();
        assert_eq!(report.files_instrumented, 0);
        assert_eq!(rewritten, commands);
    }
}
