//! Command-list rewriting (spec §4.5.5): substitute instrumented file paths
//! into compile commands and append the package's trampoline file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::trace::Command;

/// Rewrites `commands`, replacing any `.go` source path that appears in
/// `file_replacements` (keyed by original path, valued by its instrumented
/// copy) and appending `trampoline_paths[package]` to any compile command
/// that had at least one replacement fire. Non-compile commands, and
/// compile commands with no matches, pass through unchanged (by value,
/// since `Command` has no distinct "unchanged" marker of its own).
pub fn rewrite_commands(
    commands: &[Command],
    file_replacements: &HashMap<PathBuf, PathBuf>,
    trampoline_paths: &HashMap<String, PathBuf>,
) -> Vec<Command> {
    commands
        .iter()
        .map(|cmd| rewrite_one(cmd, file_replacements, trampoline_paths))
        .collect()
}

fn rewrite_one(
    cmd: &Command,
    file_replacements: &HashMap<PathBuf, PathBuf>,
    trampoline_paths: &HashMap<String, PathBuf>,
) -> Command {
    if !cmd.is_compile() || file_replacements.is_empty() {
        return cmd.clone();
    }
    let Some(pkg) = cmd.package() else {
        return cmd.clone();
    };

    let mut new_args = cmd.args.clone();
    let mut replaced = false;
    for arg in new_args.iter_mut() {
        if let Some(dest) = lookup_replacement(arg, file_replacements) {
            *arg = dest;
            replaced = true;
        }
    }
    if !replaced {
        return cmd.clone();
    }
    if let Some(tramp) = trampoline_paths.get(pkg) {
        let tramp_arg = tramp.display().to_string();
        if !new_args.contains(&tramp_arg) {
            new_args.push(tramp_arg);
        }
    }

    let raw = format!("{} {}", cmd.executable, new_args.join(" "));
    Command {
        raw,
        executable: cmd.executable.clone(),
        args: new_args,
        multiline: false,
    }
}

/// Looks up `arg` in `map` by exact path, falling back to a basename match
/// so relative-path command variants still get rewritten (spec §4.5.5).
fn lookup_replacement(arg: &str, map: &HashMap<PathBuf, PathBuf>) -> Option<String> {
    if let Some(dest) = map.get(Path::new(arg)) {
        return Some(dest.display().to_string());
    }
    let basename = Path::new(arg).file_name()?;
    map.iter()
        .find(|(k, _)| k.file_name() == Some(basename))
        .map(|(_, v)| v.display().to_string())
}
