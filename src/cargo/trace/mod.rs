//! C2: build-trace capture and parsing.

pub mod capture;
pub mod command;
pub mod parser;

pub use capture::{capture_structured, capture_text, CaptureOutcome};
pub use command::{common_ancestor, Command, PackagePathInfo};
pub use parser::parse_trace;

use crate::error::HookResult;

/// Scans every command's raw text for the first `WORK=<path>` token,
/// revealing the toolchain's scratch root (spec §4.5.1).
pub fn find_work_dir(commands: &[Command]) -> Option<String> {
    for cmd in commands {
        if let Some(idx) = cmd.raw.find("WORK=") {
            let rest = &cmd.raw[idx + "WORK=".len()..];
            let path: String = rest
                .chars()
                .take_while(|c| !c.is_whitespace())
                .collect();
            if !path.is_empty() {
                return Some(path);
            }
        }
    }
    None
}

/// Builds the per-package `PackagePathInfo` table by scanning compile
/// commands (spec §4.5.1).
pub fn build_package_table(
    commands: &[Command],
    work_dir: &str,
) -> HookResult<Vec<PackagePathInfo>> {
    let mut table = Vec::new();
    for cmd in commands {
        if !cmd.is_compile() {
            continue;
        }
        let (Some(package), Some(build_id)) = (cmd.package(), cmd.build_id(work_dir)) else {
            continue;
        };
        let files = cmd.pack_files();
        let go_files: Vec<&str> = files.into_iter().filter(|f| f.ends_with(".go")).collect();
        if go_files.is_empty() {
            continue;
        }
        let Some(dir) = common_ancestor(go_files) else {
            continue;
        };
        table.push(PackagePathInfo {
            package: package.to_string(),
            dir,
            build_id,
        });
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_work_dir_token() {
        let cmds = vec![Command::parse_line("echo WORK=/tmp/go-build12345 extra")];
        assert_eq!(find_work_dir(&cmds).as_deref(), Some("/tmp/go-build12345"));
    }

    #[test]
    fn builds_package_table_from_compile_commands() {
        let cmds = vec![
            Command::parse_line("echo WORK=/tmp/w"),
            Command::parse_line(
                "/bin/compile -p main -o /tmp/w/b001/_pkg_.a -pack /src/main.go /src/util.go",
            ),
        ];
        let work = find_work_dir(&cmds).unwrap();
        let table = build_package_table(&cmds, &work).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].package, "main");
        assert_eq!(table[0].build_id, "b001");
        assert_eq!(table[0].dir, std::path::PathBuf::from("/src"));
    }
}
