//! `Command` and `PackagePathInfo`: the data model for a single toolchain
//! invocation recovered from the build trace (spec §3).

use std::path::{Path, PathBuf};

use crate::lexer::tokenize;

/// A single toolchain invocation, as recovered from the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Original text, verbatim. For multi-line commands this includes the
    /// here-document body and its terminating `EOF` line.
    pub raw: String,
    pub executable: String,
    pub args: Vec<String>,
    pub multiline: bool,
}

impl Command {
    /// Parses a single-line command: strips a trailing ` # ...` comment,
    /// tokenizes, and splits into executable + args. Malformed lines (no
    /// tokens) produce `executable = ""`, which downstream filters ignore.
    pub fn parse_line(raw_line: &str) -> Command {
        let cleaned = strip_trailing_comment(raw_line);
        let tokens = tokenize(&cleaned);
        let mut iter = tokens.into_iter();
        let executable = iter.next().unwrap_or_default();
        let args = iter.collect();
        Command {
            raw: raw_line.to_string(),
            executable,
            args,
            multiline: false,
        }
    }

    /// Builds a multi-line (here-document) command. `executable`/`args` are
    /// derived from the heredoc's opening line only.
    pub fn parse_heredoc(raw: String, opening_line: &str) -> Command {
        let cleaned = strip_trailing_comment(opening_line);
        let tokens = tokenize(&cleaned);
        let mut iter = tokens.into_iter();
        let executable = iter.next().unwrap_or_default();
        let args = iter.collect();
        Command {
            raw,
            executable,
            args,
            multiline: true,
        }
    }

    /// True if the executable's basename ends in `/compile` (or is exactly
    /// `compile`), per spec §3's definition of a compile command.
    pub fn is_compile(&self) -> bool {
        self.executable == "compile" || self.executable.ends_with("/compile")
    }

    /// The `-p <package>` argument, if present.
    pub fn package(&self) -> Option<&str> {
        self.flag_value("-p")
    }

    /// The `-o <path>` argument, if present.
    pub fn output(&self) -> Option<&str> {
        self.flag_value("-o")
    }

    /// The file list following `-pack`, if present: everything up to the
    /// next flag (a token starting with `-`) or end of args.
    pub fn pack_files(&self) -> Vec<&str> {
        let Some(pos) = self.args.iter().position(|a| a == "-pack") else {
            return Vec::new();
        };
        self.args[pos + 1..]
            .iter()
            .take_while(|a| !a.starts_with('-'))
            .map(String::as_str)
            .collect()
    }

    fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// The build id: the first path segment under the scratch root in this
    /// command's `-o` output path, e.g. `$WORK/b012/_pkg_.a` -> `b012`.
    pub fn build_id(&self, work: &str) -> Option<String> {
        let output = self.output()?;
        let rel = output.strip_prefix(work)?;
        let rel = rel.trim_start_matches(['/', '\\']);
        rel.split(['/', '\\']).next().map(str::to_string)
    }

    /// Reconstructs a shell-replayable form of this command (spec §4.2).
    ///
    /// Multi-line commands always return their raw text. Single-line
    /// commands whose cleaned raw text contains shell redirection operators
    /// (`<`, `>`, `|`) are returned verbatim, since re-quoting the argument
    /// vector would silently drop that redirection. Otherwise the argument
    /// vector is re-emitted, double-quoting arguments that look like an
    /// importmap shorthand (`$NAME/...=>...`) or that contain whitespace,
    /// quotes, or backslashes.
    pub fn to_shell_string(&self) -> String {
        if self.multiline {
            return self.raw.clone();
        }
        let cleaned = strip_trailing_comment(&self.raw);
        if cleaned.contains(['<', '>', '|']) {
            return cleaned;
        }
        let mut parts = vec![quote_if_needed(&self.executable)];
        parts.extend(self.args.iter().map(|a| quote_if_needed(a)));
        parts.join(" ")
    }
}

fn strip_trailing_comment(line: &str) -> String {
    match line.find(" # ") {
        Some(idx) => line[..idx].to_string(),
        None => line.to_string(),
    }
}

fn looks_like_importmap_shorthand(arg: &str) -> bool {
    arg.contains("=>")
        && arg
            .split('/')
            .next()
            .map(|head| head.starts_with('$'))
            .unwrap_or(false)
}

fn quote_if_needed(arg: &str) -> String {
    if looks_like_importmap_shorthand(arg)
        || arg.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\' || c == '\'')
    {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// Per-package metadata derived once from the command list (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePathInfo {
    pub package: String,
    /// Absolute common ancestor directory of this package's input files.
    pub dir: PathBuf,
    pub build_id: String,
}

/// Computes the absolute common ancestor directory of a set of file paths.
pub fn common_ancestor<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<PathBuf> {
    let mut ancestor: Option<PathBuf> = None;
    for p in paths {
        let dir = absolutize(Path::new(p).parent().unwrap_or_else(|| Path::new(".")));
        ancestor = Some(match ancestor {
            None => dir,
            Some(prev) => common_prefix(&prev, &dir),
        });
    }
    ancestor
}

fn absolutize(p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_default()
            .join(p)
    }
}

fn common_prefix(a: &Path, b: &Path) -> PathBuf {
    let a_parts: Vec<_> = a.components().collect();
    let b_parts: Vec<_> = b.components().collect();
    let mut out = PathBuf::new();
    for (ca, cb) in a_parts.iter().zip(b_parts.iter()) {
        if ca == cb {
            out.push(ca.as_os_str());
        } else {
            break;
        }
    }
    out
}
