//! C2 (parse half): turns trace text into an ordered `Vec<Command>`.

use crate::error::{HookError, HookResult};

use super::command::Command;

/// Parses a full trace (as read from `build-metadata/go-build.log`) into an
/// ordered command list. Empty lines are skipped. A line that opens a
/// here-document (`cat > <path> << 'EOF'` or equivalent) absorbs subsequent
/// lines until one whose trimmed content is exactly `EOF`; failing to find
/// that terminator is a fatal parse error.
pub fn parse_trace(text: &str) -> HookResult<Vec<Command>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut commands = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }

        if let Some(sentinel) = heredoc_sentinel(line) {
            let start = i;
            let mut body_end = None;
            let mut j = i + 1;
            while j < lines.len() {
                if lines[j].trim() == sentinel.as_str() {
                    body_end = Some(j);
                    break;
                }
                j += 1;
            }
            let Some(end) = body_end else {
                return Err(HookError::TraceParse { line: start + 1 });
            };
            let raw = lines[start..=end].join("\n");
            commands.push(Command::parse_heredoc(raw, line));
            i = end + 1;
        } else {
            commands.push(Command::parse_line(line));
            i += 1;
        }
    }

    Ok(commands)
}

/// Recognizes a here-document opener and returns its terminating sentinel
/// (`EOF` in the spec's running example, but any quoted/bare word after
/// `<<` is honored).
fn heredoc_sentinel(line: &str) -> Option<String> {
    let idx = line.find("<<")?;
    let after = line[idx + 2..].trim();
    let word = after.split_whitespace().next()?;
    let word = word.trim_matches(['\'', '"']);
    if word.is_empty() {
        None
    } else {
        Some(word.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_empty_lines() {
        let trace = "echo a\n\n\necho b\n";
        let cmds = parse_trace(trace).unwrap();
        assert_eq!(cmds.len(), 2);
    }

    #[test]
    fn absorbs_heredoc_body() {
        let trace = "cat > $WORK/b001/importcfg << 'EOF'\npackagefile a=x.a\npackagefile b=y.a\nEOF\necho done\n";
        let cmds = parse_trace(trace).unwrap();
        assert_eq!(cmds.len(), 2);
        assert!(cmds[0].multiline);
        assert!(cmds[0].raw.contains("packagefile a=x.a"));
        assert_eq!(cmds[1].executable, "echo");
    }

    #[test]
    fn unterminated_heredoc_is_fatal() {
        let trace = "cat > out << 'EOF'\nline one\n";
        assert!(matches!(
            parse_trace(trace),
            Err(HookError::TraceParse { .. })
        ));
    }

    #[test]
    fn malformed_line_yields_empty_executable() {
        let cmds = parse_trace("   \t  \n").unwrap();
        assert!(cmds.is_empty());
    }
}
