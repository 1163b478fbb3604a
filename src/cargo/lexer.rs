//! C1: a minimal command-line tokenizer, sufficient to recover the argument
//! vectors of well-formed toolchain-emitted commands. This is deliberately
//! not a shell parser: it does not interpret `$VAR`, redirection, or pipes —
//! callers that need to preserve those fall back to the raw line (see
//! `trace::command::Command::to_shell_string`).

/// Tokenizes a single line into whitespace-separated words, honoring
/// single/double quoting (stripped) and backslash escapes (the escaped
/// character is kept verbatim, the backslash is dropped).
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_current = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if escaped {
            current.push(c);
            has_current = true;
            escaped = false;
            continue;
        }
        match quote {
            Some(q) if c == q => {
                quote = None;
                has_current = true;
            }
            Some(_) => {
                if c == '\\' {
                    escaped = true;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    has_current = true;
                }
                '\\' => {
                    escaped = true;
                    has_current = true;
                }
                c if c.is_whitespace() => {
                    if has_current {
                        tokens.push(std::mem::take(&mut current));
                        has_current = false;
                    }
                }
                c => {
                    current.push(c);
                    has_current = true;
                }
            },
        }
    }

    if has_current {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokenize("a b   c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn strips_quotes_and_keeps_inner_whitespace() {
        assert_eq!(
            tokenize(r#"foo "bar baz" 'qux'"#),
            vec!["foo", "bar baz", "qux"]
        );
    }

    #[test]
    fn backslash_escapes_next_char() {
        assert_eq!(tokenize(r"a\ b c"), vec!["a b", "c"]);
    }

    #[test]
    fn flushes_trailing_partial_token() {
        assert_eq!(tokenize("a b\\"), vec!["a", "b"]);
    }

    #[test]
    fn empty_line_yields_no_tokens() {
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn adjacent_quoted_segments_join_one_token() {
        assert_eq!(tokenize(r#"foo"bar"'baz'"#), vec!["foobarbaz"]);
    }
}
