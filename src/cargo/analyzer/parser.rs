//! C3: a minimal recursive-descent reader for the target language's
//! declaration surface — just enough to recover `FunctionInfo`/`Call`
//! (spec §4.3). This is not a general-purpose parser: it walks the file
//! once, tracking brace depth and skipping over string/char/comment
//! content, and only descends into full parsing when it finds a `func`
//! keyword sitting at top-level depth.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HookError, HookResult};

use super::ast::{is_exported, Call, Field, FunctionInfo};

/// Parses `path` and returns every function/method declaration found at
/// top level, in source order (spec §4.3.1).
pub fn extract_functions(path: &Path) -> HookResult<Vec<FunctionInfo>> {
    let source = fs::read_to_string(path).map_err(|e| HookError::SourceParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(scan_functions(&source, path))
}

/// Parses `path` and returns every call expression found inside a named
/// top-level function, tracking which function encloses it (spec §4.3.2).
pub fn extract_calls(path: &Path) -> HookResult<Vec<Call>> {
    let source = fs::read_to_string(path).map_err(|e| HookError::SourceParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let functions = scan_functions(&source, path);
    let line_starts = line_starts(&source);
    let mut calls = Vec::new();
    for f in &functions {
        let (body_start, body_end) = f.body_range;
        scan_calls_in_body(&source, body_start, body_end, &f.name, &line_starts, &mut calls);
    }
    Ok(calls)
}

/// Recovers the `package <name>` clause, used by the manifest reader and
/// the trampoline generator to name the generated file's own package.
pub fn parse_package_name(source: &str) -> Option<String> {
    let bytes = source.as_bytes();
    let mut i = 0;
    while let Some(rel) = find_word(&bytes[i..], b"package") {
        let idx = i + rel;
        if is_top_level(source, idx) {
            let mut j = idx + "package".len();
            j = skip_ws(bytes, j);
            return read_ident(source, j).map(|(name, _)| name);
        }
        i = idx + "package".len();
    }
    None
}

fn scan_functions(source: &str, path: &Path) -> Vec<FunctionInfo> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match next_significant(bytes, i) {
            Skip::Advance(n) => {
                i = n;
                continue;
            }
            Skip::None => {}
        }
        if is_word_at(bytes, i, b"func") && is_top_level(source, i) {
            if let Some((func, next)) = parse_function(source, i, path) {
                out.push(func);
                i = next;
                continue;
            } else {
                i += "func".len();
                continue;
            }
        }
        i += 1;
    }

    out
}

enum Skip {
    Advance(usize),
    None,
}

/// Advances past whitespace/comments/string-ish content starting at `i`,
/// returning the new position if it moved, else `Skip::None` so the caller
/// advances one byte at a time through ordinary code.
fn next_significant(bytes: &[u8], i: usize) -> Skip {
    if i >= bytes.len() {
        return Skip::None;
    }
    match bytes[i] {
        b'/' if bytes.get(i + 1) == Some(&b'/') => {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j] != b'\n' {
                j += 1;
            }
            Skip::Advance(j)
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
            let mut j = i + 2;
            while j + 1 < bytes.len() && !(bytes[j] == b'*' && bytes[j + 1] == b'/') {
                j += 1;
            }
            Skip::Advance((j + 2).min(bytes.len()))
        }
        b'"' => Skip::Advance(skip_string(bytes, i + 1, b'"')),
        b'`' => Skip::Advance(skip_raw_string(bytes, i + 1)),
        b'\'' => Skip::Advance(skip_string(bytes, i + 1, b'\'')),
        _ => Skip::None,
    }
}

fn skip_string(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            return i + 1;
        }
        i += 1;
    }
    i
}

fn skip_raw_string(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        if bytes[i] == b'`' {
            return i + 1;
        }
        i += 1;
    }
    i
}

/// True if `idx` sits at brace depth 0 (not nested inside any `{ ... }`),
/// by scanning from the start of the file. O(n) per call is acceptable:
/// each top-level `func` hit calls this once.
fn is_top_level(source: &str, idx: usize) -> bool {
    let bytes = source.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < idx {
        if let Skip::Advance(n) = next_significant(bytes, i) {
            i = n;
            continue;
        }
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    depth == 0
}

fn is_word_at(bytes: &[u8], i: usize, word: &[u8]) -> bool {
    if !bytes[i..].starts_with(word) {
        return false;
    }
    let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
    let after = i + word.len();
    let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
    before_ok && after_ok
}

fn find_word(haystack: &[u8], word: &[u8]) -> Option<usize> {
    if word.is_empty() || haystack.len() < word.len() {
        return None;
    }
    for i in 0..=haystack.len() - word.len() {
        if is_word_at(haystack, i, word) {
            return Some(i);
        }
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    loop {
        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        match next_significant(bytes, i) {
            Skip::Advance(n) if n != i => i = n,
            _ => break,
        }
    }
    i
}

fn read_ident(source: &str, i: usize) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    if i >= bytes.len() || !(bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
        return None;
    }
    let start = i;
    let mut j = i;
    while j < bytes.len() && is_ident_byte(bytes[j]) {
        j += 1;
    }
    Some((source[start..j].to_string(), j))
}

/// Finds the index of the byte matching `open` (already at `open_idx`)
/// against `close`, skipping nested pairs and string/comment content.
fn find_matching(bytes: &[u8], open_idx: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 1i32;
    let mut i = open_idx + 1;
    while i < bytes.len() {
        if let Skip::Advance(n) = next_significant(bytes, i) {
            i = n;
            continue;
        }
        if bytes[i] == open {
            depth += 1;
        } else if bytes[i] == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Attempts to parse a full function declaration starting at the `func`
/// keyword at byte offset `start`. Returns `None` (and the caller moves on)
/// for anything that isn't a named top-level declaration — a function
/// literal assigned to a variable, a `func(...)`-typed field, etc.
fn parse_function(source: &str, start: usize, path: &Path) -> Option<(FunctionInfo, usize)> {
    let bytes = source.as_bytes();
    let mut i = skip_ws(bytes, start + "func".len());

    let mut receiver = String::new();
    if bytes.get(i) == Some(&b'(') {
        let close = find_matching(bytes, i, b'(', b')')?;
        let inner = &source[i + 1..close];
        if let Some((_, ty)) = segment_name_and_type(inner) {
            receiver = render_type(&ty);
        } else {
            receiver = render_type(inner.trim());
        }
        i = skip_ws(bytes, close + 1);
    }

    let (name, after_name) = read_ident(source, i)?;
    i = skip_ws(bytes, after_name);

    if bytes.get(i) != Some(&b'(') {
        return None;
    }
    let params_close = find_matching(bytes, i, b'(', b')')?;
    let params = parse_field_list(&source[i + 1..params_close]);
    i = skip_ws(bytes, params_close + 1);

    let results = if bytes.get(i) == Some(&b'(') {
        let close = find_matching(bytes, i, b'(', b')')?;
        let fields = parse_field_list(&source[i + 1..close]);
        i = skip_ws(bytes, close + 1);
        fields
    } else if bytes.get(i) == Some(&b'{') {
        Vec::new()
    } else {
        let ty_start = i;
        while i < bytes.len() && bytes[i] != b'{' {
            i += 1;
        }
        let ty = source[ty_start..i].trim();
        i = skip_ws(bytes, i);
        if ty.is_empty() {
            Vec::new()
        } else {
            vec![Field {
                name: String::new(),
                ty: render_type(ty),
            }]
        }
    };

    if bytes.get(i) != Some(&b'{') {
        return None;
    }
    let body_start = i;
    let body_end = find_matching(bytes, body_start, b'{', b'}')?;

    Some((
        FunctionInfo {
            exported: is_exported(&name),
            name,
            receiver,
            params,
            results,
            file: path_of(path),
            body_range: (body_start, body_end + 1),
        },
        body_end + 1,
    ))
}

fn path_of(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Splits a parameter/result list by top-level commas and groups names that
/// share a trailing type (spec §4.3: `(a, b int, c string)` -> three
/// fields, `a`/`b` sharing `int`).
fn parse_field_list(inner: &str) -> Vec<Field> {
    let segments = split_top_level_commas(inner);
    if segments.is_empty() {
        return Vec::new();
    }

    let named = segments
        .iter()
        .any(|s| segment_name_and_type(s).is_some());

    if !named {
        return segments
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Field {
                name: String::new(),
                ty: render_type(s.trim()),
            })
            .collect();
    }

    let mut fields = Vec::new();
    let mut pending_names = Vec::new();
    for seg in &segments {
        let seg = seg.trim();
        if seg.is_empty() {
            continue;
        }
        match segment_name_and_type(seg) {
            Some((name, ty)) => {
                let rendered = render_type(&ty);
                pending_names.push(name);
                for n in pending_names.drain(..) {
                    fields.push(Field {
                        name: n,
                        ty: rendered.clone(),
                    });
                }
            }
            None => {
                pending_names.push(seg.to_string());
            }
        }
    }
    fields
}

/// Splits `s` on commas that are not nested inside `()`, `[]`, `{}`.
fn split_top_level_commas(s: &str) -> Vec<String> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                segments.push(s[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(s[start..].to_string());
    segments
}

/// Heuristically splits a single field segment into `(name, type)`: the
/// first whitespace-delimited token is the name if it's a plain identifier
/// (not a type-introducing keyword or sigil) and something follows it.
fn segment_name_and_type(seg: &str) -> Option<(String, String)> {
    let seg = seg.trim();
    let mut parts = seg.splitn(2, char::is_whitespace);
    let first = parts.next()?;
    let rest = parts.next().map(str::trim).unwrap_or("");
    if rest.is_empty() {
        return None;
    }
    if is_type_keyword(first) || first.starts_with(['*', '[', '<', '.']) || first.contains('.') {
        return None;
    }
    if !first.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        return None;
    }
    if !first.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((first.to_string(), rest.to_string()))
}

fn is_type_keyword(word: &str) -> bool {
    matches!(
        word,
        "chan" | "map" | "func" | "interface" | "struct"
    )
}

/// Renders a type expression into the canonical textual form of spec
/// §4.3: identifier, qualified identifier, pointer, slice, sized array
/// (opaque `[...]T`), map, channel (direction-prefixed), function (opaque
/// `func(...)`), interface (`interface{}`/`interface{...}`), variadic, or
/// the `<unknown>` fallback.
pub fn render_type(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return "<unknown>".to_string();
    }
    if let Some(rest) = s.strip_prefix("...") {
        return format!("...{}", render_type(rest));
    }
    if let Some(rest) = s.strip_prefix('*') {
        return format!("*{}", render_type(rest));
    }
    if let Some(rest) = s.strip_prefix("[]") {
        return format!("[]{}", render_type(rest));
    }
    if s.starts_with('[') {
        let bytes = s.as_bytes();
        if let Some(close) = find_matching(bytes, 0, b'[', b']') {
            let elem = &s[close + 1..];
            return format!("[...]{}", render_type(elem));
        }
    }
    if s.starts_with("map[") {
        let bytes = s.as_bytes();
        if let Some(close) = find_matching(bytes, "map".len(), b'[', b']') {
            let key = &s["map[".len()..close];
            let value = &s[close + 1..];
            return format!("map[{}]{}", render_type(key), render_type(value));
        }
    }
    if let Some(rest) = s.strip_prefix("<-chan") {
        return format!("<-chan {}", render_type(rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("chan<-") {
        return format!("chan<- {}", render_type(rest.trim_start()));
    }
    if let Some(rest) = s.strip_prefix("chan") {
        if rest.starts_with(char::is_whitespace) || rest.is_empty() {
            return format!("chan {}", render_type(rest.trim_start()));
        }
    }
    if s.starts_with("func") {
        return "func(...)".to_string();
    }
    if let Some(rest) = s.strip_prefix("interface") {
        let rest = rest.trim();
        return if rest == "{}" {
            "interface{}".to_string()
        } else {
            "interface{...}".to_string()
        };
    }
    if is_plain_or_qualified_ident(s) {
        return s.to_string();
    }
    "<unknown>".to_string()
}

fn is_plain_or_qualified_ident(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() > 2 || parts.is_empty() {
        return false;
    }
    parts.iter().all(|p| {
        !p.is_empty()
            && p.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
            && p.chars().all(|c| c.is_alphanumeric() || c == '_')
    })
}

fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn line_at(line_starts: &[usize], offset: usize) -> usize {
    match line_starts.binary_search(&offset) {
        Ok(i) => i + 1,
        Err(i) => i, // i-1+1
    }
}

fn scan_calls_in_body(
    source: &str,
    body_start: usize,
    body_end: usize,
    caller: &str,
    line_starts: &[usize],
    out: &mut Vec<Call>,
) {
    let bytes = source.as_bytes();
    let mut i = body_start;
    while i < body_end {
        if let Skip::Advance(n) = next_significant(bytes, i) {
            i = n.min(body_end);
            continue;
        }
        if bytes[i].is_ascii_alphabetic() || bytes[i] == b'_' {
            let (ident1, after1) = match read_ident(source, i) {
                Some(v) => v,
                None => {
                    i += 1;
                    continue;
                }
            };
            if after1 < body_end && bytes.get(after1) == Some(&b'.') {
                if let Some((ident2, after2)) = read_ident(source, after1 + 1) {
                    if bytes.get(after2) == Some(&b'(') && ident1 != "func" {
                        out.push(Call {
                            caller: caller.to_string(),
                            callee: ident2,
                            package_qualifier: Some(ident1),
                            line: line_at(line_starts, i),
                        });
                        i = after2;
                        continue;
                    }
                }
            } else if bytes.get(after1) == Some(&b'(') && ident1 != "func" {
                out.push(Call {
                    caller: caller.to_string(),
                    callee: ident1,
                    package_qualifier: None,
                    line: line_at(line_starts, i),
                });
                i = after1;
                continue;
            }
            i = after1;
            continue;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_tmp(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.go");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn finds_free_function() {
        let (_d, path) = write_tmp("package main\n\nfunc foo() {\n\tprintln(\"x\")\n}\n");
        let funcs = extract_functions(&path).unwrap();
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "foo");
        assert_eq!(funcs[0].receiver, "");
        assert!(!funcs[0].exported);
    }

    #[test]
    fn distinguishes_receivers() {
        let src = "package p\n\nfunc (s S) Run() {}\nfunc (t *T) Run() {}\n";
        let (_d, path) = write_tmp(src);
        let funcs = extract_functions(&path).unwrap();
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].receiver, "S");
        assert_eq!(funcs[1].receiver, "*T");
        assert_eq!(funcs[0].name, "Run");
        assert!(funcs[0].exported);
    }

    #[test]
    fn groups_shared_param_types() {
        let src = "package p\n\nfunc Sum(a, b int, c string) int { return a }\n";
        let (_d, path) = write_tmp(src);
        let funcs = extract_functions(&path).unwrap();
        let params = &funcs[0].params;
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], Field { name: "a".into(), ty: "int".into() });
        assert_eq!(params[1], Field { name: "b".into(), ty: "int".into() });
        assert_eq!(params[2], Field { name: "c".into(), ty: "string".into() });
        assert_eq!(funcs[0].results, vec![Field { name: "".into(), ty: "int".into() }]);
    }

    #[test]
    fn renders_canonical_types() {
        assert_eq!(render_type("*Foo"), "*Foo");
        assert_eq!(render_type("[]int"), "[]int");
        assert_eq!(render_type("[5]int"), "[...]int");
        assert_eq!(render_type("map[string]int"), "map[string]int");
        assert_eq!(render_type("chan int"), "chan int");
        assert_eq!(render_type("<-chan int"), "<-chan int");
        assert_eq!(render_type("func(int) error"), "func(...)");
        assert_eq!(render_type("interface{}"), "interface{}");
        assert_eq!(render_type("interface{ Foo() }"), "interface{...}");
        assert_eq!(render_type("pkg.Type"), "pkg.Type");
        assert_eq!(render_type("...string"), "...string");
        assert_eq!(render_type("1 + 2"), "<unknown>");
    }

    #[test]
    fn ignores_nested_func_literals_and_type_blocks() {
        let src = r#"
package p

type Handler func(ctx int)

var hook = func() {
	println("nested")
}

func real() {
	println("ok")
}
"#;
        let (_d, path) = write_tmp(src);
        let funcs = extract_functions(&path).unwrap();
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "real");
    }

    #[test]
    fn extracts_calls_with_and_without_qualifier() {
        let src = "package p\n\nfunc f() {\n\tfoo()\n\tpkg.Bar()\n}\n";
        let (_d, path) = write_tmp(src);
        let calls = extract_calls(&path).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].callee, "foo");
        assert_eq!(calls[0].package_qualifier, None);
        assert_eq!(calls[1].callee, "Bar");
        assert_eq!(calls[1].package_qualifier.as_deref(), Some("pkg"));
    }

    #[test]
    fn parses_package_name() {
        assert_eq!(parse_package_name("package main\n\nfunc f() {}"), Some("main".to_string()));
    }
}
