//! C4: hook-manifest reader.
//!
//! The manifest is a source file of the target language that exports a
//! function literally named `ProvideHooks`. This module locates that
//! function, walks every composite literal inside its body, classifies the
//! ones that declare a `Target`, and derives the manifest's module-qualified
//! import path (spec §4.4).

use std::fs;
use std::path::{Path, PathBuf};

use crate::analyzer::parse_package_name;
use crate::error::{HookError, HookResult};

const PROVIDE_HOOKS: &str = "ProvideHooks";
const MODULE_MANIFEST_FILE: &str = "go.mod";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    BeforeAfter,
    Rewrite,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDirective {
    pub package: String,
    pub function: String,
    pub receiver: Option<String>,
    pub kind: HookKind,
    /// The import path of the manifest this directive came from (spec
    /// §4.4). Carried on the directive itself, rather than threaded
    /// alongside it, so the engine can mix directives from several
    /// manifests in one pipeline run without their trampoline files
    /// clobbering each other.
    pub manifest_import_path: String,
}

impl HookDirective {
    pub fn matches(&self, pkg: &str, function: &str, receiver: &str) -> bool {
        if self.package != pkg || self.function != function {
            return false;
        }
        match &self.receiver {
            None => receiver.is_empty(),
            Some(r) => r == receiver,
        }
    }
}

pub struct Manifest {
    pub directives: Vec<HookDirective>,
    /// The module-qualified import path, or the manifest's bare package
    /// name if no module manifest could be found (a warning is logged in
    /// that case; see spec §4.4 / §7).
    pub import_path: String,
    pub import_path_is_fallback: bool,
}

/// Reads and classifies a hook manifest file.
pub fn read_manifest(path: &Path) -> HookResult<Manifest> {
    let source = fs::read_to_string(path).map_err(|e| HookError::ManifestParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let body = find_provide_hooks_body(&source).ok_or_else(|| {
        HookError::ManifestMissingProvideHooks {
            path: path.to_path_buf(),
        }
    })?;

    let (import_path, is_fallback) = resolve_import_path(path, &source);
    let directives = find_directives(body, &import_path);
    if directives.is_empty() {
        return Err(HookError::ManifestEmpty {
            path: path.to_path_buf(),
        });
    }

    Ok(Manifest {
        directives,
        import_path,
        import_path_is_fallback: is_fallback,
    })
}

/// Locates the `func ProvideHooks() ... { <body> }` declaration and returns
/// its body text (the `{`/`}` delimiters included, for recursive scanning).
fn find_provide_hooks_body(source: &str) -> Option<&str> {
    let idx = source.find(PROVIDE_HOOKS)?;
    // Require this to actually be a `func ProvideHooks` declaration, not an
    // incidental reference (e.g. a doc comment or a call site elsewhere).
    let before = source[..idx].trim_end();
    if !before.ends_with("func") {
        return find_provide_hooks_body(&source[idx + PROVIDE_HOOKS.len()..]);
    }
    let after = &source[idx + PROVIDE_HOOKS.len()..];
    let open = after.find('{')?;
    let close = matching_brace(after, open)?;
    Some(&after[open..=close])
}

fn matching_brace(s: &str, open_idx: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0i32;
    let mut i = open_idx;
    let mut in_string: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'`' => in_string = Some(c),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Recursively walks every `{ ... }` block inside `body`, classifying each
/// one that declares a `Target` field into a `HookDirective`.
fn find_directives(body: &str, manifest_import_path: &str) -> Vec<HookDirective> {
    let mut out = Vec::new();
    for (start, end) in all_brace_blocks(body) {
        let inner = &body[start + 1..end];
        let fields = parse_kv_fields(inner);
        let Some(target_raw) = fields.get("Target") else {
            continue;
        };
        let target_fields = parse_kv_fields(strip_type_prefix(target_raw));
        let package = target_fields
            .get("Package")
            .map(|s| unquote(s))
            .unwrap_or_default();
        let function = target_fields
            .get("Function")
            .map(|s| unquote(s))
            .unwrap_or_default();
        let receiver = target_fields.get("Receiver").map(|s| unquote(s));
        if package.is_empty() || function.is_empty() {
            continue;
        }

        let has_hooks = fields.get("Hooks").is_some_and(|v| is_non_nil(v));
        let has_rewrite = fields.get("Rewrite").is_some_and(|v| is_non_nil(v));
        let kind = match (has_hooks, has_rewrite) {
            (true, true) => HookKind::Both,
            (true, false) => HookKind::BeforeAfter,
            (false, true) => HookKind::Rewrite,
            (false, false) => continue, // dropped per spec §3: neither present is invalid
        };

        out.push(HookDirective {
            package,
            function,
            receiver: receiver.filter(|r| !r.is_empty()),
            kind,
            manifest_import_path: manifest_import_path.to_string(),
        });
    }
    out
}

fn is_non_nil(value: &str) -> bool {
    value.trim() != "nil"
}

fn strip_type_prefix(value: &str) -> &str {
    // `Target{...}` or `&Target{...}` -> the brace block itself.
    let v = value.trim().trim_start_matches('&');
    match (v.find('{'), v.rfind('}')) {
        (Some(s), Some(e)) if e > s => &v[s..=e],
        _ => v,
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

/// Finds every brace-delimited block in `s`, returning `(open_idx,
/// close_idx)` pairs in the order their opening brace appears, including
/// nested blocks.
fn all_brace_blocks(s: &str) -> Vec<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    let mut in_string: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' | b'`' => {
                in_string = Some(c);
                i += 1;
            }
            b'{' => {
                if let Some(close) = matching_brace(s, i) {
                    out.push((i, close));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    out
}

/// Splits the direct contents of a `{ ... }` block into `name: value`
/// fields, respecting nested brace/paren/bracket depth.
fn parse_kv_fields(inner: &str) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    let bytes = inner.as_bytes();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut segments = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => depth -= 1,
            b',' if depth == 0 => {
                segments.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&inner[start..]);

    for seg in segments {
        let seg = seg.trim();
        if seg.is_empty() {
            continue;
        }
        if let Some(colon) = top_level_colon(seg) {
            let name = seg[..colon].trim().to_string();
            let value = seg[colon + 1..].trim().to_string();
            map.insert(name, value);
        }
    }
    map
}

fn top_level_colon(seg: &str) -> Option<usize> {
    let bytes = seg.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => depth -= 1,
            b':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Derives the manifest's module-qualified import path (spec §4.4): walk
/// upward from the manifest's directory for a `go.mod`-equivalent module
/// manifest, read its declared module path, and append the forward-slash
/// relative path from the module root to the manifest's directory. Falls
/// back to the manifest's own unqualified package name, with the caller
/// expected to log a warning (`is_fallback` is returned so it can).
fn resolve_import_path(manifest_path: &Path, source: &str) -> (String, bool) {
    let manifest_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    if let Some((module_path, module_root)) = find_module_manifest(manifest_dir) {
        let rel = pathdiff::diff_paths(manifest_dir, &module_root).unwrap_or_default();
        let rel_str = to_forward_slash(&rel);
        let import_path = if rel_str.is_empty() {
            module_path
        } else {
            format!("{module_path}/{rel_str}")
        };
        (import_path, false)
    } else {
        let pkg = parse_package_name(source).unwrap_or_else(|| "main".to_string());
        (pkg, true)
    }
}

fn find_module_manifest(start_dir: &Path) -> Option<(String, PathBuf)> {
    let mut dir = start_dir;
    loop {
        let candidate = dir.join(MODULE_MANIFEST_FILE);
        if candidate.is_file() {
            let text = fs::read_to_string(&candidate).ok()?;
            let module_path = text
                .lines()
                .find_map(|l| l.trim().strip_prefix("module ").map(str::trim))?;
            return Some((module_path.to_string(), dir.to_path_buf()));
        }
        dir = dir.parent()?;
    }
}

fn to_forward_slash(p: &Path) -> String {
    p.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn reads_before_after_directive() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "go.mod", "module example.com/demo\n\ngo 1.20\n");
        write(
            dir.path(),
            "hooks/manifest.go",
            r#"
package hooks

func ProvideHooks() []Directive {
    return []Directive{
        {
            Target: Target{Package: "main", Function: "foo"},
            Hooks:  &Hooks{Before: "BeforeFoo", After: "AfterFoo"},
        },
    }
}
"#,
        );
        let manifest = read_manifest(&dir.path().join("hooks/manifest.go")).unwrap();
        assert_eq!(manifest.directives.len(), 1);
        let d = &manifest.directives[0];
        assert_eq!(d.package, "main");
        assert_eq!(d.function, "foo");
        assert_eq!(d.receiver, None);
        assert_eq!(d.kind, HookKind::BeforeAfter);
        assert_eq!(manifest.import_path, "example.com/demo/hooks");
        assert!(!manifest.import_path_is_fallback);
    }

    #[test]
    fn missing_module_manifest_falls_back_to_package_name() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "manifest.go",
            r#"
package hooks

func ProvideHooks() []Directive {
    return []Directive{
        {Target: Target{Package: "main", Function: "foo"}, Rewrite: &Rewrite{Fn: myRewrite}},
    }
}
"#,
        );
        let manifest = read_manifest(&dir.path().join("manifest.go")).unwrap();
        assert!(manifest.import_path_is_fallback);
        assert_eq!(manifest.import_path, "hooks");
        assert_eq!(manifest.directives[0].kind, HookKind::Rewrite);
    }

    #[test]
    fn literal_without_target_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "manifest.go",
            r#"
package hooks

func ProvideHooks() []Directive {
    return []Directive{
        {Target: Target{Package: "main", Function: "foo"}, Hooks: &Hooks{}},
        {Hooks: &Hooks{}},
    }
}
"#,
        );
        let manifest = read_manifest(&dir.path().join("manifest.go")).unwrap();
        assert_eq!(manifest.directives.len(), 1);
    }

    #[test]
    fn missing_provide_hooks_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "manifest.go", "package hooks\n\nfunc other() {}\n");
        let err = read_manifest(&dir.path().join("manifest.go")).unwrap_err();
        assert!(matches!(err, HookError::ManifestMissingProvideHooks { .. }));
    }

    #[test]
    fn receiver_disambiguates_matches() {
        let d1 = HookDirective {
            package: "main".into(),
            function: "Run".into(),
            receiver: Some("S".into()),
            kind: HookKind::BeforeAfter,
            manifest_import_path: "example.com/demo".into(),
        };
        assert!(d1.matches("main", "Run", "S"));
        assert!(!d1.matches("main", "Run", "T"));
        assert!(!d1.matches("main", "Run", ""));
    }
}
