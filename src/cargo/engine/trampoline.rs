//! Trampoline file synthesis (spec §4.5.4): one `otel_trampolines.go` per
//! package that has at least one `before_after`/`both` match.

use std::collections::HashSet;

use crate::manifest::HookKind;

use super::instrument::trampoline_name;
use super::matcher::Match;

const HOOK_CONTEXT_INTERFACE: &str = r#"type HookContext interface {
	Value() any
	SetValue(v any)
	Get(key string) (any, bool)
	Set(key string, v any)
	Has(key string) bool
	Skip() bool
	SetSkip(skip bool)
	FuncName() string
	PkgName() string
}
"#;

/// Renders the full trampoline file text for one package. `matches` is
/// every match discovered for that package's compile command; duplicate
/// trampoline names (distinct calls that land on the same disambiguated
/// identifier) are only emitted once. Each match's `manifest_import_path`
/// binds its own weak externals, so matches from different manifests can
/// safely share one trampoline file.
pub fn render_trampoline_file(package_name: &str, matches: &[&Match]) -> String {
    let mut out = String::new();
    out.push_str(&format!("package {package_name}\n\n"));
    out.push_str("import (\n\t_ \"unsafe\"\n\n\t\"log\"\n)\n\n");
    out.push_str(HOOK_CONTEXT_INTERFACE);
    out.push('\n');

    let mut seen = HashSet::new();
    for m in matches {
        if !matches!(m.directive.kind, HookKind::BeforeAfter | HookKind::Both) {
            continue;
        }
        let tramp = trampoline_name(&m.function.name, &m.function.receiver);
        if !seen.insert(tramp.clone()) {
            continue;
        }
        out.push_str(&render_function_trampoline(
            &tramp,
            &m.function.name,
            package_name,
            &m.directive.manifest_import_path,
        ));
    }
    out
}

fn render_function_trampoline(tramp: &str, func_name: &str, pkg_name: &str, manifest_import_path: &str) -> String {
    format!(
        r#"
type HookContextImpl_{tramp} struct {{
	value any
	data  map[string]any
	skip  bool
	fn    string
	pkg   string
}}

func (c *HookContextImpl_{tramp}) Value() any                  {{ return c.value }}
func (c *HookContextImpl_{tramp}) SetValue(v any)               {{ c.value = v }}
func (c *HookContextImpl_{tramp}) Get(key string) (any, bool) {{
	v, ok := c.data[key]
	return v, ok
}}
func (c *HookContextImpl_{tramp}) Set(key string, v any) {{
	if c.data == nil {{
		c.data = make(map[string]any)
	}}
	c.data[key] = v
}}
func (c *HookContextImpl_{tramp}) Has(key string) bool {{
	_, ok := c.data[key]
	return ok
}}
func (c *HookContextImpl_{tramp}) Skip() bool               {{ return c.skip }}
func (c *HookContextImpl_{tramp}) SetSkip(skip bool)        {{ c.skip = skip }}
func (c *HookContextImpl_{tramp}) FuncName() string         {{ return c.fn }}
func (c *HookContextImpl_{tramp}) PkgName() string          {{ return c.pkg }}

func OtelBeforeTrampoline_{tramp}() (ctx *HookContextImpl_{tramp}, skip bool) {{
	ctx = &HookContextImpl_{tramp}{{fn: "{func_name}", pkg: "{pkg_name}"}}
	defer func() {{
		if r := recover(); r != nil {{
			log.Printf("hookweave: before hook for %s.%s panicked: %v", "{pkg_name}", "{func_name}", r)
		}}
	}}()
	if Before{tramp} != nil {{
		Before{tramp}(ctx)
	}}
	return ctx, ctx.skip
}}

func OtelAfterTrampoline_{tramp}(ctx HookContext) {{
	defer func() {{
		if r := recover(); r != nil {{
			log.Printf("hookweave: after hook for %s.%s panicked: %v", "{pkg_name}", "{func_name}", r)
		}}
	}}()
	if After{tramp} != nil {{
		After{tramp}(ctx)
	}}
}}

//go:linkname Before{tramp} {manifest_import_path}.Before{tramp}
var Before{tramp} func(HookContext)

//go:linkname After{tramp} {manifest_import_path}.After{tramp}
var After{tramp} func(HookContext)
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FunctionInfo;
    use crate::manifest::HookDirective;
    use std::path::PathBuf;

    fn make_match(name: &str, receiver: &str) -> Match {
        Match {
            function: FunctionInfo {
                name: name.to_string(),
                receiver: receiver.to_string(),
                params: Vec::new(),
                results: Vec::new(),
                exported: true,
                file: PathBuf::from("f.go"),
                body_range: (0, 1),
            },
            directive: HookDirective {
                package: "main".to_string(),
                function: name.to_string(),
                receiver: if receiver.is_empty() { None } else { Some(receiver.to_string()) },
                kind: HookKind::BeforeAfter,
                manifest_import_path: "example.com/demo/hooks".to_string(),
            },
        }
    }

    #[test]
    fn emits_weak_externals_and_linkname_pragma() {
        let m = make_match("foo", "");
        let text = render_trampoline_file("main", &[&m]);
        assert!(text.contains("package main"));
        assert!(text.contains("var BeforeFoo func(HookContext)"));
        assert!(text.contains("var AfterFoo func(HookContext)"));
        assert!(text.contains("//go:linkname BeforeFoo example.com/demo/hooks.BeforeFoo"));
    }

    #[test]
    fn receiver_collision_yields_one_pair_per_receiver() {
        let m_s = make_match("Run", "S");
        let m_t = make_match("Run", "T");
        let text = render_trampoline_file("main", &[&m_s, &m_t]);
        assert!(text.contains("OtelBeforeTrampoline_Run_S"));
        assert!(text.contains("OtelBeforeTrampoline_Run_T"));
    }

    #[test]
    fn skips_rewrite_only_matches() {
        let mut m = make_match("foo", "");
        m.directive.kind = HookKind::Rewrite;
        let text = render_trampoline_file("main", &[&m]);
        assert!(!text.contains("OtelBeforeTrampoline_Foo"));
    }
}
