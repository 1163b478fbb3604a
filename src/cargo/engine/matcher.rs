//! Per-command matching: functions recovered by the analyzer against
//! directives recovered by the manifest reader (spec §4.5.2).

use crate::analyzer::FunctionInfo;
use crate::manifest::HookDirective;

/// One `(function, directive)` pairing for a single compile command's
/// package. Kept together because the engine needs both to decide the
/// trampoline name and instrumentation kind.
#[derive(Debug, Clone)]
pub struct Match {
    pub function: FunctionInfo,
    pub directive: HookDirective,
}

/// Matches every function in `functions` (all declared in package `pkg`)
/// against `directives`, keeping the first directive that matches each
/// function (spec §3's matching rule: package, function name, and receiver
/// — empty receiver on both sides counts as a match).
pub fn match_file(pkg: &str, functions: Vec<FunctionInfo>, directives: &[HookDirective]) -> Vec<Match> {
    let mut out = Vec::new();
    for function in functions {
        if let Some(directive) = directives
            .iter()
            .find(|d| d.matches(pkg, &function.name, &function.receiver))
        {
            out.push(Match {
                function,
                directive: directive.clone(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::HookKind;
    use std::path::PathBuf;

    fn func(name: &str, receiver: &str) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            receiver: receiver.to_string(),
            params: Vec::new(),
            results: Vec::new(),
            exported: true,
            file: PathBuf::from("f.go"),
            body_range: (0, 1),
        }
    }

    fn directive(function: &str, receiver: Option<&str>, kind: HookKind) -> HookDirective {
        HookDirective {
            package: "main".to_string(),
            function: function.to_string(),
            receiver: receiver.map(str::to_string),
            kind,
            manifest_import_path: "example.com/demo".to_string(),
        }
    }

    #[test]
    fn matches_only_the_named_receiver() {
        let functions = vec![func("Run", "S"), func("Run", "T")];
        let directives = vec![directive("Run", Some("S"), HookKind::BeforeAfter)];
        let matches = match_file("main", functions, &directives);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].function.receiver, "S");
    }

    #[test]
    fn free_function_requires_empty_receiver_directive() {
        let functions = vec![func("foo", "")];
        let directives = vec![directive("foo", None, HookKind::BeforeAfter)];
        let matches = match_file("main", functions, &directives);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn no_match_when_package_absent_from_directives() {
        let functions = vec![func("foo", "")];
        let directives = vec![HookDirective {
            package: "other".to_string(),
            function: "foo".to_string(),
            receiver: None,
            kind: HookKind::BeforeAfter,
            manifest_import_path: "example.com/demo".to_string(),
        }];
        assert!(match_file("main", functions, &directives).is_empty());
    }
}
