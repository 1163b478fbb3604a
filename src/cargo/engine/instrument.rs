//! Instrumentation pattern insertion (spec §4.5.3): splices the fixed
//! before/after template into the top of each matched function's body.

use crate::analyzer::uppercase_first;
use crate::manifest::HookKind;

use super::matcher::Match;

/// Derives the trampoline identifier suffix for a matched function.
///
/// The source spec names trampolines after the uppercased function name
/// alone, which collides across receivers (spec §9 OQ-1). hookweave takes
/// the suggested fix: when a receiver is present, its sanitized form is
/// appended, so `(S) Run` and `(T) Run` get distinct trampolines
/// `Run_S`/`Run_T` instead of colliding on `Run`.
pub fn trampoline_name(function: &str, receiver: &str) -> String {
    let base = uppercase_first(function);
    if receiver.is_empty() {
        base
    } else {
        format!("{base}_{}", sanitize_receiver(receiver))
    }
}

fn sanitize_receiver(receiver: &str) -> String {
    receiver.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect()
}

/// The literal instrumentation pattern for trampoline `tramp`, indented to
/// sit at the top of a function body.
pub fn instrumentation_pattern(tramp: &str) -> String {
    format!(
        "\tif ctx{tramp}, _ := OtelBeforeTrampoline_{tramp}(); false {{\n\t}} else {{\n\t\tdefer OtelAfterTrampoline_{tramp}(ctx{tramp})\n\t}}\n"
    )
}

/// True if `body` already contains the before-trampoline call for `tramp`
/// (spec §4.5.3's idempotence rule: scan for an existing initializer before
/// inserting).
pub fn already_instrumented(body: &str, tramp: &str) -> bool {
    body.contains(&format!("OtelBeforeTrampoline_{tramp}("))
}

/// Splices the instrumentation pattern into `source` for every match whose
/// directive kind is `BeforeAfter`/`Both`. Matches are applied in
/// descending body-start order so earlier offsets remain valid as later
/// insertions shift the string (top-level function bodies never nest, so
/// this is safe without re-parsing between insertions).
pub fn instrument_source(source: &str, matches: &[&Match]) -> String {
    let mut out = source.to_string();
    let mut ordered: Vec<&&Match> = matches.iter().collect();
    ordered.sort_by(|a, b| b.function.body_range.0.cmp(&a.function.body_range.0));

    for m in ordered {
        if !matches!(m.directive.kind, HookKind::BeforeAfter | HookKind::Both) {
            continue;
        }
        let (body_start, body_end) = m.function.body_range;
        let body = &out[body_start..body_end];
        let tramp = trampoline_name(&m.function.name, &m.function.receiver);
        if already_instrumented(body, &tramp) {
            continue;
        }
        let insertion_point = body_start + 1; // just past the opening `{`
        let pattern = format!("\n{}", instrumentation_pattern(&tramp));
        out.insert_str(insertion_point, &pattern);
    }
    out
}
