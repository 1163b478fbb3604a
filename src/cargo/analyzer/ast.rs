//! Data model produced by the source analyzer (spec §3, §4.3).

use std::path::PathBuf;

/// A parameter or result type, rendered as a name (possibly empty for
/// unnamed parameters and all but the first of a shared-type group that the
/// parser has already expanded into one entry per name) and a canonical
/// type string (see `render_type` in `super::parser`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    /// Receiver type name, e.g. `S` or `*S`; empty for free functions.
    pub receiver: String,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub exported: bool,
    pub file: PathBuf,
    /// Byte offset of the `{` that opens the function body, and the offset
    /// one past the matching `}`. Used by the engine to splice the
    /// instrumentation pattern in without re-parsing.
    pub body_range: (usize, usize),
}

impl FunctionInfo {
    pub fn has_receiver(&self) -> bool {
        !self.receiver.is_empty()
    }
}

/// A call-site edge, supporting the out-of-scope call-graph view (spec
/// §4.3.2). Kept in the core because extraction shares the same walk as
/// `extract_functions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub caller: String,
    pub callee: String,
    pub package_qualifier: Option<String>,
    pub line: usize,
}

/// Whether an identifier is exported, per the target language's convention
/// of capitalizing the first letter (mirrors the Go rule the spec assumes).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Uppercases the first letter of `name`, used to derive externally-visible
/// trampoline identifiers (spec §4.5.3/§4.5.4).
pub fn uppercase_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
