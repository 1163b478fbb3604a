//! C3: source analyzer.

pub mod ast;
pub mod parser;

pub use ast::{is_exported, uppercase_first, Call, Field, FunctionInfo};
pub use parser::{extract_calls, extract_functions, parse_package_name, render_type};
