//! End-to-end scenarios from spec §8, run against fixture trees built with
//! `tempfile` rather than the teacher's own `cargo-test-support` harness
//! (which assumes a `cargo`-shaped target binary).

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use hookweave::engine::run_pipeline;
use hookweave::manifest::{HookDirective, HookKind};
use hookweave::trace::{parse_trace, Command};

fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

fn directive(function: &str, receiver: Option<&str>) -> HookDirective {
    HookDirective {
        package: "main".to_string(),
        function: function.to_string(),
        receiver: receiver.map(str::to_string),
        kind: HookKind::BeforeAfter,
        manifest_import_path: "example.com/demo/hooks".to_string(),
    }
}

/// Scenario 2: two methods with the same name and different receivers;
/// only the named receiver is instrumented and gets its own trampoline.
#[test]
fn receiver_disambiguation_through_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let src = write(
        dir.path(),
        "src/main.go",
        "package main\n\ntype S struct{}\ntype T struct{}\n\nfunc (s S) Run() {\n\tprintln(\"s\")\n}\n\nfunc (t T) Run() {\n\tprintln(\"t\")\n}\n",
    );

    let commands = vec![
        Command::parse_line(&format!("echo WORK={}", work.display())),
        Command::parse_line(&format!(
            "/bin/compile -p main -o {}/b001/_pkg_.a -pack {}",
            work.display(),
            src.display()
        )),
    ];
    let directives = vec![directive("Run", Some("S"))];

    let (report, rewritten) = run_pipeline(&commands, &directives).unwrap();
    assert_eq!(report.files_instrumented, 1);
    assert_eq!(report.trampolines_emitted, 1);

    let instrumented = fs::read_to_string(work.join("b001").join("src").join("main.go")).unwrap();
    assert!(instrumented.contains("OtelBeforeTrampoline_Run_S"));
    assert!(!instrumented.contains("OtelBeforeTrampoline_Run_T"));

    let tramp_file = fs::read_to_string(work.join("b001").join("src").join("otel_trampolines.go")).unwrap();
    assert!(tramp_file.contains("OtelBeforeTrampoline_Run_S"));
    assert!(!tramp_file.contains("OtelBeforeTrampoline_Run_T"));

    let compile_cmd = &rewritten[1];
    assert!(compile_cmd.args.iter().any(|a| a.contains("otel_trampolines.go")));
}

/// Scenario 3: running the pipeline twice against the same input yields
/// byte-identical instrumented and trampoline files.
#[test]
fn idempotent_across_two_full_pipeline_runs() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    let src = write(dir.path(), "src/main.go", "package main\n\nfunc foo() {\n\tprintln(\"x\")\n}\n");

    let commands = vec![
        Command::parse_line(&format!("echo WORK={}", work.display())),
        Command::parse_line(&format!(
            "/bin/compile -p main -o {}/b001/_pkg_.a -pack {}",
            work.display(),
            src.display()
        )),
    ];
    let directives = vec![directive("foo", None)];

    let (_, rewritten_1) = run_pipeline(&commands, &directives).unwrap();
    let instrumented_path = work.join("b001").join("src").join("main.go");
    let tramp_path = work.join("b001").join("src").join("otel_trampolines.go");
    let first_instrumented = fs::read_to_string(&instrumented_path).unwrap();
    let first_tramp = fs::read_to_string(&tramp_path).unwrap();

    // Second run against the rewritten command list (which now points at the
    // already-instrumented file) must not double-insert the pattern.
    let (_, rewritten_2) = run_pipeline(&rewritten_1, &directives).unwrap();
    let second_instrumented = fs::read_to_string(&instrumented_path).unwrap();
    let second_tramp = fs::read_to_string(&tramp_path).unwrap();

    assert_eq!(first_instrumented, second_instrumented);
    assert_eq!(first_tramp, second_tramp);
    assert_eq!(rewritten_1, rewritten_2);
}

/// Scenario 5: a here-document in the trace is preserved exactly through
/// parse + rewrite, since it is never a compile command.
#[test]
fn heredoc_command_survives_rewrite_untouched() {
    let trace = "cat > $WORK/b005/importcfg << 'EOF'\npackagefile main=/x/main.a\nEOF\n";
    let commands = parse_trace(trace).unwrap();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].multiline);

    let (_, rewritten) = run_pipeline(&commands, &[]).unwrap();
    assert_eq!(rewritten, commands);
    assert_eq!(rewritten[0].raw, commands[0].raw);
}

/// Scenario 6: a malformed (truncated) trace with no WORK= token at all is
/// not fatal — the pipeline reports it and passes commands through.
#[test]
fn partial_trace_without_work_token_is_non_fatal() {
    let trace = "/bin/compile -p main -o b001/_pkg_.a -pack main.go\n";
    let commands = parse_trace(trace).unwrap();
    let (report, rewritten) = run_pipeline(&commands, &[]).unwrap();
    assert_eq!(rewritten, commands);
    assert!(!report.warnings.is_empty());
}
