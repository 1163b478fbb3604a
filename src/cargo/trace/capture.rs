//! C2 (capture half): spawns the toolchain under verbose mode and persists
//! its trace to `build-metadata/`.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Config;
use crate::error::HookResult;
use crate::process::process;

pub const TRACE_LOG_NAME: &str = "go-build.log";
pub const TRACE_JSON_NAME: &str = "go-build.json";

/// Outcome of a capture: where the trace landed, and whether the toolchain
/// itself exited non-zero (not fatal — see spec §4.2).
pub struct CaptureOutcome {
    pub trace_path: PathBuf,
    pub toolchain_exit_code: i32,
    /// Only set in structured mode: how many JSON records were extracted.
    pub structured_record_count: Option<usize>,
}

/// One record of the toolchain's structured (`-json`) build output. Unknown
/// fields and records that fail to decode are ignored by the caller.
#[derive(Debug, Deserialize)]
struct BuildEvent {
    #[serde(rename = "ImportPath")]
    #[allow(dead_code)]
    import_path: Option<String>,
    #[serde(rename = "Action")]
    #[allow(dead_code)]
    action: Option<String>,
    #[serde(rename = "Package")]
    #[allow(dead_code)]
    package: Option<String>,
    #[serde(rename = "Output")]
    output: Option<String>,
}

/// Runs the toolchain in text mode: verbose command dump + keep-scratch +
/// force-rebuild flags, streamed to `build-metadata/go-build.log`.
pub fn capture_text(config: &Config, build_args: &[String]) -> HookResult<CaptureOutcome> {
    let metadata_dir = config.metadata_dir()?;
    let trace_path = metadata_dir.join(TRACE_LOG_NAME);

    let mut cmd = process(config.toolchain());
    cmd.arg("build")
        .arg("-a") // force rebuild of all packages
        .arg("-x") // print each executed command
        .arg("-work") // print the scratch directory as WORK=<path>
        .args(build_args)
        .cwd(config.cwd());

    log::debug!("capturing build trace via `{cmd}`");
    let (code, bytes) = cmd.exec_captured()?;
    fs::write(&trace_path, &bytes)?;
    log::info!(
        "wrote {} bytes of trace to {}",
        bytes.len(),
        trace_path.display()
    );

    Ok(CaptureOutcome {
        trace_path,
        toolchain_exit_code: code,
        structured_record_count: None,
    })
}

/// Runs the toolchain in structured mode: same flags plus `-json`. The
/// combined output is persisted as `go-build.json`, then every record's
/// `Output` field is concatenated into the same text trace format used by
/// `capture_text`, written to `go-build.log`.
pub fn capture_structured(config: &Config, build_args: &[String]) -> HookResult<CaptureOutcome> {
    let metadata_dir = config.metadata_dir()?;
    let json_path = metadata_dir.join(TRACE_JSON_NAME);
    let trace_path = metadata_dir.join(TRACE_LOG_NAME);

    let mut cmd = process(config.toolchain());
    cmd.arg("build")
        .arg("-a")
        .arg("-x")
        .arg("-work")
        .arg("-json")
        .args(build_args)
        .cwd(config.cwd());

    log::debug!("capturing structured build trace via `{cmd}`");
    let (code, bytes) = cmd.exec_captured()?;
    fs::write(&json_path, &bytes)?;

    let text = String::from_utf8_lossy(&bytes);
    let mut extracted = String::new();
    let mut count = 0usize;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BuildEvent>(line) {
            Ok(event) => {
                if let Some(output) = event.output {
                    extracted.push_str(&output);
                    if !output.ends_with('\n') {
                        extracted.push('\n');
                    }
                    count += 1;
                }
            }
            Err(e) => {
                log::warn!("skipping undecodable structured trace record: {e}");
            }
        }
    }

    fs::write(&trace_path, &extracted)?;
    log::info!("extracted {count} structured records into {}", trace_path.display());

    Ok(CaptureOutcome {
        trace_path,
        toolchain_exit_code: code,
        structured_record_count: Some(count),
    })
}
