//! A small process-spawning builder, in the style of cargo's
//! `util::ProcessBuilder`: accumulate a program, args, env, and cwd, then
//! spawn it either capturing output or inheriting the parent's stdio.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::HookError;

#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(String, OsString)>,
    cwd: Option<PathBuf>,
}

pub fn process<T: AsRef<OsStr>>(cmd: T) -> ProcessBuilder {
    ProcessBuilder {
        program: cmd.as_ref().to_os_string(),
        args: Vec::new(),
        env: Vec::new(),
        cwd: None,
    }
}

impl ProcessBuilder {
    pub fn arg<T: AsRef<OsStr>>(&mut self, arg: T) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<T: AsRef<OsStr>>(&mut self, args: impl IntoIterator<Item = T>) -> &mut Self {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    pub fn env<T: AsRef<OsStr>>(&mut self, key: &str, value: T) -> &mut Self {
        self.env.push((key.to_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn cwd<T: AsRef<Path>>(&mut self, cwd: T) -> &mut Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Spawns the process with inherited stdio and waits, returning the exit
    /// code regardless of success. Used for capture, where a non-zero exit is
    /// reported but not fatal (see `trace::capture`).
    pub fn exec_inherited(&self) -> Result<i32, HookError> {
        let mut cmd = self.build();
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        let status = cmd.status().map_err(|source| HookError::ToolchainLaunch {
            toolchain: self.program.to_string_lossy().into_owned(),
            source,
        })?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Spawns the process, capturing combined stdout+stderr into one buffer.
    /// `WriteColor`-free: callers redirect the bytes to a trace file.
    pub fn exec_captured(&self) -> Result<(i32, Vec<u8>), HookError> {
        let mut cmd = self.build();
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let child = cmd.spawn().map_err(|source| HookError::ToolchainLaunch {
            toolchain: self.program.to_string_lossy().into_owned(),
            source,
        })?;
        let Output {
            status,
            mut stdout,
            stderr,
        } = child
            .wait_with_output()
            .map_err(|source| HookError::ToolchainLaunch {
                toolchain: self.program.to_string_lossy().into_owned(),
                source,
            })?;
        stdout.extend_from_slice(&stderr);
        Ok((status.code().unwrap_or(-1), stdout))
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }
}

impl std::fmt::Display for ProcessBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
