//! Execution of external programs.

use darcflow_common::{DarcError, Result};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// One call of an external program.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// Program output is appended here as well as returned.
    pub log: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            log: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn log_to(mut self, log: impl Into<PathBuf>) -> Self {
        self.log = Some(log.into());
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs programs, sending Python scripts through an interpreter when one is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    python: Option<PathBuf>,
}

impl ToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_python<P: AsRef<Path>>(python: Option<P>) -> Self {
        Self {
            python: python.map(|p| p.as_ref().to_path_buf()),
        }
    }

    pub async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let name = invocation.program_name();
        info!("Running {}", name);
        debug!("{} {:?}", invocation.program.display(), invocation.args);

        // Bare names are looked up on PATH by the OS.
        if invocation.program.components().count() > 1 && !invocation.program.exists() {
            return Err(DarcError::MissingInput(invocation.program.clone()));
        }

        let is_script = invocation.program.extension().is_some_and(|ext| ext == "py");
        let mut cmd = match (&self.python, is_script) {
            (Some(python), true) => {
                let mut cmd = Command::new(python);
                cmd.arg(&invocation.program);
                cmd
            }
            _ => Command::new(&invocation.program),
        };
        cmd.args(&invocation.args).stdin(Stdio::null());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let output = match cmd.output().await {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DarcError::MissingInput(invocation.program.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if let Some(log) = &invocation.log {
            let mut file = OpenOptions::new().create(true).append(true).open(log)?;
            file.write_all(stdout.as_bytes())?;
            file.write_all(stderr.as_bytes())?;
        }

        if !output.status.success() {
            return Err(DarcError::ExternalToolFailure {
                program: name,
                status: output.status.to_string(),
                stderr: stderr.trim_end().to_string(),
            });
        }

        debug!("{} completed successfully", name);
        Ok(ToolOutput { stdout, stderr })
    }
}

/// Write `body` as an executable shell script, for tests that stand in for
/// the real programs.
#[cfg(all(test, unix))]
pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_captures_output_and_log() {
        let dir = tempdir().unwrap();
        let tool = fake_tool(dir.path(), "echoer", r#"echo "args: $*"; pwd; echo oops >&2"#);
        let log = dir.path().join("run.log");

        let out = ToolRunner::new()
            .run(
                &Invocation::new(&tool)
                    .args(["-protein", "1abc.pdb"])
                    .current_dir(dir.path())
                    .log_to(&log),
            )
            .await
            .unwrap();

        assert!(out.stdout.starts_with("args: -protein 1abc.pdb\n"));
        assert_eq!(out.stderr, "oops\n");
        let logged = fs::read_to_string(&log).unwrap();
        assert!(logged.contains("args: -protein 1abc.pdb"));
        assert!(logged.ends_with("oops\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_tool_failure() {
        let dir = tempdir().unwrap();
        let tool = fake_tool(dir.path(), "score.static.linuxgccrelease", "echo bad input >&2; exit 3");

        let err = ToolRunner::new().run(&Invocation::new(&tool)).await.unwrap_err();
        match err {
            DarcError::ExternalToolFailure { program, stderr, .. } => {
                assert_eq!(program, "score.static.linuxgccrelease");
                assert_eq!(stderr, "bad input");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempdir().unwrap();
        let err = ToolRunner::new()
            .run(&Invocation::new(dir.path().join("DARC.static.linuxgccrelease")))
            .await
            .unwrap_err();
        assert!(matches!(err, DarcError::MissingInput(_)));

        let err = ToolRunner::new()
            .run(&Invocation::new("darcflow-no-such-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, DarcError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_python_scripts_use_interpreter() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("molfile_to_params.py");
        fs::write(&script, "echo from-sh \"$@\"\n").unwrap();

        let out = ToolRunner::with_python(Some("/bin/sh"))
            .run(&Invocation::new(&script).args(["-n", "002"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "from-sh -n 002\n");
    }
}
