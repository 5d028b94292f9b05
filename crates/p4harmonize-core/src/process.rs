use crate::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Captured result of an external tool invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Non-empty stderr lines, trimmed.
    pub fn stderr_lines(&self) -> impl Iterator<Item = &str> {
        self.stderr.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// An external command (`git`, `p4`, GitDependencies) with optional stdin.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    input: Option<Vec<u8>>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            input: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("\"{}\"", a)
                } else {
                    a.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        command
    }

    fn spawn_error(&self, err: std::io::Error) -> Error {
        Error::Command {
            command: self.display(),
            message: format!("failed to start: {}", err),
        }
    }

    /// Run to completion, capturing stdout and stderr. A non-zero exit is not
    /// an error here; see [`ToolCommand::output_checked`].
    pub fn output(&self) -> Result<CommandOutput, Error> {
        debug!("{}", self.display());
        let mut command = self.command();
        command
            .stdin(if self.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| self.spawn_error(e))?;
        if let (Some(input), Some(mut stdin)) = (&self.input, child.stdin.take()) {
            stdin.write_all(input)?;
        }
        let output = child.wait_with_output()?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Like [`ToolCommand::output`], but a non-zero exit becomes [`Error::Command`].
    pub fn output_checked(&self) -> Result<CommandOutput, Error> {
        let output = self.output()?;
        if !output.success() {
            return Err(Error::Command {
                command: self.display(),
                message: match output.stderr.trim() {
                    "" => format!("exited with code {}", output.code.unwrap_or(-1)),
                    stderr => stderr.to_string(),
                },
            });
        }
        Ok(output)
    }

    /// Run with inherited stdio, for tools whose progress the user should see.
    pub fn status(&self) -> Result<(), Error> {
        debug!("{}", self.display());
        let status = self
            .command()
            .status()
            .map_err(|e| self.spawn_error(e))?;
        if !status.success() {
            return Err(Error::Command {
                command: self.display(),
                message: format!("exited with code {}", status.code().unwrap_or(-1)),
            });
        }
        Ok(())
    }
}
