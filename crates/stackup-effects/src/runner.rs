//! External process execution behind a swappable runner.

use std::fmt::{self, Display, Formatter};
use std::io::Write;
use std::process::{Child, Command, ExitStatus, Output, Stdio};

use serde::Serialize;

use crate::error::{EffectError, EffectResult};
use crate::plan::PlannedEffect;

/// Program plus arguments, without a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    /// Command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn planned(&self, kind: &'static str) -> PlannedEffect {
        PlannedEffect::new(kind).arg(self.argv())
    }

    fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl Display for CommandSpec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.program)?;
        for arg in &self.args {
            write!(formatter, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, absent when killed by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Turn a non-zero exit into [`EffectError::CommandFailed`].
    ///
    /// # Errors
    ///
    /// Returns an error when the process did not exit with status zero.
    pub fn check(self, program: &str) -> EffectResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(EffectError::CommandFailed {
                program: program.to_string(),
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    fn from_output(output: Output) -> Self {
        Self::from_parts(
            output.status,
            &output.stdout,
            &output.stderr,
        )
    }

    fn from_parts(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            status: status.code(),
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }
}

/// A started process waiting for answers on stdin.
pub trait InteractiveProcess {
    /// Write `input` to stdin, close it, and wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error when stdin cannot be written or the process cannot be awaited.
    fn communicate(self: Box<Self>, input: &str) -> EffectResult<CommandOutput>;
}

/// Runs external programs on behalf of the dispatcher.
pub trait CommandRunner {
    /// Run `command` to completion with no stdin and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error when the program cannot be started.
    fn run(&mut self, command: &CommandSpec) -> EffectResult<CommandOutput>;

    /// Start `command` with a piped stdin.
    ///
    /// # Errors
    ///
    /// Returns an error when the program cannot be started.
    fn spawn(&mut self, command: &CommandSpec) -> EffectResult<Box<dyn InteractiveProcess>>;
}

/// Runner backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&mut self, command: &CommandSpec) -> EffectResult<CommandOutput> {
        let output = command
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|source| EffectError::spawn(command.program(), source))?;
        Ok(CommandOutput::from_output(output))
    }

    fn spawn(&mut self, command: &CommandSpec) -> EffectResult<Box<dyn InteractiveProcess>> {
        let child = command
            .to_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EffectError::spawn(command.program(), source))?;
        Ok(Box::new(SystemProcess {
            program: command.program().to_string(),
            child,
        }))
    }
}

struct SystemProcess {
    program: String,
    child: Child,
}

impl InteractiveProcess for SystemProcess {
    fn communicate(self: Box<Self>, input: &str) -> EffectResult<CommandOutput> {
        let Self { program, mut child } = *self;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|source| EffectError::spawn(&program, source))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|source| EffectError::spawn(&program, source))?;
        Ok(CommandOutput::from_output(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn command_spec_renders_like_a_shell_line() {
        let command = CommandSpec::new("a2enmod").arg("rewrite");
        assert_eq!(command.to_string(), "a2enmod rewrite");
        assert_eq!(
            command.planned("run").to_string(),
            "run([\"a2enmod\", \"rewrite\"])"
        );
    }

    #[test]
    fn check_maps_non_zero_exit_to_failure() {
        let output = CommandOutput {
            status: Some(1),
            stdout: String::new(),
            stderr: "ERROR 1007: database exists\n".to_string(),
        };
        let Err(err) = output.check("mysql") else {
            panic!("expected a failing exit status to be rejected");
        };
        assert!(matches!(
            err,
            EffectError::CommandFailed { ref program, status: Some(1), ref stderr }
                if program == "mysql" && stderr == "ERROR 1007: database exists"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output() -> Result<()> {
        let mut runner = SystemCommandRunner;
        let output = runner.run(&CommandSpec::new("sh").args(["-c", "echo provisioned"]))?;
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "provisioned");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_feeds_answers_on_stdin() -> Result<()> {
        let mut runner = SystemCommandRunner;
        let process = runner.spawn(&CommandSpec::new("cat"))?;
        let output = process.communicate("CA\nNova Scotia\n")?;
        assert_eq!(output.stdout, "CA\nNova Scotia\n");
        Ok(())
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let mut runner = SystemCommandRunner;
        let result = runner.run(&CommandSpec::new("stackup-definitely-missing-binary"));
        assert!(matches!(result, Err(EffectError::CommandSpawn { .. })));
    }
}
