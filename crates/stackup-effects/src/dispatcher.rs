//! Uniform entry point for every side effect.
//!
//! # Design
//! - The execution mode is fixed when the dispatcher is built and never changes.
//! - Dry runs touch neither the filesystem nor processes; they journal and echo.
//! - Live runs log each effect at debug level and return the operation's value.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use stackup_patch::{MatchCount, PatchOp, PatchSpec};
use tracing::{debug, info};

use crate::error::{EffectError, EffectResult};
use crate::fsops;
use crate::plan::{ArgValue, ExecutionMode, Outcome, PlannedEffect};
use crate::runner::{
    CommandOutput, CommandRunner, CommandSpec, InteractiveProcess, SystemCommandRunner,
};

/// Runs or describes side effects according to its [`ExecutionMode`].
pub struct Dispatcher {
    mode: ExecutionMode,
    runner: Box<dyn CommandRunner>,
    echo: Option<Box<dyn Write>>,
    journal: Vec<PlannedEffect>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("mode", &self.mode)
            .field("echo", &self.echo.is_some())
            .field("journal", &self.journal.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Dispatcher that runs real processes and echoes plans to stdout.
    #[must_use]
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            runner: Box::new(SystemCommandRunner),
            echo: Some(Box::new(io::stdout())),
            journal: Vec::new(),
        }
    }

    /// Replace the process runner.
    #[must_use]
    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Echo planned effects to `writer` instead of stdout.
    #[must_use]
    pub fn with_echo(mut self, writer: impl Write + 'static) -> Self {
        self.echo = Some(Box::new(writer));
        self
    }

    /// Keep planned effects in the journal only.
    #[must_use]
    pub fn without_echo(mut self) -> Self {
        self.echo = None;
        self
    }

    /// Mode chosen at construction.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Effects recorded so far, in call order.
    #[must_use]
    pub fn journal(&self) -> &[PlannedEffect] {
        &self.journal
    }

    /// Consume the dispatcher and return its journal.
    #[must_use]
    pub fn into_journal(self) -> Vec<PlannedEffect> {
        self.journal
    }

    /// Run `operation` in live mode, or record `effect` and skip it in a dry run.
    ///
    /// # Errors
    ///
    /// Returns the operation's error, or an IO error when the plan cannot be echoed.
    pub fn invoke<T, F>(&mut self, effect: PlannedEffect, operation: F) -> EffectResult<Outcome<T>>
    where
        F: FnOnce() -> EffectResult<T>,
    {
        if self.admit(effect)? {
            operation().map(Outcome::Performed)
        } else {
            Ok(Outcome::Suppressed)
        }
    }

    /// Record an effect whose live counterpart never existed because its input was suppressed.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the plan cannot be echoed.
    pub fn describe(&mut self, effect: PlannedEffect) -> EffectResult<()> {
        self.record(effect)
    }

    fn admit(&mut self, effect: PlannedEffect) -> EffectResult<bool> {
        match self.mode {
            ExecutionMode::Live => {
                debug!(effect = %effect, "performing effect");
                Ok(true)
            }
            ExecutionMode::DryRun => {
                self.record(effect)?;
                Ok(false)
            }
        }
    }

    fn record(&mut self, effect: PlannedEffect) -> EffectResult<()> {
        info!(effect = %effect, "effect suppressed");
        if let Some(echo) = self.echo.as_mut() {
            writeln!(echo, "{effect}")
                .and_then(|()| echo.flush())
                .map_err(|source| EffectError::io("dispatcher.echo", "<echo>", source))?;
        }
        self.journal.push(effect);
        Ok(())
    }

    /// Apply a patch to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::Patch`] when the patch engine fails.
    pub fn patch(&mut self, path: &Path, spec: &PatchSpec) -> EffectResult<Outcome<MatchCount>> {
        let effect = planned_patch(path, spec);
        self.invoke(effect, || {
            stackup_patch::apply(path, spec).map_err(|source| EffectError::Patch {
                path: path.to_path_buf(),
                source,
            })
        })
    }

    /// Run an external command; a non-zero exit is an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the program cannot start or exits unsuccessfully.
    pub fn run_command(&mut self, command: &CommandSpec) -> EffectResult<Outcome<CommandOutput>> {
        if !self.admit(command.planned("run"))? {
            return Ok(Outcome::Suppressed);
        }
        let output = self.runner.run(command)?;
        output.check(command.program()).map(Outcome::Performed)
    }

    /// Start an interactive command whose answers are fed later with [`Self::feed_answers`].
    ///
    /// # Errors
    ///
    /// Returns an error when the program cannot start.
    pub fn spawn_interactive(
        &mut self,
        command: &CommandSpec,
    ) -> EffectResult<Outcome<Box<dyn InteractiveProcess>>> {
        if !self.admit(command.planned("spawn"))? {
            return Ok(Outcome::Suppressed);
        }
        self.runner.spawn(command).map(Outcome::Performed)
    }

    /// Feed `answers` to a spawned process and wait for it; a non-zero exit is an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the answers cannot be delivered or the process fails.
    pub fn feed_answers(
        &mut self,
        program: &str,
        process: Box<dyn InteractiveProcess>,
        answers: &str,
    ) -> EffectResult<Outcome<CommandOutput>> {
        let effect = PlannedEffect::new("communicate")
            .arg(program)
            .named("input", answers);
        self.invoke(effect, || process.communicate(answers)?.check(program))
    }

    /// Download `url` into `directory` with `wget`.
    ///
    /// # Errors
    ///
    /// Returns an error when `wget` cannot start or fails.
    pub fn download(&mut self, url: &str, directory: &Path) -> EffectResult<Outcome<()>> {
        let command = CommandSpec::new("wget")
            .arg("--quiet")
            .arg(format!("--directory-prefix={}", directory.display()))
            .arg(url);
        let effect = PlannedEffect::new("download")
            .arg(url)
            .named("directory", directory);
        if !self.admit(effect)? {
            return Ok(Outcome::Suppressed);
        }
        self.runner
            .run(&command)?
            .check(command.program())
            .map(|_| Outcome::Performed(()))
    }

    /// Extract a zip archive into `target`; returns the number of files written.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive is unreadable or an entry escapes `target`.
    pub fn extract_zip(&mut self, archive: &Path, target: &Path) -> EffectResult<Outcome<usize>> {
        let effect = PlannedEffect::new("extract_zip").arg(archive).arg(target);
        self.invoke(effect, || fsops::extract_zip(archive, target))
    }

    /// Remove every non-hidden entry of `dir`; returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error when an entry cannot be removed.
    pub fn purge_dir(&mut self, dir: &Path) -> EffectResult<Outcome<usize>> {
        let effect = PlannedEffect::new("purge_dir").arg(dir);
        self.invoke(effect, || fsops::purge_dir(dir))
    }

    /// Move the contents of `source`, dot-entries included, into `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error when an entry cannot be moved.
    pub fn move_contents(
        &mut self,
        source: &Path,
        destination: &Path,
    ) -> EffectResult<Outcome<usize>> {
        let effect = PlannedEffect::new("move_contents")
            .arg(source)
            .arg(destination);
        self.invoke(effect, || fsops::move_contents(source, destination))
    }

    /// Change ownership of everything below `root`, excluding `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the owner or group is unknown or a chown fails.
    pub fn chown_tree(
        &mut self,
        root: &Path,
        owner: &str,
        group: &str,
    ) -> EffectResult<Outcome<usize>> {
        let effect = PlannedEffect::new("chown_tree")
            .arg(root)
            .named("user", owner)
            .named("group", group);
        self.invoke(effect, || fsops::chown_tree(root, owner, group))
    }

    /// Change ownership of a single path.
    ///
    /// # Errors
    ///
    /// Returns an error when the owner or group is unknown or the chown fails.
    pub fn chown(&mut self, path: &Path, owner: &str, group: &str) -> EffectResult<Outcome<()>> {
        let effect = PlannedEffect::new("chown")
            .arg(path)
            .named("user", owner)
            .named("group", group);
        self.invoke(effect, || fsops::chown_path(path, owner, group))
    }

    /// Set the permission bits of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the mode cannot be applied.
    pub fn chmod(&mut self, path: &Path, mode: u32) -> EffectResult<Outcome<()>> {
        let effect = PlannedEffect::new("chmod").arg(path).arg(ArgValue::Mode(mode));
        self.invoke(effect, || fsops::set_mode(path, mode))
    }

    /// Remove a single file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be removed.
    pub fn remove_file(&mut self, path: &Path) -> EffectResult<Outcome<()>> {
        let effect = PlannedEffect::new("remove_file").arg(path);
        self.invoke(effect, || fsops::remove_file(path))
    }

    /// Remove the empty directory `leaf` and its empty parents below `stop_at`.
    ///
    /// # Errors
    ///
    /// Returns an error when `leaf` cannot be removed.
    pub fn remove_empty_dirs(&mut self, leaf: &Path, stop_at: &Path) -> EffectResult<Outcome<usize>> {
        let effect = PlannedEffect::new("remove_empty_dirs")
            .arg(leaf)
            .named("stop_at", stop_at);
        self.invoke(effect, || fsops::remove_empty_dir_chain(leaf, stop_at))
    }
}

fn planned_patch(path: &Path, spec: &PatchSpec) -> PlannedEffect {
    let effect = PlannedEffect::new(spec.op().label());
    let effect = match spec.op() {
        PatchOp::LiteralReplace {
            needle,
            replacement,
        } => effect.arg(needle.as_str()).arg(replacement.as_str()),
        PatchOp::RegexReplace {
            pattern,
            replacement,
        } => effect.arg(pattern.as_str()).arg(replacement.as_str()),
        PatchOp::CommentOutMatching { pattern, marker } => {
            effect.arg(pattern.as_str()).named("marker", marker.as_str())
        }
        PatchOp::Append { fragments } => effect.arg(fragments.clone()),
    };
    effect
        .named("file", path)
        .named_opt("max", spec.limit())
        .named_opt("expect", spec.expected())
}
