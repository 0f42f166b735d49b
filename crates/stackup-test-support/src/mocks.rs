//! Command runner doubles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use stackup_effects::{
    CommandOutput, CommandRunner, CommandSpec, EffectResult, InteractiveProcess,
};

type Hook = Box<dyn FnMut(&CommandSpec)>;

#[derive(Default)]
struct State {
    commands: Vec<CommandSpec>,
    answers: Vec<(String, String)>,
    statuses: HashMap<String, i32>,
    hooks: HashMap<String, Hook>,
}

/// Runner that records every command instead of starting processes.
///
/// Clones share state, so a test can keep one handle while the dispatcher owns another.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    state: Rc<RefCell<State>>,
}

impl RecordingRunner {
    /// Runner where every program exits with status zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `program` exit with `status`.
    #[must_use]
    pub fn with_status(self, program: &str, status: i32) -> Self {
        self.state
            .borrow_mut()
            .statuses
            .insert(program.to_string(), status);
        self
    }

    /// Run `hook` whenever `program` is invoked, e.g. to drop a downloaded file in place.
    #[must_use]
    pub fn with_hook(self, program: &str, hook: impl FnMut(&CommandSpec) + 'static) -> Self {
        self.state
            .borrow_mut()
            .hooks
            .insert(program.to_string(), Box::new(hook));
        self
    }

    /// Commands seen so far, spawned ones included.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.state.borrow().commands.clone()
    }

    /// Command lines seen so far, rendered as `program arg...`.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// `(program, stdin)` pairs delivered to spawned processes.
    #[must_use]
    pub fn answers(&self) -> Vec<(String, String)> {
        self.state.borrow().answers.clone()
    }

    fn record(&self, command: &CommandSpec) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        state.commands.push(command.clone());
        if let Some(hook) = state.hooks.get_mut(command.program()) {
            hook(command);
        }
        CommandOutput {
            status: Some(
                state
                    .statuses
                    .get(command.program())
                    .copied()
                    .unwrap_or(0),
            ),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, command: &CommandSpec) -> EffectResult<CommandOutput> {
        Ok(self.record(command))
    }

    fn spawn(&mut self, command: &CommandSpec) -> EffectResult<Box<dyn InteractiveProcess>> {
        let output = self.record(command);
        Ok(Box::new(RecordedProcess {
            program: command.program().to_string(),
            output,
            state: Rc::clone(&self.state),
        }))
    }
}

struct RecordedProcess {
    program: String,
    output: CommandOutput,
    state: Rc<RefCell<State>>,
}

impl InteractiveProcess for RecordedProcess {
    fn communicate(self: Box<Self>, input: &str) -> EffectResult<CommandOutput> {
        self.state
            .borrow_mut()
            .answers
            .push((self.program, input.to_string()));
        Ok(self.output)
    }
}
