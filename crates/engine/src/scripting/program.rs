use thiserror::Error;

use super::ops::Command;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("{command} at {at} jumps to {target}, past the end of a {len}-command script")]
    JumpOutOfRange {
        command: &'static str,
        at: usize,
        target: usize,
        len: usize,
    },
}

/// Validated command list of one life or move script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptProgram {
    commands: Vec<Command>,
}

impl ScriptProgram {
    pub fn compile(commands: Vec<Command>) -> Result<Self, ScriptError> {
        let len = commands.len();
        for (at, command) in commands.iter().enumerate() {
            if let Some(target) = command.jump_target() {
                if target > len {
                    return Err(ScriptError::JumpOutOfRange {
                        command: command.name(),
                        at,
                        target,
                        len,
                    });
                }
            }
        }
        Ok(Self { commands })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScriptStatus {
    #[default]
    Running,
    Halted,
}

/// Execution state of one script instance: the instruction pointer plus the
/// latches of `ONE_IF` and `SWITCH_IF` commands, keyed by command index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptState {
    pub(crate) ip: usize,
    pub(crate) status: ScriptStatus,
    pub(crate) one_if_spent: Vec<bool>,
    pub(crate) switch_if_last: Vec<bool>,
}

impl ScriptState {
    fn for_len(len: usize) -> Self {
        Self {
            ip: 0,
            status: ScriptStatus::Running,
            one_if_spent: vec![false; len],
            switch_if_last: vec![false; len],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub(crate) program: ScriptProgram,
    pub(crate) state: ScriptState,
}

impl Script {
    pub fn new(program: ScriptProgram) -> Self {
        let state = ScriptState::for_len(program.len());
        Self { program, state }
    }

    pub fn program(&self) -> &ScriptProgram {
        &self.program
    }

    pub fn ip(&self) -> usize {
        self.state.ip
    }

    pub fn status(&self) -> ScriptStatus {
        self.state.status
    }

    /// Back to the entry point with fresh latches; suspended progress is discarded.
    pub fn reset(&mut self) {
        self.state = ScriptState::for_len(self.program.len());
    }
}
