//! External command launched on every press
//!
//! The command is fire-and-forget: it inherits our stdio, and its exit status
//! is only logged from a detached reaper thread.

use std::io;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Reacts to a press transition
pub trait ActionDispatcher {
    /// Start the action without waiting for it
    fn dispatch(&mut self) -> io::Result<()>;
}

/// Runs an external program with fixed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv list; an empty list means no action
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl ActionDispatcher for CommandAction {
    fn dispatch(&mut self) -> io::Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        let pid = child.id();
        info!("Launched `{}` (pid {})", self.program, pid);

        std::thread::Builder::new()
            .name("action-reaper".to_string())
            .spawn(move || match child.wait() {
                Ok(status) => debug!("Action pid {} exited: {}", pid, status),
                Err(e) => warn!("Failed to wait for action pid {}: {}", pid, e),
            })?;

        Ok(())
    }
}

/// Dispatcher used when no command was given
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAction;

impl ActionDispatcher for NoAction {
    fn dispatch(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: ActionDispatcher + ?Sized> ActionDispatcher for Box<D> {
    fn dispatch(&mut self) -> io::Result<()> {
        (**self).dispatch()
    }
}
