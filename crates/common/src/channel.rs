//! Async channel bridge between Tokio runtime and the poll thread
//!
//! Commands also ring a doorbell so the poll thread can wait between cycles
//! and still react to a shutdown at once.

use async_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use protocol::Transition;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Commands from Tokio runtime to the poll thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Stop polling at the top of the next cycle and release the device
    Shutdown,
}

/// Wakes the poll thread out of its wait between cycles
#[derive(Default)]
struct Doorbell {
    lock: Mutex<()>,
    bell: Condvar,
}

impl Doorbell {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called after the command is queued
    fn ring(&self) {
        let _guard = self.lock();
        self.bell.notify_all();
    }
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct PollBridge {
    cmd_tx: Sender<LoopCommand>,
    event_rx: Receiver<Transition>,
    doorbell: Arc<Doorbell>,
}

impl PollBridge {
    /// Send a command to the poll thread
    pub async fn send_command(&self, cmd: LoopCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))?;
        self.doorbell.ring();
        Ok(())
    }

    /// Ask the poll thread to stop
    pub async fn shutdown(&self) -> crate::Result<()> {
        self.send_command(LoopCommand::Shutdown).await
    }

    /// Ask the poll thread to stop without awaiting (non-async callers)
    pub fn request_shutdown(&self) -> crate::Result<()> {
        self.cmd_tx
            .try_send(LoopCommand::Shutdown)
            .map_err(|e| crate::Error::Channel(e.to_string()))?;
        self.doorbell.ring();
        Ok(())
    }

    /// Receive the next transition from the poll thread
    ///
    /// Fails once the poll thread has exited and every queued event is drained.
    pub async fn recv_event(&self) -> crate::Result<Transition> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Take a queued transition if there is one
    pub fn try_recv_event(&self) -> Option<Transition> {
        self.event_rx.try_recv().ok()
    }
}

/// Handle for the poll thread (blocking)
pub struct PollChannels {
    cmd_rx: Receiver<LoopCommand>,
    event_tx: Sender<Transition>,
    doorbell: Arc<Doorbell>,
}

impl PollChannels {
    /// Try to receive a command without blocking
    ///
    /// A closed command channel means nobody can ask us to stop any more, which
    /// is reported as a shutdown.
    pub fn try_recv_command(&self) -> Option<LoopCommand> {
        match self.cmd_rx.try_recv() {
            Ok(cmd) => Some(cmd),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(LoopCommand::Shutdown),
        }
    }

    /// Wait up to `timeout` for a command
    ///
    /// Returns as soon as a command is queued, or `None` once the timeout
    /// passes. A bridge dropped mid-wait is only noticed when the timeout
    /// expires.
    pub fn wait_command(&self, timeout: Duration) -> Option<LoopCommand> {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.doorbell.lock();

        loop {
            // Checked under the lock, so a ring cannot slip in before the wait
            if let Some(cmd) = self.try_recv_command() {
                return Some(cmd);
            }

            guard = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return None;
                    }
                    self.doorbell
                        .bell
                        .wait_timeout(guard, remaining)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self
                    .doorbell
                    .bell
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Publish a transition to the Tokio runtime without blocking
    pub fn send_event(&self, event: Transition) -> crate::Result<()> {
        self.event_tx
            .try_send(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and the poll thread
///
/// Returns (PollBridge for Tokio, PollChannels for the poll thread)
pub fn create_poll_bridge() -> (PollBridge, PollChannels) {
    let (cmd_tx, cmd_rx) = bounded(16);
    let (event_tx, event_rx) = unbounded();
    let doorbell = Arc::new(Doorbell::default());

    (
        PollBridge {
            cmd_tx,
            event_rx,
            doorbell: doorbell.clone(),
        },
        PollChannels {
            cmd_rx,
            event_tx,
            doorbell,
        },
    )
}
