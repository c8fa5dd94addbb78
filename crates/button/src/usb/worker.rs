//! Poll loop thread
//!
//! Dedicated thread that drives the claimed button: one poll round trip per
//! cycle, debounced into press/release transitions, with a wait of the
//! configured interval after every completed cycle. Only one USB transaction is
//! ever outstanding.
//!
//! The loop ends on a fatal transport error, or when the Tokio side sends
//! [`LoopCommand::Shutdown`]. A shutdown cuts the wait between cycles short; a
//! transfer already in flight still runs to its timeout.

use crate::action::ActionDispatcher;
use crate::usb::backend::UsbBackend;
use crate::usb::claim::ClaimedInterface;
use crate::usb::transfers::poll_once;
use common::{LoopCommand, PollChannels};
use protocol::{Debouncer, PollCycleOutcome, SessionError, Transition};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Source of poll cycle outcomes
pub trait Poller {
    fn poll_once(&mut self) -> PollCycleOutcome;
}

impl<B: UsbBackend> Poller for ClaimedInterface<B> {
    fn poll_once(&mut self) -> PollCycleOutcome {
        poll_once(self)
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Poll round trips started
    pub attempts: u64,
    /// Cycles that produced a sample
    pub samples: u64,
    /// Cycles whose read timed out
    pub timeouts: u64,
    /// Press transitions
    pub presses: u64,
    /// Release transitions
    pub releases: u64,
}

/// Poll loop state
///
/// The debounced button state is the only thing carried from one cycle to the
/// next.
pub struct PollWorker<P, D> {
    poller: P,
    dispatcher: D,
    channels: PollChannels,
    interval: Duration,
    debouncer: Debouncer,
    stats: PollStats,
}

impl<P: Poller, D: ActionDispatcher> PollWorker<P, D> {
    pub fn new(poller: P, dispatcher: D, channels: PollChannels, interval: Duration) -> Self {
        Self {
            poller,
            dispatcher,
            channels,
            interval,
            debouncer: Debouncer::new(),
            stats: PollStats::default(),
        }
    }

    /// Run until shutdown or a fatal transport error
    ///
    /// The poller (and with it the claimed interface) is dropped when this
    /// returns, on either path.
    pub fn run(mut self) -> Result<PollStats, SessionError> {
        info!("Poll loop started (interval {:?})", self.interval);

        loop {
            if let Some(LoopCommand::Shutdown) = self.channels.try_recv_command() {
                info!("Poll loop shutting down");
                break;
            }

            self.stats.attempts += 1;
            match self.poller.poll_once() {
                PollCycleOutcome::Sample(sample) => {
                    self.stats.samples += 1;
                    if let Some(transition) = self.debouncer.observe(sample) {
                        self.on_transition(transition);
                    }
                }
                PollCycleOutcome::TimedOut => {
                    self.stats.timeouts += 1;
                    trace!("No sample this cycle");
                }
                PollCycleOutcome::TransportError(failure) => {
                    error!("Stopping poll loop: {}", failure);
                    return Err(SessionError::Transport(failure));
                }
            }

            if let Some(LoopCommand::Shutdown) = self.channels.wait_command(self.interval) {
                info!("Poll loop shutting down");
                break;
            }
        }

        info!(
            "Poll loop stopped with button {:?}: {:?}",
            self.debouncer.state(),
            self.stats
        );
        Ok(self.stats)
    }

    fn on_transition(&mut self, transition: Transition) {
        debug!("Button {:?}", transition);

        match transition {
            Transition::Pressed => {
                self.stats.presses += 1;
                if let Err(e) = self.dispatcher.dispatch() {
                    warn!("Failed to launch action: {}", e);
                }
            }
            Transition::Released => self.stats.releases += 1,
        }

        if let Err(e) = self.channels.send_event(transition) {
            debug!("Transition not delivered: {}", e);
        }
    }
}

/// Spawn the poll loop thread
///
/// The worker is built on the calling thread and moved into a thread named
/// `button-poll`, which runs until shutdown or a fatal error.
pub fn spawn_poll_worker<P, D>(
    worker: PollWorker<P, D>,
) -> std::io::Result<std::thread::JoinHandle<Result<PollStats, SessionError>>>
where
    P: Poller + Send + 'static,
    D: ActionDispatcher + Send + 'static,
{
    std::thread::Builder::new()
        .name("button-poll".to_string())
        .spawn(move || worker.run())
}
