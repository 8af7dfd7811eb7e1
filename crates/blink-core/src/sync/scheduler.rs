//! Debounced push scheduling
//!
//! A spawned worker owns the one pending debounce deadline. Commands arrive
//! over a channel; state changes go out on a `watch` channel and completion
//! notices on the event channel.
//!
//! ```text
//! Idle --mutation--> Debouncing --timer--> Pushing --ok--> Idle
//!                         ^                    |
//!                         +--mutation----------+--err--> PendingRetry
//! ```
//!
//! A failed push is not retried on a timer. The host calls
//! `connectivity_restored()` or `became_visible()` and the worker re-arms the
//! debounce if a push is pending.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::context::SyncContext;
use super::SyncEvent;

/// Quiet period before a burst of mutations is pushed
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Push scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    /// Nothing to push
    Idle,
    /// Waiting for the debounce timer
    Debouncing,
    /// Fetch/merge/write in progress
    Pushing,
    /// Last push failed; waiting for a retry signal
    PendingRetry,
}

/// Commands sent to the push worker
#[derive(Debug)]
enum PushCommand {
    /// Local document changed
    Mutated,
    /// Push now, reporting success
    Upload(oneshot::Sender<bool>),
    /// Host is back online
    ConnectivityRestored,
    /// Host view is in the foreground again
    BecameVisible,
    /// Stop the worker
    Shutdown,
}

/// Handle to the push worker
pub struct PushScheduler {
    command_tx: mpsc::UnboundedSender<PushCommand>,
    state_rx: watch::Receiver<PushState>,
    task: JoinHandle<()>,
}

impl PushScheduler {
    /// Spawn the push worker
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        context: SyncContext,
        debounce: Duration,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PushState::Idle);

        let worker = PushWorker {
            context,
            debounce,
            events,
            state_tx,
            retry_pending: false,
        };
        let task = tokio::spawn(worker.run(command_rx));

        Self {
            command_tx,
            state_rx,
            task,
        }
    }

    /// Current state
    pub fn state(&self) -> PushState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PushState> {
        self.state_rx.clone()
    }

    /// Arm (or re-arm) the debounce timer
    pub fn push_soon(&self) {
        self.send(PushCommand::Mutated);
    }

    /// Cancel any pending debounce and push immediately
    ///
    /// Returns true if the push succeeded.
    pub async fn upload(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if !self.send(PushCommand::Upload(reply_tx)) {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Retry a failed push now that the network is back
    pub fn connectivity_restored(&self) {
        self.send(PushCommand::ConnectivityRestored);
    }

    /// Retry a failed push now that the view is visible
    pub fn became_visible(&self) {
        self.send(PushCommand::BecameVisible);
    }

    /// Stop the worker and wait for it to exit
    ///
    /// Pending debounced pushes are dropped; call `upload()` first to flush.
    pub async fn shutdown(self) {
        self.send(PushCommand::Shutdown);
        if let Err(e) = self.task.await {
            warn!("Push worker ended abnormally: {}", e);
        }
    }

    fn send(&self, command: PushCommand) -> bool {
        match self.command_tx.send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!("Push worker is not running, dropped {:?}", e.0);
                false
            }
        }
    }
}

struct PushWorker {
    context: SyncContext,
    debounce: Duration,
    events: broadcast::Sender<SyncEvent>,
    state_tx: watch::Sender<PushState>,
    retry_pending: bool,
}

impl PushWorker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<PushCommand>) {
        let mut deadline: Option<Instant> = None;

        loop {
            let command = tokio::select! {
                command = commands.recv() => command,
                _ = wait_until(deadline) => {
                    deadline = None;
                    self.push().await;
                    continue;
                }
            };

            match command {
                Some(PushCommand::Mutated) => {
                    deadline = Some(self.arm());
                }
                Some(PushCommand::Upload(reply)) => {
                    deadline = None;
                    let ok = self.push().await;
                    let _ = reply.send(ok);
                }
                Some(PushCommand::ConnectivityRestored | PushCommand::BecameVisible) => {
                    if self.retry_pending {
                        debug!("Retrying pending push");
                        deadline = Some(self.arm());
                    }
                }
                Some(PushCommand::Shutdown) | None => break,
            }
        }

        debug!("Push worker stopped");
    }

    fn arm(&self) -> Instant {
        self.set_state(PushState::Debouncing);
        Instant::now() + self.debounce
    }

    async fn push(&mut self) -> bool {
        self.set_state(PushState::Pushing);

        match self.context.push().await {
            Ok(()) => {
                self.retry_pending = false;
                self.set_state(PushState::Idle);
                self.emit(SyncEvent::success("Synced"));
                true
            }
            Err(e) => {
                if e.is_transient() {
                    warn!("Failed pushing to remote, will retry: {}", e);
                } else {
                    warn!("Failed pushing to remote: {}", e);
                }
                self.retry_pending = true;
                self.set_state(PushState::PendingRetry);
                self.emit(SyncEvent::error("Sync push failed"));
                false
            }
        }
    }

    fn set_state(&self, state: PushState) {
        let _ = self.state_tx.send(state);
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

/// Sleep until the deadline, or forever if none is armed
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
