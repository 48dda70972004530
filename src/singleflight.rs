//! Single-flight task coordination.
//!
//! Two coordinators, both guaranteeing at most one task body executing per
//! instance at any instant, with different semantics for what happens to the
//! callers that did not start the body:
//!
//! - [`SupersedingRunner`]: a new caller cancels the active task, waits for
//!   it to fully stop, then runs. The superseded caller observes
//!   [`RunOutcome::Superseded`] instead of its result.
//! - [`JoiningRunner`]: a new caller attaches to the active task and awaits
//!   its result instead of starting a duplicate. Joiners never observe a
//!   cancellation.

use std::sync::Mutex;

use tokio::sync::watch;
use tracing::debug;

/// Result of a [`SupersedingRunner::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    /// The body ran to completion.
    Completed(T),
    /// A later caller superseded this task before its body finished.
    Superseded,
}

impl<T> RunOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            RunOutcome::Completed(value) => Some(value),
            RunOutcome::Superseded => None,
        }
    }
}

/// Cooperative cancellation signal handed to a superseding runner's body.
///
/// The body is also dropped at its next suspension point when superseded,
/// so checking the signal is only needed around non-async critical work.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

struct ActiveTask {
    cancel: watch::Sender<bool>,
    finished: watch::Receiver<bool>,
}

/// Cancel-previous-then-run coordinator.
#[derive(Default)]
pub struct SupersedingRunner {
    slot: Mutex<Option<ActiveTask>>,
}

impl SupersedingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `body`, first cancelling and waiting out any active task.
    ///
    /// When several callers race, exactly one installs itself; the others
    /// wait for the incumbent to stop, yield, and retry the install. The
    /// body receives a [`CancelSignal`] and is dropped at its next await
    /// point if a later caller supersedes it.
    pub async fn run<T, F, Fut>(&self, body: F) -> RunOutcome<T>
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = T>,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);

        // Install race: losers wait for the incumbent to finish, then retry.
        loop {
            let incumbent = {
                let mut slot = self.slot.lock().unwrap();
                match &*slot {
                    Some(active) => {
                        active.cancel.send_replace(true);
                        Some(active.finished.clone())
                    }
                    None => {
                        *slot = Some(ActiveTask {
                            cancel: cancel_tx.clone(),
                            finished: finished_rx.clone(),
                        });
                        None
                    }
                }
            };
            match incumbent {
                Some(mut finished) => {
                    debug!("superseding active task, waiting for it to stop");
                    let mut abandoned = false;
                    while !*finished.borrow_and_update() {
                        if finished.changed().await.is_err() {
                            abandoned = !*finished.borrow();
                            break;
                        }
                    }
                    if abandoned {
                        // Incumbent was dropped without ever finishing;
                        // clear its stale slot entry so the retry can win.
                        let mut slot = self.slot.lock().unwrap();
                        if let Some(active) = &*slot {
                            if active.finished.same_channel(&finished) {
                                *slot = None;
                            }
                        }
                    }
                    tokio::task::yield_now().await;
                }
                None => break,
            }
        }

        let mut cancel_watch = cancel_tx.subscribe();
        let outcome = tokio::select! {
            value = body(CancelSignal { rx: cancel_rx }) => RunOutcome::Completed(value),
            _ = async {
                while !*cancel_watch.borrow_and_update() {
                    if cancel_watch.changed().await.is_err() {
                        break;
                    }
                }
            } => RunOutcome::Superseded,
        };

        {
            let mut slot = self.slot.lock().unwrap();
            if let Some(active) = &*slot {
                if active.finished.same_channel(&finished_rx) {
                    *slot = None;
                }
            }
        }
        finished_tx.send_replace(true);
        outcome
    }
}

/// Join-previous-or-run coordinator.
///
/// The result type must be `Clone` because every joiner receives its own
/// copy of the winner's result.
pub struct JoiningRunner<T> {
    slot: Mutex<Option<watch::Receiver<Option<T>>>>,
}

impl<T> Default for JoiningRunner<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> JoiningRunner<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `body`, or joins an already-active run and awaits its result.
    ///
    /// If the active task completes between the check and the attach the
    /// published value is still observed through the watch channel; if the
    /// active task was abandoned before publishing, the caller clears the
    /// stale slot and retries rather than hanging.
    pub async fn run<F, Fut>(&self, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (result_tx, result_rx) = watch::channel(None);

        loop {
            let existing = {
                let mut slot = self.slot.lock().unwrap();
                match &*slot {
                    Some(rx) => Some(rx.clone()),
                    None => {
                        *slot = Some(result_rx.clone());
                        None
                    }
                }
            };

            let Some(mut rx) = existing else {
                break;
            };

            debug!("joining active task");
            loop {
                if let Some(value) = rx.borrow_and_update().clone() {
                    return value;
                }
                if rx.changed().await.is_err() {
                    // Winner abandoned without publishing; drop its stale
                    // slot entry and retry.
                    if let Some(value) = rx.borrow().clone() {
                        return value;
                    }
                    let mut slot = self.slot.lock().unwrap();
                    if let Some(active) = &*slot {
                        if active.same_channel(&rx) {
                            *slot = None;
                        }
                    }
                    break;
                }
            }
            tokio::task::yield_now().await;
        }

        let value = body().await;

        {
            let mut slot = self.slot.lock().unwrap();
            if let Some(active) = &*slot {
                if active.same_channel(&result_rx) {
                    *slot = None;
                }
            }
        }
        result_tx.send_replace(Some(value.clone()));
        value
    }
}
