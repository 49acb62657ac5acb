//! Timer based reminder delivery.
//!
//! Every scheduled reminder is a tokio task sleeping until its fire time. Fired reminders are
//! sent to the [`DeliveryReader`] returned by [`TimerDispatcher::spawn`].
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use intramural_core::{Dispatcher, ReminderHandle, ReminderPayload};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::id;

/// A fired reminder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub handle: ReminderHandle,
    pub payload: ReminderPayload,
}

#[derive(Debug)]
pub struct DeliveryReader {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl DeliveryReader {
    /// Receives the next fired reminder. Returns `None` once the [`TimerDispatcher`] and all
    /// pending timers are dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

#[derive(Clone, Debug)]
pub struct TimerDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
    timers: Arc<Mutex<HashMap<ReminderHandle, JoinHandle<()>>>>,
    runtime: Handle,
}

impl TimerDispatcher {
    /// Creates a new `TimerDispatcher` spawning its timers on `runtime`.
    pub fn new(runtime: Handle) -> (Self, DeliveryReader) {
        let (tx, rx) = mpsc::unbounded_channel();

        (
            Self {
                tx,
                timers: Arc::default(),
                runtime,
            },
            DeliveryReader { rx },
        )
    }

    /// Creates a new `TimerDispatcher` on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn spawn() -> (Self, DeliveryReader) {
        Self::new(Handle::current())
    }

    /// Returns the number of reminders that have not fired yet.
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Dispatcher for TimerDispatcher {
    fn schedule_fire(&self, at: DateTime<Utc>, payload: ReminderPayload) -> ReminderHandle {
        let handle = ReminderHandle(id::REMINDER.generate());

        // Negative durations fail to convert; those fire immediately.
        let delay = (at - Utc::now()).to_std().unwrap_or_default();

        let tx = self.tx.clone();
        let timers = self.timers.clone();

        // The lock is held until the task is registered, so a timer firing right away cannot
        // remove its entry before it exists.
        let mut guard = self.timers.lock();

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            timers.lock().remove(&handle);

            if tx.send(Delivery { handle, payload }).is_err() {
                log::warn!("Dropping reminder {}: no reader", handle);
            }
        });

        guard.insert(handle, task);
        handle
    }

    fn cancel(&self, handle: ReminderHandle) {
        if let Some(task) = self.timers.lock().remove(&handle) {
            log::debug!("Cancelling reminder {}", handle);
            task.abort();
        }
    }
}
