//! Match reminders
//!
//! When a match time is set, two reminders are scheduled before it: an early one (by default 24
//! hours before) and a late one (by default 1 hour before). Delivery is performed by a
//! [`Dispatcher`]; the tournament only records what was handed off and its status.
use chrono::{DateTime, Duration, Utc};

use crate::{Error, MatchId, ReminderHandle, Result, TournamentId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A transport that fires reminder payloads at a given time.
pub trait Dispatcher: Send + Sync {
    /// Schedules `payload` to be delivered at `at`. A time in the past is delivered
    /// immediately.
    fn schedule_fire(&self, at: DateTime<Utc>, payload: ReminderPayload) -> ReminderHandle;

    /// Cancels a scheduled reminder. Cancelling an already delivered reminder does nothing.
    fn cancel(&self, handle: ReminderHandle);
}

/// How long before the match each reminder fires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReminderOffsets {
    pub early: Duration,
    pub late: Duration,
}

impl ReminderOffsets {
    #[inline]
    pub fn new(early: Duration, late: Duration) -> Self {
        Self { early, late }
    }

    /// Returns the fire times of both reminders for a match at `scheduled`, or `None` if one
    /// of them is not representable.
    pub fn fire_times(
        &self,
        scheduled: DateTime<Utc>,
    ) -> Option<[(ReminderKind, DateTime<Utc>); 2]> {
        Some([
            (ReminderKind::Early, scheduled.checked_sub_signed(self.early)?),
            (ReminderKind::Late, scheduled.checked_sub_signed(self.late)?),
        ])
    }
}

impl Default for ReminderOffsets {
    fn default() -> Self {
        Self {
            early: Duration::hours(24),
            late: Duration::hours(1),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReminderKind {
    Early,
    Late,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReminderStatus {
    Pending,
    Sent,
    Cancelled,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reminder {
    pub kind: ReminderKind,
    pub fire_at: DateTime<Utc>,
    pub handle: ReminderHandle,
    pub status: ReminderStatus,
}

/// The payload handed to the [`Dispatcher`] and delivered back when the reminder fires.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReminderPayload {
    pub tournament: TournamentId,
    pub match_id: MatchId,
    pub scheduled: DateTime<Utc>,
    pub kind: ReminderKind,
}

/// The reminders derived from a single match time.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReminderSchedule {
    pub match_id: MatchId,
    pub scheduled: DateTime<Utc>,
    pub reminders: [Reminder; 2],
}

impl ReminderSchedule {
    /// Hands both reminders for a match at `scheduled` to `dispatcher`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReminderOutOfRange`] if a fire time is not representable. Nothing is
    /// handed to the dispatcher in that case.
    pub fn schedule(
        tournament: TournamentId,
        match_id: MatchId,
        scheduled: DateTime<Utc>,
        offsets: &ReminderOffsets,
        dispatcher: &dyn Dispatcher,
    ) -> Result<Self> {
        let fire_times = offsets
            .fire_times(scheduled)
            .ok_or(Error::ReminderOutOfRange(match_id))?;

        let reminders = fire_times.map(|(kind, fire_at)| {
            let handle = dispatcher.schedule_fire(
                fire_at,
                ReminderPayload {
                    tournament,
                    match_id,
                    scheduled,
                    kind,
                },
            );

            log::debug!(
                "Scheduled {:?} reminder {} for match {} at {}",
                kind,
                handle,
                match_id,
                fire_at
            );

            Reminder {
                kind,
                fire_at,
                handle,
                status: ReminderStatus::Pending,
            }
        });

        Ok(Self {
            match_id,
            scheduled,
            reminders,
        })
    }

    /// Cancels all pending reminders.
    pub fn cancel(&mut self, dispatcher: &dyn Dispatcher) {
        for reminder in self.reminders.iter_mut() {
            if reminder.status == ReminderStatus::Pending {
                dispatcher.cancel(reminder.handle);
                reminder.status = ReminderStatus::Cancelled;
            }
        }
    }

    /// Marks the reminder with `handle` as sent. Returns `false` if no pending reminder has
    /// that handle.
    pub fn acknowledge(&mut self, handle: ReminderHandle) -> bool {
        match self
            .reminders
            .iter_mut()
            .find(|r| r.handle == handle && r.status == ReminderStatus::Pending)
        {
            Some(reminder) => {
                reminder.status = ReminderStatus::Sent;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.reminders
            .iter()
            .any(|r| r.status == ReminderStatus::Pending)
    }
}
