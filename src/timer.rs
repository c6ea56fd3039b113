//! Cancellable per-question countdowns
//!
//! A [`Countdown`] records when a question was shown and asks an
//! [`Alarms`] scheduler to deliver an [`AlarmMessage`] once its time budget
//! runs out. Every countdown carries its own [`TimerId`], so an alarm that
//! arrives after the countdown was cancelled or replaced can be recognized
//! and ignored.

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::trace;
use uuid::Uuid;
use web_time::SystemTime;

/// Identifies one countdown
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub struct TimerId(Uuid);

impl TimerId {
    /// Creates a random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Messages delivered when a scheduled time is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The time budget of a question ran out
    CountdownExpired {
        /// Countdown that fired
        timer: TimerId,
    },
}

impl AlarmMessage {
    /// The countdown this alarm belongs to
    pub fn timer(&self) -> TimerId {
        match self {
            Self::CountdownExpired { timer } => *timer,
        }
    }
}

/// Schedules alarm delivery
pub trait Alarms {
    /// Delivers `alarm` once `after` has elapsed
    fn schedule(&mut self, alarm: AlarmMessage, after: Duration);

    /// Drops a pending alarm; unknown ids are ignored
    fn cancel(&mut self, timer: TimerId);
}

/// A running question countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub(crate) id: TimerId,
    started: SystemTime,
    limit: Duration,
}

impl Countdown {
    /// Starts a countdown of `limit` and schedules its expiry alarm
    pub fn start<A: Alarms + ?Sized>(limit: Duration, alarms: &mut A) -> Self {
        let countdown = Self {
            id: TimerId::new(),
            started: SystemTime::now(),
            limit,
        };
        alarms.schedule(
            AlarmMessage::CountdownExpired {
                timer: countdown.id,
            },
            limit,
        );
        trace!(timer = %countdown.id, ?limit, "countdown started");
        countdown
    }

    /// Id carried by the expiry alarm
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// The full time budget
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Time since the countdown started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed().unwrap_or_default()
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    /// Whether the time budget is used up
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    /// Withdraws the expiry alarm
    pub fn cancel<A: Alarms + ?Sized>(self, alarms: &mut A) {
        trace!(timer = %self.id, "countdown cancelled");
        alarms.cancel(self.id);
    }
}

/// Delivers alarms through a channel using tokio sleep tasks
///
/// Must be used inside a tokio runtime. Dropping it aborts every pending
/// alarm.
#[derive(Debug)]
pub struct TokioAlarms {
    sender: mpsc::UnboundedSender<AlarmMessage>,
    pending: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioAlarms {
    /// Creates the scheduler and the receiving end of its alarms
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AlarmMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                pending: HashMap::new(),
            },
            receiver,
        )
    }

    /// Number of alarms scheduled that have neither fired nor been cancelled
    pub fn pending(&self) -> usize {
        self.pending.values().filter(|task| !task.is_finished()).count()
    }
}

impl Alarms for TokioAlarms {
    fn schedule(&mut self, alarm: AlarmMessage, after: Duration) {
        self.pending.retain(|_, task| !task.is_finished());
        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // the receiver may be gone during shutdown
            let _ = sender.send(alarm);
        });
        if let Some(previous) = self.pending.insert(alarm.timer(), task) {
            previous.abort();
        }
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(task) = self.pending.remove(&timer) {
            task.abort();
        }
    }
}

impl Drop for TokioAlarms {
    fn drop(&mut self) {
        for (_, task) in self.pending.drain() {
            task.abort();
        }
    }
}
