//! Cooperative timers fired on the UI thread.

use crate::host::Ui;
use core::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(Uuid);

pub(crate) type TimerCallback = Box<dyn FnMut(&mut Ui)>;

struct Timer {
    id: TimerId,
    period: Duration,
    /// When the timer fires next; `None` while stopped.
    next: Option<Instant>,
    /// Taken out while the callback runs.
    callback: Option<TimerCallback>,
}

/// A UI’s timers, in creation order.
#[derive(Default)]
pub(crate) struct Timers {
    timers: Vec<Timer>,
}

impl Timers {
    fn find(&mut self, id: TimerId) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|timer| timer.id == id)
    }

    pub fn add(&mut self, period: Duration, now: Instant, callback: TimerCallback) -> TimerId {
        let id = TimerId(Uuid::new_v4());
        self.timers.push(Timer {
            id,
            period,
            next: Some(now + period),
            callback: Some(callback),
        });
        id
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        let len = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != len
    }

    pub fn stop(&mut self, id: TimerId) -> bool {
        match self.find(id) {
            Some(timer) => {
                timer.next = None;
                true
            }
            None => false,
        }
    }

    /// Starts a full period from `now`.
    pub fn restart(&mut self, id: TimerId, now: Instant) -> bool {
        match self.find(id) {
            Some(timer) => {
                timer.next = Some(now + timer.period);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, id: TimerId) -> bool {
        self.timers.iter().any(|timer| timer.id == id && timer.next.is_some())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().filter_map(|timer| timer.next).min()
    }

    /// Takes the callbacks of due timers and schedules their next firing.
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerId, TimerCallback)> {
        let mut due = Vec::new();
        for timer in &mut self.timers {
            if timer.next.map_or(false, |next| next <= now) {
                if let Some(callback) = timer.callback.take() {
                    timer.next = Some(now + timer.period);
                    due.push((timer.id, callback));
                }
            }
        }
        due
    }

    /// Puts a callback back after it ran. Dropped if the timer was removed meanwhile.
    pub fn put_back(&mut self, id: TimerId, callback: TimerCallback) {
        if let Some(timer) = self.find(id) {
            timer.callback = Some(callback);
        }
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timers({})", self.timers.len())
    }
}
