//! Deferred work.
//!
//! Everything that must happen "later" (advertising start, buzzer toggle,
//! battery report) is expressed as a [`Work`] item submitted to a
//! [`Scheduler`]. The application task drains due items one at a time, so
//! handlers never run concurrently with event processing.

use heapless::Vec;

/// Monotonic time in milliseconds.
pub type Millis = u64;

/// Units of deferred work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Work {
    /// Ask the link layer to begin advertising.
    StartAdvertising,
    /// Flip the intermittent alarm phase.
    BuzzerToggle,
    /// Refresh battery values and notify a subscribed client.
    BatteryReport,
}

/// Submission side of the work queue.
pub trait Scheduler {
    /// Queue `work` to run as soon as possible. No-op if already pending.
    fn submit(&mut self, work: Work);

    /// Queue `work` to run after `delay_ms`. No-op if already pending.
    fn submit_after(&mut self, work: Work, delay_ms: Millis);

    /// Drop the pending instance of `work`, if any.
    fn cancel(&mut self, work: Work);
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    work: Work,
    due: Millis,
    seq: u32,
}

/// Fixed-capacity timer queue driven by an external millisecond clock.
pub struct WorkQueue<const N: usize> {
    pending: Vec<Pending, N>,
    now: Millis,
    seq: u32,
}

impl<const N: usize> WorkQueue<N> {
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            now: 0,
            seq: 0,
        }
    }

    /// Advance the queue's notion of "now". Time never goes backwards.
    pub fn set_now(&mut self, now: Millis) {
        if now > self.now {
            self.now = now;
        }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn is_pending(&self, work: Work) -> bool {
        self.pending.iter().any(|p| p.work == work)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline among pending items.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.pending.iter().map(|p| p.due).min()
    }

    /// Remove and return the earliest item due at `now`.
    ///
    /// Items with equal deadlines come out in submission order.
    pub fn pop_due(&mut self, now: Millis) -> Option<Work> {
        self.set_now(now);
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= self.now)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(index).work)
    }

    fn push(&mut self, work: Work, due: Millis) {
        if self.is_pending(work) {
            return;
        }
        let entry = Pending {
            work,
            due,
            seq: self.seq,
        };
        self.seq = self.seq.wrapping_add(1);
        if self.pending.push(entry).is_err() {
            error!("work queue full, dropping {}", work);
        }
    }
}

impl<const N: usize> Default for WorkQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Scheduler for WorkQueue<N> {
    fn submit(&mut self, work: Work) {
        self.push(work, self.now);
    }

    fn submit_after(&mut self, work: Work, delay_ms: Millis) {
        self.push(work, self.now.saturating_add(delay_ms));
    }

    fn cancel(&mut self, work: Work) {
        self.pending.retain(|p| p.work != work);
    }
}
