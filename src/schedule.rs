//! Cooperative job queue.
//!
//! Each logical job owns a single slot, so a job is either idle or pending at
//! exactly one deadline. Arming a pending job moves its deadline. Due jobs are
//! handed out earliest deadline first, ties in the order they were armed.

use embassy_time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Job {
    Send,
    Rejoin,
    GpsPoll,
}

impl Job {
    const COUNT: usize = 3;

    fn slot(self) -> usize {
        match self {
            Job::Send => 0,
            Job::Rejoin => 1,
            Job::GpsPoll => 2,
        }
    }

    fn from_slot(slot: usize) -> Job {
        match slot {
            0 => Job::Send,
            1 => Job::Rejoin,
            _ => Job::GpsPoll,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    deadline: Instant,
    seq: u32,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    slots: [Option<Pending>; Job::COUNT],
    seq: u32,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            slots: [None; Job::COUNT],
            seq: 0,
        }
    }

    pub fn schedule_at(&mut self, job: Job, deadline: Instant) {
        self.seq = self.seq.wrapping_add(1);
        self.slots[job.slot()] = Some(Pending {
            deadline,
            seq: self.seq,
        });
    }

    pub fn schedule_after(&mut self, job: Job, now: Instant, delay: Duration) {
        self.schedule_at(job, now + delay);
    }

    pub fn cancel(&mut self, job: Job) {
        self.slots[job.slot()] = None;
    }

    pub fn deadline(&self, job: Job) -> Option<Instant> {
        self.slots[job.slot()].map(|p| p.deadline)
    }

    pub fn is_pending(&self, job: Job) -> bool {
        self.slots[job.slot()].is_some()
    }

    /// Earliest deadline of any pending job
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().flatten().map(|p| p.deadline).min()
    }

    /// Takes the next job whose deadline has elapsed, leaving its slot idle
    pub fn pop_due(&mut self, now: Instant) -> Option<Job> {
        let slot = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, p)| (*p).filter(|p| p.deadline <= now).map(|p| (i, p)))
            .min_by_key(|(_, p)| (p.deadline, p.seq))
            .map(|(i, _)| i)?;

        self.slots[slot] = None;
        Some(Job::from_slot(slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_due_before_deadline() {
        let mut jobs = Scheduler::new();
        jobs.schedule_at(Job::Send, Instant::from_secs(30));

        assert_eq!(jobs.pop_due(Instant::from_secs(29)), None);
        assert_eq!(jobs.pop_due(Instant::from_secs(30)), Some(Job::Send));
        assert!(!jobs.is_pending(Job::Send));
        assert_eq!(jobs.pop_due(Instant::from_secs(31)), None);
    }

    #[test]
    fn earliest_deadline_first_then_fifo() {
        let mut jobs = Scheduler::new();
        jobs.schedule_at(Job::Rejoin, Instant::from_secs(60));
        jobs.schedule_at(Job::GpsPoll, Instant::from_secs(10));
        jobs.schedule_at(Job::Send, Instant::from_secs(60));

        let now = Instant::from_secs(100);
        assert_eq!(jobs.pop_due(now), Some(Job::GpsPoll));
        assert_eq!(jobs.pop_due(now), Some(Job::Rejoin));
        assert_eq!(jobs.pop_due(now), Some(Job::Send));
        assert_eq!(jobs.pop_due(now), None);
    }

    #[test]
    fn rearming_replaces_the_pending_deadline() {
        let mut jobs = Scheduler::new();
        jobs.schedule_at(Job::Send, Instant::from_secs(5));
        jobs.schedule_after(Job::Send, Instant::from_secs(10), Duration::from_secs(30));

        assert_eq!(jobs.deadline(Job::Send), Some(Instant::from_secs(40)));
        assert_eq!(jobs.pop_due(Instant::from_secs(39)), None);
        assert_eq!(jobs.pop_due(Instant::from_secs(40)), Some(Job::Send));
        assert_eq!(jobs.pop_due(Instant::from_secs(100)), None);
    }

    #[test]
    fn next_deadline_tracks_earliest() {
        let mut jobs = Scheduler::new();
        assert_eq!(jobs.next_deadline(), None);

        jobs.schedule_at(Job::Rejoin, Instant::from_secs(60));
        jobs.schedule_at(Job::Send, Instant::from_secs(30));
        assert_eq!(jobs.next_deadline(), Some(Instant::from_secs(30)));

        jobs.cancel(Job::Send);
        assert_eq!(jobs.next_deadline(), Some(Instant::from_secs(60)));
    }
}
