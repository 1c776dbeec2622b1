use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::trace;

use orb_types::Oid;

/// Priority tier of a pending agenda entry, lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Idle,
    Low,
    Normal,
    High,
}

impl Priority {
    /// Number of tiers.
    pub const COUNT: usize = 4;

    /// All tiers, lowest first.
    pub const ALL: [Priority; Priority::COUNT] =
        [Priority::Idle, Priority::Low, Priority::Normal, Priority::High];

    fn index(self) -> usize {
        match self {
            Priority::Idle => 0,
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Priority::Idle => "idle",
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The agenda: a priority-tiered queue of object references awaiting
/// processing.
///
/// Entries are non-owning oids; the same object may be queued several
/// times or not at all, and queueing never extends an object's lifetime
/// beyond what garbage-collection reachability grants (the agenda is a
/// GC root, so queued objects stay reachable *while* queued).
///
/// Scheduling is strict priority with FIFO order inside a tier. A
/// persistently non-empty high tier starves the lower tiers; that is the
/// intended trade-off, not a defect. All tiers share one mutex — agenda
/// operations are brief enqueues and dequeues, never work execution.
///
/// The agenda is process-local. It is never persisted: every process run
/// starts with an idle agenda.
#[derive(Debug, Default)]
pub struct Agenda {
    tiers: Mutex<[VecDeque<Oid>; Priority::COUNT]>,
}

impl Agenda {
    /// Create an empty agenda.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object reference at the tail of the given tier.
    pub fn push(&self, priority: Priority, oid: Oid) {
        let mut tiers = self.tiers.lock().expect("agenda lock poisoned");
        tiers[priority.index()].push_back(oid);
        trace!(oid = %oid, priority = %priority, "agenda push");
    }

    /// Remove and return the head of the highest non-empty tier.
    pub fn pop_highest(&self) -> Option<Oid> {
        let mut tiers = self.tiers.lock().expect("agenda lock poisoned");
        for priority in Priority::ALL.iter().rev() {
            if let Some(oid) = tiers[priority.index()].pop_front() {
                trace!(oid = %oid, priority = %priority, "agenda pop");
                return Some(oid);
            }
        }
        None
    }

    /// Total number of queued entries across all tiers.
    pub fn len(&self) -> usize {
        let tiers = self.tiers.lock().expect("agenda lock poisoned");
        tiers.iter().map(VecDeque::len).sum()
    }

    /// Returns `true` if no tier holds an entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries queued at one tier.
    pub fn tier_len(&self, priority: Priority) -> usize {
        let tiers = self.tiers.lock().expect("agenda lock poisoned");
        tiers[priority.index()].len()
    }

    /// Snapshot of every queued oid, highest tier first.
    ///
    /// Taken under the lock and traversed outside it, so garbage
    /// collection can mark agenda entries without the mark pass ever
    /// re-entering agenda operations.
    pub fn queued_oids(&self) -> Vec<Oid> {
        let tiers = self.tiers.lock().expect("agenda lock poisoned");
        let mut oids = Vec::with_capacity(tiers.iter().map(VecDeque::len).sum());
        for priority in Priority::ALL.iter().rev() {
            oids.extend(tiers[priority.index()].iter().copied());
        }
        oids
    }

    /// Drop every queued entry, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut tiers = self.tiers.lock().expect("agenda lock poisoned");
        let dropped = tiers.iter().map(VecDeque::len).sum();
        for tier in tiers.iter_mut() {
            tier.clear();
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid() -> Oid {
        Oid::random()
    }

    #[test]
    fn empty_agenda_pops_nothing() {
        let agenda = Agenda::new();
        assert!(agenda.is_empty());
        assert_eq!(agenda.pop_highest(), None);
    }

    #[test]
    fn higher_tier_wins() {
        let agenda = Agenda::new();
        let x = oid();
        let y = oid();
        agenda.push(Priority::Low, x);
        agenda.push(Priority::High, y);
        assert_eq!(agenda.pop_highest(), Some(y));
        assert_eq!(agenda.pop_highest(), Some(x));
        assert_eq!(agenda.pop_highest(), None);
    }

    #[test]
    fn fifo_within_a_tier() {
        let agenda = Agenda::new();
        let first = oid();
        let second = oid();
        let third = oid();
        for entry in [first, second, third] {
            agenda.push(Priority::Normal, entry);
        }
        assert_eq!(agenda.pop_highest(), Some(first));
        assert_eq!(agenda.pop_highest(), Some(second));
        assert_eq!(agenda.pop_highest(), Some(third));
    }

    #[test]
    fn drains_tiers_in_descending_order() {
        let agenda = Agenda::new();
        let entries: Vec<(Priority, Oid)> = vec![
            (Priority::Idle, oid()),
            (Priority::Normal, oid()),
            (Priority::High, oid()),
            (Priority::Low, oid()),
            (Priority::High, oid()),
        ];
        for (priority, entry) in &entries {
            agenda.push(*priority, *entry);
        }
        let popped: Vec<Oid> = std::iter::from_fn(|| agenda.pop_highest()).collect();
        assert_eq!(
            popped,
            vec![entries[2].1, entries[4].1, entries[1].1, entries[3].1, entries[0].1]
        );
    }

    #[test]
    fn duplicate_entries_are_allowed() {
        let agenda = Agenda::new();
        let entry = oid();
        agenda.push(Priority::Normal, entry);
        agenda.push(Priority::Normal, entry);
        assert_eq!(agenda.len(), 2);
        assert_eq!(agenda.pop_highest(), Some(entry));
        assert_eq!(agenda.pop_highest(), Some(entry));
    }

    #[test]
    fn len_and_tier_len() {
        let agenda = Agenda::new();
        agenda.push(Priority::Idle, oid());
        agenda.push(Priority::High, oid());
        agenda.push(Priority::High, oid());
        assert_eq!(agenda.len(), 3);
        assert_eq!(agenda.tier_len(Priority::High), 2);
        assert_eq!(agenda.tier_len(Priority::Idle), 1);
        assert_eq!(agenda.tier_len(Priority::Low), 0);
    }

    #[test]
    fn queued_oids_snapshots_highest_first() {
        let agenda = Agenda::new();
        let low = oid();
        let high = oid();
        agenda.push(Priority::Low, low);
        agenda.push(Priority::High, high);
        assert_eq!(agenda.queued_oids(), vec![high, low]);
        // Snapshotting does not consume entries.
        assert_eq!(agenda.len(), 2);
    }

    #[test]
    fn clear_discards_everything() {
        let agenda = Agenda::new();
        agenda.push(Priority::Low, oid());
        agenda.push(Priority::High, oid());
        assert_eq!(agenda.clear(), 2);
        assert!(agenda.is_empty());
    }

    #[test]
    fn concurrent_push_and_pop() {
        use std::sync::Arc;
        use std::thread;

        let agenda = Arc::new(Agenda::new());
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let agenda = Arc::clone(&agenda);
                thread::spawn(move || {
                    for _ in 0..50 {
                        agenda.push(Priority::Normal, Oid::random());
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().expect("producer panicked");
        }
        assert_eq!(agenda.len(), 200);

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let agenda = Arc::clone(&agenda);
                thread::spawn(move || {
                    let mut popped = 0usize;
                    while agenda.pop_highest().is_some() {
                        popped += 1;
                    }
                    popped
                })
            })
            .collect();
        let total: usize = consumers
            .into_iter()
            .map(|h| h.join().expect("consumer panicked"))
            .sum();
        assert_eq!(total, 200);
        assert!(agenda.is_empty());
    }
}
