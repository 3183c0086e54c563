//! Scan-event deduplication
//!
//! Physical readers re-send a tap when they miss the acknowledgement, so
//! the same scan event can arrive more than once, including concurrently
//! while the first submission is still in flight. The cache hands out
//! ownership of each event key exactly once per recency window: the first
//! claimer evaluates the scan, every other arrival waits on the claimed
//! slot and receives the owner's receipt, and a repeat after completion
//! gets the recorded receipt back directly.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
enum SlotState<T> {
    /// Claimed; the owner has not finished yet
    Pending,

    /// The owner completed with this result
    Ready(T),

    /// The owner abandoned the claim; the key may be claimed again
    Released,
}

/// One event key's result cell, shared between the owner and any waiters
///
/// State transitions are single assignments, so the cell stays coherent
/// even if a panic poisons the mutex; readers recover the guard and read
/// the state as usual.
#[derive(Debug)]
pub(crate) struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T: Clone> Slot<T> {
    fn new() -> Self {
        Slot {
            state: Mutex::new(SlotState::Pending),
            ready: Condvar::new(),
        }
    }

    /// Block until the owner completes or releases, bounded by `bound`
    ///
    /// Returns the owner's result, or `None` when the claim was released
    /// or the owner never finished within the bound; either way the caller
    /// should claim the key again.
    pub(crate) fn wait(&self, bound: Duration) -> Option<T> {
        let deadline = Instant::now() + bound;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*state {
                SlotState::Ready(value) => return Some(value.clone()),
                SlotState::Released => return None,
                SlotState::Pending => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return None;
                    }
                    let (guard, _) = self
                        .ready
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }

    fn transition(&self, next: SlotState<T>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = next;
        self.ready.notify_all();
    }
}

/// Outcome of claiming an event key
pub(crate) enum Claim<T> {
    /// A result was already recorded within the window
    Completed(T),

    /// Another caller holds the key; wait on the slot for its result
    Wait(Arc<Slot<T>>),

    /// The caller now owns the key and must complete or release it
    Owner,
}

/// Bounded-recency, claim-based cache of per-event results
///
/// Entries older than the window are dropped lazily on completion; after
/// the window a key may be applied again, which matches the hardware
/// contract: readers only retry within seconds of the original tap.
#[derive(Debug)]
pub(crate) struct DedupCache<T> {
    window: Duration,
    entries: DashMap<String, (Instant, Arc<Slot<T>>)>,
}

impl<T: Clone> DedupCache<T> {
    pub(crate) fn new(window: Duration) -> Self {
        DedupCache {
            window,
            entries: DashMap::new(),
        }
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }

    /// Atomically claim a key, or observe whoever already holds it
    ///
    /// The slot is reserved under the map's entry lock, so of two
    /// concurrent claims of one key exactly one becomes the owner.
    pub(crate) fn claim(&self, key: &str) -> Claim<T> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let (claimed_at, slot) = entry.get();
                let expired = claimed_at.elapsed() >= self.window;
                let state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
                match &*state {
                    SlotState::Ready(value) if !expired => Claim::Completed(value.clone()),
                    SlotState::Pending if !expired => Claim::Wait(Arc::clone(slot)),
                    // Expired result, stale claim, or a released slot that
                    // raced with its removal: take the key over.
                    _ => {
                        drop(state);
                        entry.insert((Instant::now(), Arc::new(Slot::new())));
                        Claim::Owner
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert((Instant::now(), Arc::new(Slot::new())));
                Claim::Owner
            }
        }
    }

    /// Record the owner's result, waking any waiters
    pub(crate) fn complete(&self, key: &str, value: T) {
        self.entries
            .retain(|_, (claimed_at, _)| claimed_at.elapsed() < self.window);
        if let Some(mut entry) = self.entries.get_mut(key) {
            let (claimed_at, slot) = entry.value_mut();
            *claimed_at = Instant::now();
            slot.transition(SlotState::Ready(value));
        }
    }

    /// Abandon a claim so the key can be submitted again
    ///
    /// Used when evaluation failed with a retry-eligible error: nothing
    /// was committed, so the next submission of this key must be applied,
    /// not suppressed.
    pub(crate) fn release(&self, key: &str) {
        if let Some((_, (_, slot))) = self.entries.remove(key) {
            slot.transition(SlotState::Released);
        }
    }
}
