//! Shared in-flight counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{CapacityScope, SchedulerError};

#[derive(Debug, Default)]
struct Counts {
    global: usize,
    per_user: HashMap<String, usize>,
}

/// Global and per-requester in-flight counters.
///
/// A slot is held from submission until the job reaches a terminal state.
/// Acquire checks both ceilings and increments both counters under one lock.
#[derive(Debug)]
pub struct AdmissionState {
    global_limit: usize,
    per_user_limit: usize,
    counts: Mutex<Counts>,
}

impl AdmissionState {
    pub fn new(global_limit: usize, per_user_limit: usize) -> Arc<Self> {
        Arc::new(Self {
            global_limit,
            per_user_limit,
            counts: Mutex::new(Counts::default()),
        })
    }

    fn counts(&self) -> MutexGuard<'_, Counts> {
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes a slot for `requester`, or reports which ceiling is full.
    pub fn try_acquire(
        self: &Arc<Self>,
        requester: &str,
    ) -> Result<AdmissionPermit, SchedulerError> {
        let mut counts = self.counts();

        if counts.global >= self.global_limit {
            return Err(SchedulerError::CapacityExceeded {
                scope: CapacityScope::Global,
                limit: self.global_limit,
            });
        }
        let user = counts.per_user.get(requester).copied().unwrap_or(0);
        if user >= self.per_user_limit {
            return Err(SchedulerError::CapacityExceeded {
                scope: CapacityScope::PerUser,
                limit: self.per_user_limit,
            });
        }

        counts.global += 1;
        counts.per_user.insert(requester.to_string(), user + 1);

        Ok(AdmissionPermit {
            state: Arc::clone(self),
            requester: requester.to_string(),
        })
    }

    fn release(&self, requester: &str) {
        let mut counts = self.counts();
        counts.global = counts.global.saturating_sub(1);
        if let Some(n) = counts.per_user.get_mut(requester) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                counts.per_user.remove(requester);
            }
        }
    }

    /// Slots held across all requesters.
    pub fn in_flight(&self) -> usize {
        self.counts().global
    }

    /// Slots held by one requester.
    pub fn user_in_flight(&self, requester: &str) -> usize {
        self.counts().per_user.get(requester).copied().unwrap_or(0)
    }

    pub fn global_limit(&self) -> usize {
        self.global_limit
    }

    pub fn per_user_limit(&self) -> usize {
        self.per_user_limit
    }
}

/// A held admission slot, returned on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    state: Arc<AdmissionState>,
    requester: String,
}

impl AdmissionPermit {
    pub fn requester(&self) -> &str {
        &self.requester
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.state.release(&self.requester);
    }
}
