//! Priority lanes of queued job ids.

use std::collections::VecDeque;

use crate::job::Priority;

/// FIFO per priority class; higher classes drain first.
#[derive(Debug, Default)]
pub struct JobQueue {
    high: VecDeque<String>,
    normal: VecDeque<String>,
    low: VecDeque<String>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&mut self, priority: Priority) -> &mut VecDeque<String> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }

    pub fn push(&mut self, job_id: String, priority: Priority) {
        self.lane(priority).push_back(job_id);
    }

    /// Removes and returns the next job to dispatch.
    pub fn pop(&mut self) -> Option<String> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    /// Removes a queued job. Returns whether it was queued.
    pub fn remove(&mut self, job_id: &str) -> bool {
        for lane in [&mut self.high, &mut self.normal, &mut self.low] {
            if let Some(pos) = lane.iter().position(|id| id == job_id) {
                lane.remove(pos);
                return true;
            }
        }
        false
    }

    /// Drains every lane in dispatch order.
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
