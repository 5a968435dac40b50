//! Jobs and the priority-ordered ready queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use preempt_core::Priority;

use crate::events::JobId;
use crate::time::SimTime;

/// One unit of work, owned by the server while queued or in service.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Creation-order identifier
    pub id: JobId,
    /// Class; lower is served first
    pub priority: Priority,
    /// Time the job entered the system
    pub arrival_time: SimTime,
    /// Total service requirement at arrival
    pub original_service: f64,
    /// Work still owed
    pub remaining_service: f64,
    /// Times the job was returned to the queue
    pub preemption_count: u32,
    /// Sum of service quanta received so far
    pub service_received: f64,
    /// Sum of completed queueing intervals
    pub time_queued: f64,
    /// Sum of setup phases run for the job, finished or interrupted
    pub setup_time: f64,
    /// Start of the current queueing interval
    pub(crate) enqueued_at: SimTime,
    /// FIFO position, fixed at first submission
    pub(crate) sequence: Option<u64>,
}

impl Job {
    /// Creates a job that has just arrived.
    pub fn new(id: JobId, priority: Priority, arrival_time: SimTime, service: f64) -> Self {
        Self {
            id,
            priority,
            arrival_time,
            original_service: service,
            remaining_service: service,
            preemption_count: 0,
            service_received: 0.0,
            time_queued: 0.0,
            setup_time: 0.0,
            enqueued_at: arrival_time,
            sequence: None,
        }
    }

    /// FIFO position within the job's class, once submitted.
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }
}

/// Ordering key of the ready queue: priority, then arrival time, then
/// submission sequence, all ascending.
///
/// Service requirements never take part in the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueueKey {
    /// Class of the job
    pub priority: Priority,
    /// Arrival time of the job
    pub arrival_time: SimTime,
    /// Submission sequence of the job
    pub sequence: u64,
}

#[derive(Debug)]
struct QueuedJob {
    key: QueueKey,
    job: Job,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for QueuedJob {}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key)
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Waiting jobs, popped in [`QueueKey`] order.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<QueuedJob>,
    next_sequence: u64,
}

impl ReadyQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a job. A requeued job keeps the sequence of its first submission.
    pub fn push(&mut self, mut job: Job) {
        let sequence = *job.sequence.get_or_insert_with(|| {
            let next = self.next_sequence;
            self.next_sequence += 1;
            next
        });
        let key = QueueKey {
            priority: job.priority,
            arrival_time: job.arrival_time,
            sequence,
        };
        self.heap.push(QueuedJob { key, job });
    }

    /// Removes the highest-priority job.
    pub fn pop(&mut self) -> Option<Job> {
        self.heap.pop().map(|queued| queued.job)
    }

    /// Highest-priority job without removing it.
    pub fn peek(&self) -> Option<&Job> {
        self.heap.peek().map(|queued| &queued.job)
    }

    /// Key of the highest-priority job.
    pub fn peek_key(&self) -> Option<QueueKey> {
        self.heap.peek().map(|queued| queued.key)
    }

    /// Number of waiting jobs.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Waiting jobs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.heap.iter().map(|queued| &queued.job)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn job(id: u64, priority: Priority, arrival: f64, service: f64) -> Job {
        Job::new(JobId(id), priority, SimTime::new(arrival), service)
    }

    #[test]
    fn test_priority_before_arrival_time() {
        let mut queue = ReadyQueue::new();
        queue.push(job(1, 2, 0.0, 1.0));
        queue.push(job(2, 1, 5.0, 1.0));
        queue.push(job(3, 2, 1.0, 1.0));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop().map(|j| j.id.0)).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_service_time_never_breaks_ties() {
        let mut queue = ReadyQueue::new();
        queue.push(job(1, 1, 3.0, 100.0));
        queue.push(job(2, 1, 3.0, 0.1));

        assert_eq!(queue.pop().unwrap().id, JobId(1));
    }

    #[test]
    fn test_requeued_job_keeps_position() {
        let mut queue = ReadyQueue::new();
        queue.push(job(1, 1, 2.0, 4.0));
        let mut first = queue.pop().unwrap();
        assert_eq!(first.sequence(), Some(0));

        queue.push(job(2, 1, 2.0, 4.0));
        first.remaining_service = 1.0;
        first.preemption_count += 1;
        queue.push(first);

        let head = queue.pop().unwrap();
        assert_eq!(head.id, JobId(1));
        assert_eq!(head.sequence(), Some(0));
        assert_eq!(head.preemption_count, 1);
        assert_eq!(queue.len(), 1);
    }

    proptest! {
        #[test]
        fn test_pop_order_matches_key_order(
            entries in prop::collection::vec((0u8..4, 0u16..50), 1..64)
        ) {
            let mut queue = ReadyQueue::new();
            for (id, (priority, arrival)) in entries.iter().enumerate() {
                queue.push(job(id as u64, *priority, f64::from(*arrival), 1.0));
            }

            let mut previous: Option<(Priority, SimTime, u64)> = None;
            while let Some(popped) = queue.pop() {
                let key = (popped.priority, popped.arrival_time, popped.sequence().unwrap());
                if let Some(prev) = previous {
                    prop_assert!(prev < key);
                }
                previous = Some(key);
            }
        }
    }
}
