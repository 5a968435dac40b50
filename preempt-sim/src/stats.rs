//! Per-class statistics with warm-up gating.

use preempt_core::{Priority, WaitMeasure};
use serde::Serialize;

use crate::StatisticsError;
use crate::server::Departure;

/// Accumulators for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStatistics {
    /// Class these totals belong to
    pub class: Priority,
    /// Sum of recorded waits
    pub total_wait: f64,
    /// Recorded completions
    pub count: u64,
    /// Sum of preemptions of recorded completions
    pub total_preemptions: u64,
}

impl ClassStatistics {
    /// Empty accumulators for `class`.
    pub fn new(class: Priority) -> Self {
        Self {
            class,
            total_wait: 0.0,
            count: 0,
            total_preemptions: 0,
        }
    }

    /// Mean recorded wait.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::NoSamples` - If nothing was recorded
    pub fn mean_wait(&self) -> Result<f64, StatisticsError> {
        self.per_completion(self.total_wait)
    }

    /// Mean preemptions per recorded completion.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::NoSamples` - If nothing was recorded
    pub fn mean_preemptions(&self) -> Result<f64, StatisticsError> {
        self.per_completion(self.total_preemptions as f64)
    }

    fn per_completion(&self, total: f64) -> Result<f64, StatisticsError> {
        if self.count == 0 {
            return Err(StatisticsError::NoSamples { class: self.class });
        }
        Ok(total / self.count as f64)
    }
}

/// Collects departures that complete after the warm-up cutoff.
#[derive(Debug, Clone)]
pub struct StatisticsCollector {
    t_start: f64,
    measure: WaitMeasure,
    classes: Vec<ClassStatistics>,
}

impl StatisticsCollector {
    /// Creates accumulators for `classes` classes.
    pub fn new(classes: usize, t_start: f64, measure: WaitMeasure) -> Self {
        Self {
            t_start,
            measure,
            classes: (0..classes)
                .map(|class| Priority::try_from(class).unwrap_or(Priority::MAX))
                .map(ClassStatistics::new)
                .collect(),
        }
    }

    /// Records a departure if it completed strictly after the cutoff.
    ///
    /// Returns whether the departure was counted.
    pub fn record(&mut self, departure: &Departure) -> bool {
        if departure.completion_time <= self.t_start {
            return false;
        }
        let Some(stats) = self.classes.get_mut(usize::from(departure.class)) else {
            return false;
        };

        let wait = match self.measure {
            WaitMeasure::FlowTime => departure.flow_time(),
            WaitMeasure::QueueingDelay => departure.queueing_delay(),
        };
        stats.total_wait += wait;
        stats.count += 1;
        stats.total_preemptions += u64::from(departure.preemptions);
        true
    }

    /// Warm-up cutoff.
    pub fn t_start(&self) -> f64 {
        self.t_start
    }

    /// Accumulators by class.
    pub fn classes(&self) -> &[ClassStatistics] {
        &self.classes
    }

    /// Consumes the collector.
    pub fn into_classes(self) -> Vec<ClassStatistics> {
        self.classes
    }
}

/// Output of one replicate.
#[derive(Debug, Clone, Serialize)]
pub struct PerClassStats {
    /// Scenario label
    pub scenario: String,
    /// Seed of this replicate
    pub seed: u64,
    /// Simulated horizon
    pub horizon: f64,
    /// Warm-up cutoff
    pub t_start: f64,
    /// Accumulators indexed by class
    pub classes: Vec<ClassStatistics>,
    /// Slot-time spent serving jobs
    pub busy_time: f64,
    /// Slot-time spent in switchover phases
    pub switchover_time: f64,
    /// Number of slots
    pub capacity: usize,
    /// Jobs that entered the system
    pub arrivals: u64,
    /// Jobs that left the system, including warm-up departures
    pub departures: u64,
    /// Preemptions over the whole run
    pub preemptions: u64,
    /// Events handed to the model
    pub events_dispatched: u64,
    /// Retained departure records
    pub departure_log: Vec<Departure>,
}

impl PerClassStats {
    /// Accumulators of one class.
    pub fn class(&self, class: Priority) -> Option<&ClassStatistics> {
        self.classes.get(usize::from(class))
    }

    /// Fraction of slot-time spent serving jobs.
    pub fn utilization(&self) -> f64 {
        self.busy_time / (self.horizon * self.capacity as f64)
    }

    /// Completions recorded after warm-up across all classes.
    pub fn recorded_completions(&self) -> u64 {
        self.classes.iter().map(|c| c.count).sum()
    }

    /// Generates human-readable summary.
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!(
            "Replicate '{}' (seed: {})\n",
            self.scenario, self.seed
        ));
        summary.push_str(&format!(
            "Horizon: {} (warm-up until {})\n",
            self.horizon, self.t_start
        ));
        summary.push_str(&format!("Events processed: {}\n", self.events_dispatched));
        summary.push_str(&format!(
            "Arrivals: {}  Departures: {}  Preemptions: {}\n",
            self.arrivals, self.departures, self.preemptions
        ));
        summary.push_str(&format!("Utilization: {:.4}\n", self.utilization()));
        if self.switchover_time > 0.0 {
            summary.push_str(&format!("Switchover time: {:.4}\n", self.switchover_time));
        }

        summary.push_str("\nPer class:\n");
        for stats in &self.classes {
            match (stats.mean_wait(), stats.mean_preemptions()) {
                (Ok(wait), Ok(preemptions)) => summary.push_str(&format!(
                    "  class {}: n={} mean wait={:.4} mean preemptions={:.4}\n",
                    stats.class, stats.count, wait, preemptions
                )),
                _ => summary.push_str(&format!("  class {}: no samples\n", stats.class)),
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn departure(class: Priority, arrival: f64, completion: f64, service: f64) -> Departure {
        Departure {
            job_id: 0,
            class,
            arrival_time: arrival,
            completion_time: completion,
            original_service: service,
            preemptions: 2,
            service_received: service,
            time_queued: completion - arrival - service,
            setup_time: 0.0,
        }
    }

    #[test]
    fn test_warm_up_cutoff_is_strict() {
        let mut collector = StatisticsCollector::new(1, 10.0, WaitMeasure::FlowTime);

        assert!(!collector.record(&departure(0, 5.0, 10.0, 1.0)));
        assert!(collector.record(&departure(0, 5.0, 10.5, 1.0)));

        let stats = &collector.classes()[0];
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_wait, 5.5);
        assert_eq!(stats.total_preemptions, 2);
    }

    #[test]
    fn test_queueing_delay_excludes_service() {
        let mut collector = StatisticsCollector::new(2, 0.0, WaitMeasure::QueueingDelay);
        collector.record(&departure(1, 0.0, 4.0, 1.5));

        assert_eq!(collector.classes()[1].mean_wait(), Ok(2.5));
    }

    #[test]
    fn test_empty_class_reports_no_samples() {
        let collector = StatisticsCollector::new(3, 0.0, WaitMeasure::FlowTime);

        assert_eq!(
            collector.classes()[2].mean_wait(),
            Err(StatisticsError::NoSamples { class: 2 })
        );
        assert!(collector.classes()[2].mean_preemptions().is_err());
    }
}
