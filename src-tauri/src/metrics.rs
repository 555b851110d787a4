use std::collections::VecDeque;

use serde::Serialize;

use crate::utils::now_epoch_ms;

const DEFAULT_WINDOW_SIZE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub samples: usize,
    pub average_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

impl MetricSummary {
    fn empty() -> Self {
        Self {
            samples: 0,
            average_ms: 0,
            p95_ms: 0,
            max_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub generated_at_ms: u64,
    pub response_latency: MetricSummary,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub not_ready: u64,
    pub discarded_late_results: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
struct RollingMetric {
    values: VecDeque<u64>,
    capacity: usize,
}

impl RollingMetric {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, value_ms: u64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value_ms);
    }

    fn summary(&self) -> MetricSummary {
        if self.values.is_empty() {
            return MetricSummary::empty();
        }

        let samples = self.values.len();
        let sum: u64 = self.values.iter().sum();
        let average_ms = sum / samples as u64;
        let max_ms = *self.values.iter().max().unwrap_or(&0);

        let mut sorted = self.values.iter().copied().collect::<Vec<_>>();
        sorted.sort_unstable();
        let p95_index = ((samples as f64 * 0.95).ceil() as usize)
            .saturating_sub(1)
            .min(samples - 1);
        let p95_ms = sorted[p95_index];

        MetricSummary {
            samples,
            average_ms,
            p95_ms,
            max_ms,
        }
    }
}

/// Request outcome counters and response latency for the request pipeline.
#[derive(Debug)]
pub struct PipelineMetrics {
    response_latency_ms: RollingMetric,
    completed: u64,
    failed: u64,
    timed_out: u64,
    rejected: u64,
    not_ready: u64,
    discarded_late_results: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            response_latency_ms: RollingMetric::new(DEFAULT_WINDOW_SIZE),
            completed: 0,
            failed: 0,
            timed_out: 0,
            rejected: 0,
            not_ready: 0,
            discarded_late_results: 0,
        }
    }

    pub fn record_completed(&mut self, latency_ms: u64) {
        self.response_latency_ms.record(latency_ms);
        self.completed += 1;
    }

    pub fn record_failed(&mut self, latency_ms: u64) {
        self.response_latency_ms.record(latency_ms);
        self.failed += 1;
    }

    pub fn record_timeout(&mut self) {
        self.timed_out += 1;
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    pub fn record_not_ready(&mut self) {
        self.not_ready += 1;
    }

    pub fn record_discarded(&mut self) {
        self.discarded_late_results += 1;
    }

    pub fn report(&self) -> PipelineReport {
        let mut warnings = Vec::new();
        if self.timed_out > 0 {
            warnings.push(format!(
                "{} requests hit the response deadline.",
                self.timed_out
            ));
        }
        if self.failed > 0 {
            warnings.push(format!("{} requests failed in the generator.", self.failed));
        }

        PipelineReport {
            generated_at_ms: now_epoch_ms(),
            response_latency: self.response_latency_ms.summary(),
            completed: self.completed,
            failed: self.failed,
            timed_out: self.timed_out,
            rejected: self.rejected,
            not_ready: self.not_ready,
            discarded_late_results: self.discarded_late_results,
            warnings,
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
