//! Metrics (§4.8): counters, gauges, and rolling-window averages over the
//! last 100 samples for step/request/LLM-job latency and token throughput.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

const WINDOW: usize = 100;

struct RollingWindow {
    samples: Mutex<VecDeque<f64>>,
}

impl RollingWindow {
    fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(WINDOW)),
        }
    }

    fn push(&self, value: f64) {
        let mut samples = self.samples.lock().unwrap();
        if samples.len() == WINDOW {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    fn average(&self) -> f64 {
        let samples = self.samples.lock().unwrap();
        if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        }
    }
}

#[derive(Serialize)]
pub struct RequestMetrics {
    pub incoming_total: u64,
    pub active_now: i64,
    pub completed_total: u64,
    pub failed_total: u64,
    pub latency_avg_last_100: f64,
}

#[derive(Serialize)]
pub struct LlmMetrics {
    pub active_jobs: i64,
    pub job_latency_avg_last_100: f64,
    pub tokens_generated_total: u64,
    pub tokens_per_second_last: f64,
    pub tokens_per_second_avg_last_100: f64,
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub requests: RequestMetrics,
    pub llm: LlmMetrics,
    pub step_latency_avg_last_100: HashMap<String, f64>,
}

/// Process-wide counters and rolling windows (§4.8). Cheap to clone via
/// `Arc` from [`crate::context::Context`]; every field is independently
/// lock-free or its own small lock, so concurrent requests never contend on
/// a single mutex for the whole snapshot.
#[derive(Default)]
pub struct Metrics {
    incoming_requests: AtomicU64,
    completed_requests: AtomicU64,
    failed_requests: AtomicU64,
    tokens_generated: AtomicU64,
    active_requests: AtomicI64,
    active_llm_jobs: AtomicI64,
    last_tokens_per_second: Mutex<f64>,
    request_latency: OptionWindow,
    llm_job_latency: OptionWindow,
    tokens_per_second: OptionWindow,
    step_latency: Mutex<HashMap<String, RollingWindow>>,
}

/// `RollingWindow` has no `Default`-friendly zero state worth naming; wrap it
/// so `#[derive(Default)]` on [`Metrics`] still works.
struct OptionWindow(RollingWindow);

impl Default for OptionWindow {
    fn default() -> Self {
        OptionWindow(RollingWindow::new())
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_start(&self) {
        self.incoming_requests.fetch_add(1, Ordering::Relaxed);
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request_complete(&self, duration_secs: f64, error: bool) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
        if error {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.request_latency.0.push(duration_secs);
    }

    pub fn record_step_duration(&self, step: &str, duration_secs: f64) {
        let mut windows = self.step_latency.lock().unwrap();
        windows.entry(step.to_string()).or_insert_with(RollingWindow::new).push(duration_secs);
    }

    pub fn record_llm_job_start(&self) {
        self.active_llm_jobs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_llm_job_end(&self, duration_secs: f64) {
        self.active_llm_jobs.fetch_sub(1, Ordering::Relaxed);
        self.llm_job_latency.0.push(duration_secs);
    }

    /// Records `count` generated tokens taking `duration_secs`, updating the
    /// tokens-per-second gauge and rolling window.
    pub fn record_tokens(&self, count: u64, duration_secs: f64) {
        self.tokens_generated.fetch_add(count, Ordering::Relaxed);
        if duration_secs > 0.0 {
            let tps = count as f64 / duration_secs;
            *self.last_tokens_per_second.lock().unwrap() = tps;
            self.tokens_per_second.0.push(tps);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let step_latency_avg_last_100 = self
            .step_latency
            .lock()
            .unwrap()
            .iter()
            .map(|(step, window)| (step.clone(), window.average()))
            .collect();

        MetricsSnapshot {
            requests: RequestMetrics {
                incoming_total: self.incoming_requests.load(Ordering::Relaxed),
                active_now: self.active_requests.load(Ordering::Relaxed),
                completed_total: self.completed_requests.load(Ordering::Relaxed),
                failed_total: self.failed_requests.load(Ordering::Relaxed),
                latency_avg_last_100: self.request_latency.0.average(),
            },
            llm: LlmMetrics {
                active_jobs: self.active_llm_jobs.load(Ordering::Relaxed),
                job_latency_avg_last_100: self.llm_job_latency.0.average(),
                tokens_generated_total: self.tokens_generated.load(Ordering::Relaxed),
                tokens_per_second_last: *self.last_tokens_per_second.lock().unwrap(),
                tokens_per_second_avg_last_100: self.tokens_per_second.0.average(),
            },
            step_latency_avg_last_100,
        }
    }
}
