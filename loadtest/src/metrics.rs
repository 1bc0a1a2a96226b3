//! Per-request statistics collected during a run, and their printed report.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use bytesize::ByteSize;
use sketches_ddsketch::DDSketch;
use yansi::Paint;

/// Statistics for all requests reported under one name.
#[derive(Default)]
pub struct RequestStats {
    /// Latencies of all requests, successful or not, in seconds.
    timing: DDSketch,
    /// Number of failed requests.
    failures: u64,
    /// Bytes of request payloads sent.
    bytes_sent: u64,
    /// Bytes of response bodies received.
    bytes_received: u64,
}

impl RequestStats {
    /// Total number of requests, including failures.
    pub fn requests(&self) -> u64 {
        self.timing.count() as u64
    }

    /// Number of failed requests.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Number of successful requests.
    pub fn successes(&self) -> u64 {
        self.requests() - self.failures
    }

    /// Bytes of request payloads sent.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Bytes of response bodies received.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    fn merge(&mut self, other: &RequestStats) {
        // both sketches use the default configuration, merging cannot fail
        self.timing.merge(&other.timing).ok();
        self.failures += other.failures;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
    }
}

impl fmt::Debug for RequestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestStats")
            .field("requests", &self.requests())
            .field("failures", &self.failures)
            .field("bytes_sent", &self.bytes_sent)
            .field("bytes_received", &self.bytes_received)
            .finish()
    }
}

/// The bytes transferred by a successful request.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transfer {
    /// Request payload bytes.
    pub sent: u64,
    /// Response body bytes.
    pub received: u64,
}

impl Transfer {
    /// A transfer that only sent a payload.
    pub fn sent(bytes: u64) -> Self {
        Self {
            sent: bytes,
            received: 0,
        }
    }

    /// A transfer that only received a body.
    pub fn received(bytes: u64) -> Self {
        Self {
            sent: 0,
            received: bytes,
        }
    }
}

/// Aggregated results of a load test run.
#[derive(Debug, Default)]
pub struct Report {
    duration: Duration,
    requests: BTreeMap<&'static str, RequestStats>,
    failures: BTreeMap<(&'static str, String), u64>,
}

impl Report {
    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Records a successful request.
    pub fn record_success(&mut self, name: &'static str, elapsed: Duration, transfer: Transfer) {
        let stats = self.requests.entry(name).or_default();
        stats.timing.add(elapsed.as_secs_f64());
        stats.bytes_sent += transfer.sent;
        stats.bytes_received += transfer.received;
    }

    /// Records a failed request. Failures with the same name and message are counted together.
    pub fn record_failure(&mut self, name: &'static str, elapsed: Duration, message: String) {
        let stats = self.requests.entry(name).or_default();
        stats.timing.add(elapsed.as_secs_f64());
        stats.failures += 1;
        *self.failures.entry((name, message)).or_default() += 1;
    }

    /// Statistics for requests reported under `name`.
    pub fn get(&self, name: &str) -> Option<&RequestStats> {
        self.requests.get(name)
    }

    /// Statistics across all requests.
    pub fn total(&self) -> RequestStats {
        let mut total = RequestStats::default();
        for stats in self.requests.values() {
            total.merge(stats);
        }
        total
    }

    /// Distinct failures as `(name, message, occurrences)`.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str, u64)> {
        self.failures
            .iter()
            .map(|((name, message), count)| (*name, message.as_str(), *count))
    }

    /// The time the run took.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Prints the report to stdout.
    pub fn print(&self) {
        for (name, stats) in &self.requests {
            println!();
            print_stats(name.bold().blue(), stats, self.duration);
        }

        println!();
        print_stats("TOTALS".bold(), &self.total(), self.duration);

        if !self.failures.is_empty() {
            println!();
            println!("{}", "## FAILURES".bold().red());
            for (name, message, count) in self.failures() {
                println!("  {} {name}: {message}", format!("{count}x").bold());
            }
        }
    }
}

fn print_stats(name: impl fmt::Display, stats: &RequestStats, duration: Duration) {
    print!("{} {name} ({} ops", "##".bold(), stats.requests().bold());
    if stats.failures > 0 {
        print!(", {}", format!("{} FAILURES", stats.failures).bold().red());
    }
    println!(")");

    if stats.requests() == 0 {
        return;
    }

    print_ops(&stats.timing, duration);
    if stats.bytes_sent > 0 {
        print!(", sent {}", throughput(stats.bytes_sent, duration).bold());
    }
    if stats.bytes_received > 0 {
        print!(", received {}", throughput(stats.bytes_received, duration).bold());
    }
    println!();
    print_percentiles(&stats.timing, Duration::from_secs_f64);
}

fn quantile(sketch: &DDSketch, q: f64) -> f64 {
    sketch.quantile(q).ok().flatten().unwrap_or_default()
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let ops = sketch.count();
    let avg = map(sketch.sum().unwrap_or_default() / ops as f64);
    let p50 = map(quantile(sketch, 0.5));
    let p90 = map(quantile(sketch, 0.9));
    let p99 = map(quantile(sketch, 0.99));
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn print_ops(sketch: &DDSketch, duration: Duration) {
    let ops = sketch.count();
    let ops_ps = ops as f64 / duration.as_secs_f64();
    print!("  {:.2} operations/s", ops_ps.bold());
}

fn throughput(total: u64, duration: Duration) -> String {
    let per_second = (total as f64 / duration.as_secs_f64()) as u64;
    format!("{:.2}/s", ByteSize::b(per_second))
}
