//! A module for defining a [`Workload`]: the task mix every simulated user runs.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::RngCore;
use rand::distr::Uniform;
use rand::rngs::SmallRng;
use rand_distr::Distribution;
use rand_distr::weighted::WeightedIndex;
use serde::{Deserialize, Serialize};

/// A single kind of task a simulated user can perform.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Task {
    /// Upload a randomly generated file.
    Upload,
    /// Download one of the files known to the user.
    Download,
    /// List all files stored on the server.
    List,
    /// Request the health endpoint.
    Health,
    /// Request the metrics endpoint.
    Metrics,
    /// Request the root endpoint.
    Root,
}

impl Task {
    /// All tasks, in the order used by [`TaskWeights`].
    pub const ALL: [Task; 6] = [
        Task::Upload,
        Task::Download,
        Task::List,
        Task::Health,
        Task::Metrics,
        Task::Root,
    ];
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Task::Upload => "upload",
            Task::Download => "download",
            Task::List => "list",
            Task::Health => "health",
            Task::Metrics => "metrics",
            Task::Root => "root",
        };
        f.write_str(name)
    }
}

/// Relative frequencies of the tasks.
///
/// A task with weight `0` is never chosen. At least one weight must be non-zero.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaskWeights {
    /// Weight of [`Task::Upload`].
    pub upload: u32,
    /// Weight of [`Task::Download`].
    pub download: u32,
    /// Weight of [`Task::List`].
    pub list: u32,
    /// Weight of [`Task::Health`].
    pub health: u32,
    /// Weight of [`Task::Metrics`].
    pub metrics: u32,
    /// Weight of [`Task::Root`].
    pub root: u32,
}

impl TaskWeights {
    fn get(&self, task: Task) -> u32 {
        match task {
            Task::Upload => self.upload,
            Task::Download => self.download,
            Task::List => self.list,
            Task::Health => self.health,
            Task::Metrics => self.metrics,
            Task::Root => self.root,
        }
    }
}

impl Default for TaskWeights {
    fn default() -> Self {
        Self {
            upload: 3,
            download: 2,
            list: 2,
            health: 1,
            metrics: 1,
            root: 1,
        }
    }
}

/// A builder for creating a [`Workload`].
#[derive(Debug)]
pub struct WorkloadBuilder {
    users: usize,
    ramp_up: Duration,
    seed: u64,

    min_wait: Duration,
    max_wait: Duration,

    min_payload: u64,
    max_payload: u64,

    weights: TaskWeights,
}

impl WorkloadBuilder {
    /// The number of simulated users running concurrently.
    pub fn users(mut self, users: usize) -> Self {
        self.users = users;
        self
    }

    /// The period over which user starts are spread evenly.
    ///
    /// With a zero ramp-up, all users start at once.
    pub fn ramp_up(mut self, ramp_up: Duration) -> Self {
        self.ramp_up = ramp_up;
        self
    }

    /// Seed for all randomness, making task choices and payloads reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Range of the think-time between two consecutive tasks of a user.
    pub fn wait_time(mut self, min: Duration, max: Duration) -> Self {
        self.min_wait = min;
        self.max_wait = max;
        self
    }

    /// Range of the sizes of uploaded files, in bytes.
    pub fn payload_sizes(mut self, min: u64, max: u64) -> Self {
        self.min_payload = min;
        self.max_payload = max;
        self
    }

    /// The relative frequencies of the tasks.
    pub fn task_weights(mut self, weights: TaskWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Creates the workload instance.
    ///
    /// Fails if all task weights are zero or if a range is inverted.
    pub fn build(self) -> Result<Workload> {
        let task_distribution = WeightedIndex::new(Task::ALL.map(|task| self.weights.get(task)))
            .context("invalid task weights")?;
        let wait_distribution = Uniform::new_inclusive(self.min_wait, self.max_wait)
            .context("invalid wait time range")?;
        let payload_distribution = Uniform::new_inclusive(self.min_payload, self.max_payload)
            .context("invalid payload size range")?;

        Ok(Workload {
            users: self.users,
            ramp_up: self.ramp_up,
            seed: self.seed,

            task_distribution,
            wait_distribution,
            payload_distribution,
        })
    }
}

/// Specification of the load that each simulated user generates.
///
/// The workload itself is immutable and shared by all users. Per-user state lives in
/// [`User`](crate::session::User).
#[derive(Debug)]
pub struct Workload {
    /// The number of simulated users running concurrently.
    pub(crate) users: usize,
    /// The period over which user starts are spread.
    pub(crate) ramp_up: Duration,
    /// The base seed, combined with the user ID to seed each user's RNG.
    pub(crate) seed: u64,

    /// A distribution that picks the next task.
    task_distribution: WeightedIndex<u32>,
    /// A distribution of think-times between tasks.
    wait_distribution: Uniform<Duration>,
    /// A distribution of payload sizes for uploads.
    payload_distribution: Uniform<u64>,
}

impl Workload {
    /// Constructs a new workload builder with defaults matching the file storage API's expected
    /// traffic.
    pub fn builder() -> WorkloadBuilder {
        WorkloadBuilder {
            users: 1,
            ramp_up: Duration::ZERO,
            seed: rand::random(),

            min_wait: Duration::from_millis(300),
            max_wait: Duration::from_millis(1200),

            min_payload: 512,
            max_payload: 2048,

            weights: TaskWeights::default(),
        }
    }

    /// The number of simulated users.
    pub fn users(&self) -> usize {
        self.users
    }

    pub(crate) fn sample_task(&self, rng: &mut SmallRng) -> Task {
        Task::ALL[self.task_distribution.sample(rng)]
    }

    pub(crate) fn sample_wait(&self, rng: &mut SmallRng) -> Duration {
        self.wait_distribution.sample(rng)
    }

    pub(crate) fn sample_payload(&self, rng: &mut SmallRng) -> Vec<u8> {
        let len = self.payload_distribution.sample(rng) as usize;
        let mut payload = vec![0; len];
        rng.fill_bytes(&mut payload);
        payload
    }

    /// Delay before user `id` starts, spreading all starts across the ramp-up period.
    pub(crate) fn start_delay(&self, id: usize) -> Duration {
        if self.users == 0 {
            return Duration::ZERO;
        }
        self.ramp_up.mul_f64(id as f64 / self.users as f64)
    }
}
