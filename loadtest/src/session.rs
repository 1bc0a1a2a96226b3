//! State and decisions of a single simulated user.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::workload::{Task, Workload};

/// The maximum number of filenames a user remembers.
pub const MAX_KNOWN_FILES: usize = 32;

/// A bounded list of filenames known to exist on the server.
///
/// Holds at most [`MAX_KNOWN_FILES`] entries. Pushing onto a full list evicts the oldest entry.
#[derive(Clone, Debug, Default)]
pub struct KnownFiles {
    files: VecDeque<String>,
}

impl KnownFiles {
    /// Remembers `filename`, evicting the oldest entry if the list is full.
    pub fn push(&mut self, filename: String) {
        if self.files.len() >= MAX_KNOWN_FILES {
            self.files.pop_front();
        }
        self.files.push_back(filename);
    }

    /// Merges filenames reported by the server into the list.
    ///
    /// Duplicates collapse. Already known filenames keep their position and come first, followed
    /// by new filenames in the order given. Everything beyond [`MAX_KNOWN_FILES`] is dropped.
    pub fn merge(&mut self, reported: impl IntoIterator<Item = String>) {
        let mut seen: HashSet<String> = self.files.iter().cloned().collect();
        for filename in reported {
            if self.files.len() >= MAX_KNOWN_FILES {
                break;
            }
            if seen.insert(filename.clone()) {
                self.files.push_back(filename);
            }
        }
    }

    /// Picks a filename uniformly at random, or `None` if the list is empty.
    pub fn choose(&self, rng: &mut impl Rng) -> Option<&str> {
        if self.files.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.files.len());
        self.files.get(index).map(String::as_str)
    }

    /// Returns `true` if `filename` is in the list.
    pub fn contains(&self, filename: &str) -> bool {
        self.files.iter().any(|f| f == filename)
    }

    /// The number of known filenames.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no filenames are known.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates the known filenames, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }
}

/// Why an upload is performed. Determines the filename prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UploadReason {
    /// The upload every user performs when it starts.
    Seed,
    /// A regular upload task.
    Task,
    /// A download was chosen, but no files were known.
    Fallback,
}

impl UploadReason {
    fn prefix(self) -> &'static str {
        match self {
            UploadReason::Seed => "seed",
            UploadReason::Task => "upload",
            UploadReason::Fallback => "fallback",
        }
    }
}

/// A generated file to upload.
#[derive(Debug)]
pub struct Upload {
    /// Unique name of the form `<prefix>-<uuid>.bin`.
    pub filename: String,
    /// Random contents.
    pub contents: Vec<u8>,
}

/// A request a user is about to perform.
#[derive(Debug)]
pub enum Action {
    /// `POST /files`
    Upload(Upload),
    /// `GET /files/{filename}`
    Download(String),
    /// `GET /files`
    List,
    /// `GET /health`
    Health,
    /// `GET /metrics`
    Metrics,
    /// `GET /`
    Root,
}

impl Action {
    /// The name under which the request is reported.
    ///
    /// Downloads of different files share one name.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Upload(_) => "/files [POST]",
            Action::Download(_) => "/files/{filename}",
            Action::List => "/files",
            Action::Health => "/health",
            Action::Metrics => "/metrics",
            Action::Root => "/",
        }
    }
}

/// A simulated user.
///
/// Each user owns its RNG and its list of known files. Nothing is shared with other users except
/// the immutable [`Workload`].
#[derive(Debug)]
pub struct User {
    id: usize,
    rng: SmallRng,
    workload: Arc<Workload>,
    known_files: KnownFiles,
}

impl User {
    /// Creates user `id`. Its randomness is derived from the workload seed and the ID.
    pub fn new(id: usize, workload: Arc<Workload>) -> Self {
        let rng = SmallRng::seed_from_u64(workload.seed.wrapping_add(id as u64));
        Self {
            id,
            rng,
            workload,
            known_files: KnownFiles::default(),
        }
    }

    /// The ID of this user.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Files this user knows about.
    pub fn known_files(&self) -> &KnownFiles {
        &self.known_files
    }

    /// The upload performed when the user starts, so there is something to download.
    pub fn seed_upload(&mut self) -> Action {
        Action::Upload(self.generate_upload(UploadReason::Seed))
    }

    /// Picks the next task and turns it into an action.
    ///
    /// A download with no known files becomes an upload instead.
    pub fn next_action(&mut self) -> Action {
        let task = self.workload.sample_task(&mut self.rng);
        self.action_for(task)
    }

    fn action_for(&mut self, task: Task) -> Action {
        match task {
            Task::Upload => Action::Upload(self.generate_upload(UploadReason::Task)),
            Task::Download => {
                let chosen = self.known_files.choose(&mut self.rng).map(str::to_owned);
                match chosen {
                    Some(filename) => Action::Download(filename),
                    None => {
                        tracing::trace!(user = self.id, "no known files, uploading instead");
                        Action::Upload(self.generate_upload(UploadReason::Fallback))
                    }
                }
            }
            Task::List => Action::List,
            Task::Health => Action::Health,
            Task::Metrics => Action::Metrics,
            Task::Root => Action::Root,
        }
    }

    /// How long to wait before the next action.
    pub fn think_time(&mut self) -> Duration {
        self.workload.sample_wait(&mut self.rng)
    }

    /// Records a successful upload.
    pub fn uploaded(&mut self, filename: String) {
        self.known_files.push(filename);
    }

    /// Records the filenames reported by a successful listing.
    pub fn listed(&mut self, files: Vec<String>) {
        self.known_files.merge(files);
    }

    fn generate_upload(&mut self, reason: UploadReason) -> Upload {
        let filename = format!("{}-{}.bin", reason.prefix(), uuid::Uuid::new_v4().simple());
        let contents = self.workload.sample_payload(&mut self.rng);
        Upload { filename, contents }
    }
}
