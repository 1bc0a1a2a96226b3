//! A load testing library which simulates concurrent users of a file storage HTTP API.
//!
//! Every simulated [`User`](session::User) runs the same [`Workload`]: a weighted mix of uploads,
//! downloads, listings and requests to the health, metrics and root endpoints, with a randomized
//! think-time between two tasks.
//!
//! Users remember up to 32 filenames they uploaded or saw in a listing, and download one of those
//! at random. A user that knows no files uploads one instead of downloading.
//!
//! [`run`] drives all users until a deadline and returns a [`Report`](metrics::Report) with
//! per-endpoint latencies and failures.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod http;
pub mod metrics;
pub mod observability;
pub mod runner;
pub mod session;
pub mod workload;

pub use crate::runner::run;
pub use crate::workload::Workload;
