//! Test utilities for the load-test harness.
//!
//! This crate provides an in-process file storage server to run load against, and a tracing
//! initializer for tests. See the modules for all available utilities.

pub mod server;
pub mod tracing;
