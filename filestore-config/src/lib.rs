//! Storage directory configuration for the file storage service.
//!
//! The service keeps all of its files below a single directory. [`StorageDir`] is the handle to
//! that directory: constructing it creates the directory on disk, and it never changes afterwards.
//!
//! There are two ways to obtain one:
//!
//! - [`StorageDir::create`] returns an owned value. Construct it once at startup and pass it by
//!   reference to everything that needs it.
//! - [`StorageDir::init`] installs a process-wide instance. The first call wins; later calls
//!   return the same instance and ignore their argument.
//!
//! [`Config`] loads the directory path from defaults, a YAML file and the environment.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod storage_dir;

pub use crate::config::Config;
pub use crate::storage_dir::StorageDir;
