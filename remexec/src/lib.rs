//! Client for Bazel-style Remote Execution clusters.
//!
//! [`RemoteExecutionClients`] owns one channel to the execution cluster and one to its
//! content-addressable storage. Actions are submitted by digest through
//! [`RemoteExecutionService::execute`], which follows the job's operation stream to its terminal
//! outcome. Output too large to return inline is read back with the [`BlobReader`].
//!
//! Nothing here retries, caches or cancels: every failure goes straight back to the caller.

mod blob;
pub mod blocking;
mod channel;
mod clients;
mod completion;
pub mod error;
mod execution;
mod outcome;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use blob::{BlobReader, ChunkSink};
pub use channel::{Lease, ManagedChannel};
pub use clients::{ClientConfig, RemoteExecutionClients, SHUTDOWN_TIMEOUT};
pub use completion::Completion;
pub use error::{Error, Result};
pub use execution::{ExecuteOptions, ExecutionResult, RemoteExecutionService};
pub use outcome::JobOutcome;
pub use types::{resource_name, Digest, OutputDirectory, OutputFile, ReadResource};
