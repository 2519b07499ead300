//! Thread-blocking wrappers over the async clients.
//!
//! For callers that are not running on the runtime, e.g. a build orchestrator's worker threads.
//! Every call parks the calling thread until the underlying completion resolves, including the
//! nested blob read behind [`BlockingExecutionResult::stderr`]. There is no timeout.
//!
//! The runtime behind the handle must be multi-threaded, and these methods must not be called
//! from inside it: `Handle::block_on` panics on a runtime thread.

use crate::error::Result;
use crate::execution::{ExecutionResult, RemoteExecutionService};
use crate::types::{Digest, OutputDirectory, OutputFile};
use bytes::Bytes;
use tokio::runtime::Handle;

#[derive(Clone, Debug)]
pub struct BlockingService {
    inner: RemoteExecutionService,
    handle: Handle,
}

impl BlockingService {
    pub fn new(inner: RemoteExecutionService, handle: Handle) -> Self {
        Self { inner, handle }
    }

    pub fn execute(&self, action_digest: &Digest) -> Result<BlockingExecutionResult> {
        let inner = self.handle.block_on(self.inner.execute(action_digest))?;
        Ok(BlockingExecutionResult {
            inner,
            handle: self.handle.clone(),
        })
    }

    /// Reads a whole blob from the service's instance.
    pub fn fetch_blob(&self, digest: &Digest) -> Result<Bytes> {
        let blobs = self.inner.blob_reader();
        self.handle
            .block_on(blobs.fetch(self.inner.instance_name(), digest))
    }
}

#[derive(Debug)]
pub struct BlockingExecutionResult {
    inner: ExecutionResult,
    handle: Handle,
}

impl BlockingExecutionResult {
    pub fn exit_code(&self) -> i32 {
        self.inner.exit_code()
    }

    pub fn output_files(&self) -> &[OutputFile] {
        self.inner.output_files()
    }

    pub fn output_directories(&self) -> &[OutputDirectory] {
        self.inner.output_directories()
    }

    /// Resolves stderr, blocking on a blob read when it was not returned inline.
    pub fn stderr(&self) -> Result<String> {
        self.handle.block_on(self.inner.stderr())
    }

    pub fn into_inner(self) -> ExecutionResult {
        self.inner
    }
}
