use crate::blob::BlobReader;
use crate::completion::Completion;
use crate::error::Result;
use crate::outcome::{self, JobOutcome};
use crate::transport::ExecutionTransport;
use crate::types::{Digest, OutputDirectory, OutputFile};
use bytes::Bytes;
use futures::StreamExt;
use protobuf::remote_execution::{ActionResult, ExecuteRequest};
use std::{fmt, sync::Arc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Always run the action instead of answering from the cluster's action cache.
    pub skip_cache_lookup: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            skip_cache_lookup: true,
        }
    }
}

/// Runs actions on the remote cluster.
///
/// The action and all of its inputs must already be in the content-addressable storage.
#[derive(Clone)]
pub struct RemoteExecutionService {
    transport: Arc<dyn ExecutionTransport>,
    blobs: BlobReader,
    instance_name: String,
    options: ExecuteOptions,
}

impl RemoteExecutionService {
    pub fn new(
        transport: Arc<dyn ExecutionTransport>,
        blobs: BlobReader,
        instance_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            blobs,
            instance_name: instance_name.into(),
            options: ExecuteOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn blob_reader(&self) -> &BlobReader {
        &self.blobs
    }

    /// Submits `action_digest` and waits for the job's terminal outcome.
    ///
    /// There is no timeout: this resolves when the cluster finishes the operation stream or the
    /// transport fails. Intermediate updates are only logged, the last one before the stream
    /// ends decides the result.
    pub async fn execute(&self, action_digest: &Digest) -> Result<ExecutionResult> {
        let request = ExecuteRequest {
            instance_name: self.instance_name.clone(),
            skip_cache_lookup: self.options.skip_cache_lookup,
            action_digest: Some(action_digest.try_into()?),
        };
        tracing::info!(instance = %self.instance_name, action = %action_digest, "submitting action");

        let transport = self.transport.clone();
        let last = Completion::spawn(async move {
            let mut operations = transport.execute(request).await?;
            let mut last = None;
            while let Some(operation) = operations.next().await {
                let operation = operation?;
                if let Some(stage) = outcome::stage(&operation) {
                    tracing::debug!(operation = %operation.name, ?stage, "operation update");
                }
                last = Some(operation);
            }
            Ok(last)
        })
        .await?;

        let action_result = JobOutcome::from(last)
            .into_action_result()
            .map_err(|err| {
                tracing::warn!(action = %action_digest, error = %err, "action produced no result");
                err
            })?;
        tracing::debug!(action = %action_digest, exit_code = action_result.exit_code, "action finished");
        ExecutionResult::new(action_result, self.blobs.clone(), self.instance_name.clone())
    }
}

impl fmt::Debug for RemoteExecutionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteExecutionService")
            .field("instance_name", &self.instance_name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The outcome of a remote action.
///
/// Output listings are fixed when the result is received. Stderr is resolved on every call to
/// [`stderr`](Self::stderr), from the inline bytes or with a fresh read of the stderr blob.
#[derive(Debug)]
pub struct ExecutionResult {
    exit_code: i32,
    output_files: Vec<OutputFile>,
    output_directories: Vec<OutputDirectory>,
    stderr_raw: Bytes,
    stderr_digest: Digest,
    blobs: BlobReader,
    instance_name: String,
}

impl ExecutionResult {
    fn new(result: ActionResult, blobs: BlobReader, instance_name: String) -> Result<Self> {
        Ok(Self {
            exit_code: result.exit_code,
            output_files: result
                .output_files
                .into_iter()
                .map(OutputFile::try_from)
                .collect::<Result<_>>()?,
            output_directories: result
                .output_directories
                .into_iter()
                .map(OutputDirectory::try_from)
                .collect::<Result<_>>()?,
            stderr_raw: Bytes::from(result.stderr_raw),
            stderr_digest: Digest::from_wire(result.stderr_digest)?,
            blobs,
            instance_name,
        })
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn output_files(&self) -> &[OutputFile] {
        &self.output_files
    }

    pub fn output_directories(&self) -> &[OutputDirectory] {
        &self.output_directories
    }

    /// The action's stderr, decoded lossily as UTF-8.
    ///
    /// Inline bytes win when present, and an empty stderr digest means there is nothing to
    /// fetch. Otherwise the whole stderr blob is read from storage, every time this is called.
    pub async fn stderr(&self) -> Result<String> {
        if !self.stderr_raw.is_empty() || self.stderr_digest.size_bytes == 0 {
            tracing::debug!(len = self.stderr_raw.len(), "got inline stderr");
            return Ok(String::from_utf8_lossy(&self.stderr_raw).into_owned());
        }
        tracing::debug!(digest = %self.stderr_digest, "got stderr digest");
        let data = self
            .blobs
            .fetch(&self.instance_name, &self.stderr_digest)
            .await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}
