use std::{io, result, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Channel or call level failure, surfaced exactly as the transport reported it.
    #[error(transparent)]
    Transport(#[from] tonic::Status),
    #[error("failed to connect: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error("invalid operation response: {0}")]
    ProtocolViolation(&'static str),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("cancelled while awaiting completion")]
    Cancelled,
    #[error("{channel} channel did not terminate within {timeout:?}")]
    Shutdown {
        channel: &'static str,
        timeout: Duration,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid resource name: {0:?}")]
    InvalidResourceName(String),
    #[error("invalid trace id: {0:?}")]
    InvalidTraceId(String),
    #[error("invalid endpoint: {0:?}")]
    InvalidEndpoint(String),
    #[error("remote execution infrastructure failure: {0}")]
    Infrastructure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = result::Result<T, Error>;
