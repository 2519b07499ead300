//! The wire-protocol seam.
//!
//! The execution invoker and blob reader only see [`ExecutionTransport`] and
//! [`ByteStreamTransport`]. The gRPC implementations below are what
//! [`RemoteExecutionClients`](crate::RemoteExecutionClients) wires up; tests substitute scripted ones.

use crate::channel::{Lease, ManagedChannel};
use crate::error::{Error, Result};
use futures::{stream::BoxStream, Stream, StreamExt};
use protobuf::bytestream::{byte_stream_client::ByteStreamClient, ReadRequest, ReadResponse};
use protobuf::longrunning::Operation;
use protobuf::remote_execution::{execution_client::ExecutionClient, ExecuteRequest};
use std::{
    pin::Pin,
    str::FromStr,
    task::{Context, Poll},
};
use tonic::{
    codegen::InterceptedService,
    metadata::{Ascii, MetadataValue},
    service::Interceptor,
    transport::Channel,
    Request, Status,
};

pub type OperationStream = BoxStream<'static, std::result::Result<Operation, Status>>;
pub type ReadStream = BoxStream<'static, std::result::Result<ReadResponse, Status>>;

pub const TRACE_ID_HEADER: &str = "trace-id";

/// Submits execute requests; yields the operation updates of the resulting job.
#[tonic::async_trait]
pub trait ExecutionTransport: Send + Sync {
    async fn execute(
        &self,
        request: ExecuteRequest,
    ) -> std::result::Result<OperationStream, Status>;
}

/// Issues ByteStream reads against the content-addressable storage.
#[tonic::async_trait]
pub trait ByteStreamTransport: Send + Sync {
    async fn read(&self, request: ReadRequest) -> std::result::Result<ReadStream, Status>;
}

/// Adds the configured trace token to every request it sees.
#[derive(Clone, Debug, Default)]
pub struct TraceInterceptor {
    trace_id: Option<MetadataValue<Ascii>>,
}

impl TraceInterceptor {
    pub fn new(trace_id: Option<&str>) -> Result<Self> {
        let trace_id = trace_id
            .map(|token| {
                MetadataValue::from_str(token).map_err(|_| Error::InvalidTraceId(token.to_string()))
            })
            .transpose()?;
        Ok(Self { trace_id })
    }
}

impl Interceptor for TraceInterceptor {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        if let Some(trace_id) = &self.trace_id {
            request
                .metadata_mut()
                .insert(TRACE_ID_HEADER, trace_id.clone());
        }
        Ok(request)
    }
}

pub struct GrpcExecution {
    channel: ManagedChannel,
    client: ExecutionClient<InterceptedService<Channel, TraceInterceptor>>,
}

impl GrpcExecution {
    pub fn new(channel: ManagedChannel, interceptor: TraceInterceptor) -> Self {
        let client = ExecutionClient::with_interceptor(channel.channel(), interceptor);
        Self { channel, client }
    }
}

#[tonic::async_trait]
impl ExecutionTransport for GrpcExecution {
    async fn execute(
        &self,
        request: ExecuteRequest,
    ) -> std::result::Result<OperationStream, Status> {
        let lease = self.channel.lease()?;
        let mut client = self.client.clone();
        let operations = client.execute(Request::new(request)).await?.into_inner();
        Ok(Leased::new(operations.boxed(), lease).boxed())
    }
}

/// ByteStream reads never carry the trace token.
pub struct GrpcByteStream {
    channel: ManagedChannel,
    client: ByteStreamClient<Channel>,
}

impl GrpcByteStream {
    pub fn new(channel: ManagedChannel) -> Self {
        let client = ByteStreamClient::new(channel.channel());
        Self { channel, client }
    }
}

#[tonic::async_trait]
impl ByteStreamTransport for GrpcByteStream {
    async fn read(&self, request: ReadRequest) -> std::result::Result<ReadStream, Status> {
        let lease = self.channel.lease()?;
        let mut client = self.client.clone();
        let chunks = client.read(Request::new(request)).await?.into_inner();
        Ok(Leased::new(chunks.boxed(), lease).boxed())
    }
}

/// A response stream that keeps its channel alive until dropped.
struct Leased<S> {
    inner: S,
    _lease: Lease,
}

impl<S> Leased<S> {
    fn new(inner: S, lease: Lease) -> Self {
        Self {
            inner,
            _lease: lease,
        }
    }
}

impl<S: Stream + Unpin> Stream for Leased<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}
