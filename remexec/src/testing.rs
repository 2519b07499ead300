//! Scripted stand-ins for the execution cluster and the blob store.
//!
//! The same scripts back both the in-memory transports (no network at all) and the fake tonic
//! services served over a local TCP port.

use crate::transport::{ByteStreamTransport, ExecutionTransport, OperationStream, ReadStream};
use crate::types::{resource_name, Digest};
use futures::{stream, StreamExt};
use prost::Message;
use protobuf::bytestream::{
    byte_stream_server::{ByteStream, ByteStreamServer},
    ReadRequest, ReadResponse,
};
use protobuf::longrunning::{operation, Operation};
use protobuf::remote_execution::{
    self as proto,
    execution_server::{Execution, ExecutionServer},
    execution_stage, ActionResult, ExecuteOperationMetadata, ExecuteRequest, ExecuteResponse,
    EXECUTE_OPERATION_METADATA_TYPE_URL, EXECUTE_RESPONSE_TYPE_URL,
};
use protobuf::rpc;
use std::{collections::HashMap, net::SocketAddr, sync::Arc, sync::Mutex};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{
    metadata::MetadataMap,
    transport::{Channel, Server},
    Code, Request, Response, Status,
};

/// One message of a scripted execute stream.
#[derive(Clone, Debug)]
pub enum Step {
    Update(Operation),
    Fail(Code, String),
}

pub fn pending(stage: execution_stage::Value) -> Operation {
    let metadata = ExecuteOperationMetadata {
        stage: stage as i32,
        ..Default::default()
    };
    Operation {
        name: "operations/job".into(),
        metadata: Some(prost_types::Any {
            type_url: EXECUTE_OPERATION_METADATA_TYPE_URL.into(),
            value: metadata.encode_to_vec(),
        }),
        done: false,
        result: None,
    }
}

pub fn errored(message: &str) -> Operation {
    Operation {
        name: "operations/job".into(),
        metadata: None,
        done: true,
        result: Some(operation::Result::Error(rpc::Status {
            code: Code::Internal as i32,
            message: message.into(),
            details: vec![],
        })),
    }
}

pub fn responded_with(response: ExecuteResponse) -> Operation {
    responded_any(prost_types::Any {
        type_url: EXECUTE_RESPONSE_TYPE_URL.into(),
        value: response.encode_to_vec(),
    })
}

pub fn responded(result: ActionResult) -> Operation {
    responded_with(ExecuteResponse {
        result: Some(result),
        ..Default::default()
    })
}

pub fn responded_any(payload: prost_types::Any) -> Operation {
    Operation {
        name: "operations/job".into(),
        metadata: None,
        done: true,
        result: Some(operation::Result::Response(payload)),
    }
}

pub fn action_result(exit_code: i32, stderr_raw: &[u8], stderr_digest: &Digest) -> ActionResult {
    ActionResult {
        exit_code,
        stderr_raw: stderr_raw.to_vec(),
        stderr_digest: Some(proto::Digest::try_from(stderr_digest).expect("wire digest")),
        ..Default::default()
    }
}

fn trace_id(metadata: &MetadataMap) -> Option<String> {
    metadata
        .get(crate::transport::TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Execute streams keyed by action hash.
#[derive(Default)]
pub struct ScriptedExecution {
    jobs: Mutex<HashMap<String, Vec<Step>>>,
    requests: Mutex<Vec<ExecuteRequest>>,
    trace_ids: Mutex<Vec<Option<String>>>,
}

impl ScriptedExecution {
    pub fn insert(&self, action: &Digest, steps: Vec<Step>) {
        self.jobs.lock().unwrap().insert(action.hash.clone(), steps);
    }

    pub fn requests(&self) -> Vec<ExecuteRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn trace_ids(&self) -> Vec<Option<String>> {
        self.trace_ids.lock().unwrap().clone()
    }

    fn stream(&self, request: ExecuteRequest) -> Result<OperationStream, Status> {
        let hash = request
            .action_digest
            .as_ref()
            .map(|digest| digest.hash.clone())
            .unwrap_or_default();
        self.requests.lock().unwrap().push(request);
        let steps = self
            .jobs
            .lock()
            .unwrap()
            .get(&hash)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("no such action {}", hash)))?;
        let updates = steps.into_iter().map(|step| match step {
            Step::Update(operation) => Ok(operation),
            Step::Fail(code, message) => Err(Status::new(code, message)),
        });
        Ok(stream::iter(updates).boxed())
    }
}

#[tonic::async_trait]
impl ExecutionTransport for ScriptedExecution {
    async fn execute(&self, request: ExecuteRequest) -> Result<OperationStream, Status> {
        self.stream(request)
    }
}

enum BlobScript {
    Fragments(Vec<Vec<u8>>),
    Failing(Vec<Vec<u8>>, String),
    Hang,
}

/// Blob contents keyed by resource name.
#[derive(Default)]
pub struct ScriptedBlobs {
    blobs: Mutex<HashMap<String, BlobScript>>,
    requests: Mutex<Vec<ReadRequest>>,
    trace_ids: Mutex<Vec<Option<String>>>,
}

impl ScriptedBlobs {
    pub fn insert(&self, instance_name: &str, digest: &Digest, data: &[u8]) {
        self.insert_fragments(instance_name, digest, vec![data.to_vec()]);
    }

    pub fn insert_fragments(&self, instance_name: &str, digest: &Digest, fragments: Vec<Vec<u8>>) {
        self.script(instance_name, digest, BlobScript::Fragments(fragments));
    }

    /// Delivers `fragments`, then fails the stream with `UNAVAILABLE`.
    pub fn insert_failing(
        &self,
        instance_name: &str,
        digest: &Digest,
        fragments: Vec<Vec<u8>>,
        message: &str,
    ) {
        self.script(
            instance_name,
            digest,
            BlobScript::Failing(fragments, message.to_string()),
        );
    }

    /// A read that never delivers anything and never finishes.
    pub fn insert_hanging(&self, instance_name: &str, digest: &Digest) {
        self.script(instance_name, digest, BlobScript::Hang);
    }

    pub fn requests(&self) -> Vec<ReadRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn trace_ids(&self) -> Vec<Option<String>> {
        self.trace_ids.lock().unwrap().clone()
    }

    fn script(&self, instance_name: &str, digest: &Digest, script: BlobScript) {
        self.blobs
            .lock()
            .unwrap()
            .insert(resource_name(instance_name, digest), script);
    }

    fn stream(&self, request: ReadRequest) -> Result<ReadStream, Status> {
        let name = request.resource_name.clone();
        self.requests.lock().unwrap().push(request);
        let blobs = self.blobs.lock().unwrap();
        let chunks = |fragments: &[Vec<u8>]| {
            fragments
                .iter()
                .map(|data| Ok(ReadResponse { data: data.clone() }))
                .collect::<Vec<_>>()
        };
        match blobs.get(&name) {
            Some(BlobScript::Fragments(fragments)) => Ok(stream::iter(chunks(fragments)).boxed()),
            Some(BlobScript::Failing(fragments, message)) => {
                let mut items = chunks(fragments);
                items.push(Err(Status::unavailable(message.clone())));
                Ok(stream::iter(items).boxed())
            }
            Some(BlobScript::Hang) => Ok(stream::pending().boxed()),
            None => Err(Status::not_found(format!("blob {} not found", name))),
        }
    }
}

#[tonic::async_trait]
impl ByteStreamTransport for ScriptedBlobs {
    async fn read(&self, request: ReadRequest) -> Result<ReadStream, Status> {
        self.stream(request)
    }
}

struct FakeExecution(Arc<ScriptedExecution>);

#[tonic::async_trait]
impl Execution for FakeExecution {
    type ExecuteStream = OperationStream;

    async fn execute(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<Self::ExecuteStream>, Status> {
        self.0
            .trace_ids
            .lock()
            .unwrap()
            .push(trace_id(request.metadata()));
        self.0.stream(request.into_inner()).map(Response::new)
    }
}

struct FakeByteStream(Arc<ScriptedBlobs>);

#[tonic::async_trait]
impl ByteStream for FakeByteStream {
    type ReadStream = ReadStream;

    async fn read(
        &self,
        request: Request<ReadRequest>,
    ) -> Result<Response<Self::ReadStream>, Status> {
        self.0
            .trace_ids
            .lock()
            .unwrap()
            .push(trace_id(request.metadata()));
        self.0.stream(request.into_inner()).map(Response::new)
    }
}

/// Serves both fakes on an ephemeral local port.
pub async fn serve(execution: Arc<ScriptedExecution>, blobs: Arc<ScriptedBlobs>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake cluster");
    let addr = listener.local_addr().expect("fake cluster addr");
    tokio::spawn(async move {
        let _ = Server::builder()
            .add_service(ExecutionServer::new(FakeExecution(execution)))
            .add_service(ByteStreamServer::new(FakeByteStream(blobs)))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });
    addr
}

pub async fn connect(addr: SocketAddr) -> Channel {
    Channel::from_shared(format!("http://{}", addr))
        .expect("channel parse error")
        .connect()
        .await
        .expect("channel connect")
}
