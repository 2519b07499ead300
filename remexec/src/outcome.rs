use crate::error::{Error, Result};
use prost::Message;
use protobuf::longrunning::{operation, Operation};
use protobuf::remote_execution::{
    execution_stage, ActionResult, ExecuteOperationMetadata, ExecuteResponse,
    EXECUTE_OPERATION_METADATA_TYPE_URL, EXECUTE_RESPONSE_TYPE_URL,
};

/// The last thing the cluster told us about a job.
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome {
    /// Still running, or the stream ended without ever reporting a result.
    Pending,
    Errored(String),
    Responded(prost_types::Any),
}

impl From<Operation> for JobOutcome {
    fn from(operation: Operation) -> Self {
        match operation.result {
            None => JobOutcome::Pending,
            Some(operation::Result::Error(status)) => JobOutcome::Errored(status.message),
            Some(operation::Result::Response(payload)) => JobOutcome::Responded(payload),
        }
    }
}

impl From<Option<Operation>> for JobOutcome {
    fn from(last: Option<Operation>) -> Self {
        last.map_or(JobOutcome::Pending, JobOutcome::from)
    }
}

impl JobOutcome {
    /// Classifies the terminal outcome of a job into its action result or a failure.
    pub fn into_action_result(self) -> Result<ActionResult> {
        let payload = match self {
            JobOutcome::Pending => return Err(Error::ProtocolViolation("missing response")),
            JobOutcome::Errored(message) => return Err(Error::ExecutionFailed(message)),
            JobOutcome::Responded(payload) => payload,
        };
        let response: ExecuteResponse = unpack(&payload, EXECUTE_RESPONSE_TYPE_URL)
            .ok_or(Error::ProtocolViolation("malformed response"))?;
        if let Some(status) = response.status.filter(|status| status.code != 0) {
            return Err(Error::ExecutionFailed(status.message));
        }
        response
            .result
            .ok_or(Error::ProtocolViolation("missing response"))
    }
}

/// The execution stage reported in a pending update's metadata, if it carries one.
pub fn stage(operation: &Operation) -> Option<execution_stage::Value> {
    let metadata: ExecuteOperationMetadata =
        unpack(operation.metadata.as_ref()?, EXECUTE_OPERATION_METADATA_TYPE_URL)?;
    execution_stage::Value::from_i32(metadata.stage)
}

fn unpack<M: Message + Default>(payload: &prost_types::Any, type_url: &str) -> Option<M> {
    // servers are free to use any host part in the type url
    let expected = type_url.rsplit('/').next()?;
    if payload.type_url.rsplit('/').next() != Some(expected) {
        return None;
    }
    M::decode(payload.value.as_slice()).ok()
}
