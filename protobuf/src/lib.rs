//! Generated Remote Execution API, long-running operation and ByteStream types.
//!
//! Modules mirror the proto packages so the `super::` paths emitted by
//! `tonic-build` for cross-package references resolve.

pub mod build {
    pub mod bazel {
        pub mod remote {
            pub mod execution {
                pub mod v2 {
                    tonic::include_proto!("build.bazel.remote.execution.v2");

                    /// `type_url` carried by an `Any` wrapping an [`ExecuteResponse`].
                    pub const EXECUTE_RESPONSE_TYPE_URL: &str =
                        "type.googleapis.com/build.bazel.remote.execution.v2.ExecuteResponse";

                    /// `type_url` carried by an `Any` wrapping an [`ExecuteOperationMetadata`].
                    pub const EXECUTE_OPERATION_METADATA_TYPE_URL: &str =
                        "type.googleapis.com/build.bazel.remote.execution.v2.ExecuteOperationMetadata";
                }
            }
        }
    }
}

pub mod google {
    pub mod bytestream {
        tonic::include_proto!("google.bytestream");
    }

    pub mod longrunning {
        tonic::include_proto!("google.longrunning");
    }

    pub mod rpc {
        tonic::include_proto!("google.rpc");
    }
}

pub use build::bazel::remote::execution::v2 as remote_execution;
pub use google::{bytestream, longrunning, rpc};
