const PROTOS: &[&str] = &[
    "proto/build/bazel/remote/execution/v2/remote_execution.proto",
    "proto/google/bytestream/bytestream.proto",
    "proto/google/longrunning/operations.proto",
    "proto/google/rpc/status.proto",
];

fn main() {
    println!("cargo:rerun-if-changed=./proto");
    tonic_build::configure()
        .compile(PROTOS, &["proto"])
        .unwrap_or_else(|err| panic!("Failed to compile protos {:?}", err));
}
