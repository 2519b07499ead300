use crate::completion::Completion;
use crate::transport::ByteStreamTransport;
use crate::types::{resource_name, Chunk, Digest};
use bytes::Bytes;
use futures::StreamExt;
use protobuf::bytestream::ReadRequest;
use std::{fmt, io, sync::Arc};

/// Most `fetch` reserves up front. Digest sizes come from the remote end and are not trusted.
const FETCH_PREALLOC_LIMIT: u64 = 1 << 20;

/// Receives the fragments of a blob read, in arrival order.
///
/// Runs on the task driving the read, so it shares a runtime worker with unrelated calls:
/// keep it short and never block in it. An `Err` aborts the read and becomes its failure.
pub trait ChunkSink: Send + 'static {
    fn accept(&mut self, chunk: Chunk) -> io::Result<()>;
}

impl<F> ChunkSink for F
where
    F: FnMut(Chunk) -> io::Result<()> + Send + 'static,
{
    fn accept(&mut self, chunk: Chunk) -> io::Result<()> {
        self(chunk)
    }
}

impl ChunkSink for Vec<u8> {
    fn accept(&mut self, chunk: Chunk) -> io::Result<()> {
        self.extend_from_slice(&chunk);
        Ok(())
    }
}

/// Streams blobs out of the content-addressable storage.
#[derive(Clone)]
pub struct BlobReader {
    transport: Arc<dyn ByteStreamTransport>,
}

impl BlobReader {
    pub fn new(transport: Arc<dyn ByteStreamTransport>) -> Self {
        Self { transport }
    }

    /// Reads the whole of `digest` from `instance_name`, feeding each fragment to `sink`.
    ///
    /// The returned completion resolves once, after the remote end finishes the stream, and
    /// hands the sink back. There is a single read attempt: no retry and no resumption.
    pub fn read_blob<S: ChunkSink>(
        &self,
        instance_name: &str,
        digest: &Digest,
        mut sink: S,
    ) -> Completion<S> {
        let request = ReadRequest {
            resource_name: resource_name(instance_name, digest),
            read_offset: 0,
            read_limit: 0,
        };
        let transport = self.transport.clone();
        Completion::spawn(async move {
            tracing::debug!(resource = %request.resource_name, "reading blob");
            let mut chunks = transport.read(request).await?;
            while let Some(response) = chunks.next().await {
                sink.accept(Bytes::from(response?.data))?;
            }
            Ok(sink)
        })
    }

    /// Reads the whole of `digest` into one buffer.
    ///
    /// The result is whatever the storage sent; it is not checked against `digest.size_bytes`.
    pub async fn fetch(&self, instance_name: &str, digest: &Digest) -> crate::Result<Bytes> {
        let capacity = usize::try_from(digest.size_bytes.min(FETCH_PREALLOC_LIMIT)).unwrap_or(0);
        let data = self
            .read_blob(instance_name, digest, Vec::with_capacity(capacity))
            .await?;
        Ok(Bytes::from(data))
    }
}

impl fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReader").finish_non_exhaustive()
    }
}
