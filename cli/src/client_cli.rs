use remexec::{types::Chunk, ClientConfig, Digest, RemoteExecutionClients};
use std::io;
use tokio::{
    io::AsyncWriteExt,
    sync::mpsc::{self, UnboundedSender},
};

pub struct ClientCli {
    inner: RemoteExecutionClients,
}

impl ClientCli {
    pub async fn connect(config: &ClientConfig) -> remexec::Result<Self> {
        let inner = RemoteExecutionClients::connect(config).await?;
        tracing::info!(server = %config.execution_endpoint, "client connected");
        Ok(Self { inner })
    }

    /// Runs the action and reports what it produced. Returns the action's exit code.
    pub async fn execute(&self, action: &Digest) -> remexec::Result<i32> {
        let result = self.inner.execution_service().execute(action).await?;
        println!("Exit code: {}", result.exit_code());
        for file in result.output_files() {
            let mode = if file.is_executable { "x" } else { "-" };
            println!("file {} {} {}", mode, file.digest, file.path);
        }
        for dir in result.output_directories() {
            println!("dir    {} {}", dir.tree_digest, dir.path);
        }
        let stderr = result.stderr().await?;
        if !stderr.is_empty() {
            eprint!("{}", stderr);
        }
        Ok(result.exit_code())
    }

    /// Streams a blob to stdout as it arrives.
    pub async fn cat(&self, digest: &Digest) -> remexec::Result<()> {
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
        let read = self.inner.blob_reader().read_blob(
            self.inner.instance_name(),
            digest,
            forward_to(chunk_tx),
        );
        // the sink comes back with the completion, drop it so the writer sees the end
        let read = async move { read.await.map(drop) };
        let write = async move {
            let mut stdout = tokio::io::stdout();
            while let Some(chunk) = chunk_rx.recv().await {
                stdout.write_all(&chunk).await?;
            }
            stdout.flush().await
        };
        let (read, write) = tokio::join!(read, write);
        read?;
        write?;
        Ok(())
    }

    pub async fn close(self) -> remexec::Result<()> {
        self.inner.close().await?;
        tracing::info!("client closed");
        Ok(())
    }
}

fn forward_to(
    chunk_tx: UnboundedSender<Chunk>,
) -> impl FnMut(Chunk) -> io::Result<()> + Send + 'static {
    move |chunk| {
        chunk_tx
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stdout writer went away"))
    }
}
