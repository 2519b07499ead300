use crate::blob::BlobReader;
use crate::channel::ManagedChannel;
use crate::error::{Error, Result};
use crate::execution::RemoteExecutionService;
use crate::transport::{GrpcByteStream, GrpcExecution, TraceInterceptor};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};

/// How long `close` waits for each channel to drain.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Where the execution cluster and its storage live, and how to talk to them.
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    pub execution_endpoint: String,
    pub cas_endpoint: String,
    pub instance_name: String,
    /// Correlation token sent as `trace-id` metadata on execution calls.
    pub trace_id: Option<String>,
    /// PEM root certificate for `https://` endpoints.
    pub tls_ca_cert: Option<PathBuf>,
}

/// Owns the execution and storage channels and the clients bound to them.
pub struct RemoteExecutionClients {
    instance_name: String,
    execution_channel: ManagedChannel,
    cas_channel: ManagedChannel,
    execution: RemoteExecutionService,
    blobs: BlobReader,
}

impl RemoteExecutionClients {
    /// Binds the clients to already established channels.
    ///
    /// With a `trace_id`, every execution call carries it as `trace-id` metadata. Storage calls
    /// never do.
    pub fn new(
        instance_name: impl Into<String>,
        execution_channel: Channel,
        cas_channel: Channel,
        trace_id: Option<&str>,
    ) -> Result<Self> {
        let instance_name = instance_name.into();
        let execution_channel = ManagedChannel::new("execution", execution_channel);
        let cas_channel = ManagedChannel::new("cas", cas_channel);

        let blobs = BlobReader::new(Arc::new(GrpcByteStream::new(cas_channel.clone())));
        let interceptor = TraceInterceptor::new(trace_id)?;
        let transport = GrpcExecution::new(execution_channel.clone(), interceptor);
        let execution =
            RemoteExecutionService::new(Arc::new(transport), blobs.clone(), instance_name.clone());

        Ok(Self {
            instance_name,
            execution_channel,
            cas_channel,
            execution,
            blobs,
        })
    }

    /// Opens one channel to each endpoint and binds the clients to them.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let tls_ca_cert = config.tls_ca_cert.as_deref();
        let execution_channel = open_channel(&config.execution_endpoint, tls_ca_cert).await?;
        let cas_channel = open_channel(&config.cas_endpoint, tls_ca_cert).await?;
        tracing::info!(
            execution = %config.execution_endpoint,
            cas = %config.cas_endpoint,
            instance = %config.instance_name,
            "connected to remote execution"
        );
        Self::new(
            config.instance_name.clone(),
            execution_channel,
            cas_channel,
            config.trace_id.as_deref(),
        )
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn execution_service(&self) -> &RemoteExecutionService {
        &self.execution
    }

    pub fn blob_reader(&self) -> &BlobReader {
        &self.blobs
    }

    /// Shuts down the storage channel, then the execution channel.
    ///
    /// Each gets [`SHUTDOWN_TIMEOUT`] to finish its in-flight calls. The execution channel is shut
    /// down even when the storage channel fails to terminate; the first failure is returned.
    pub async fn close(self) -> Result<()> {
        self.close_within(SHUTDOWN_TIMEOUT).await
    }

    pub(crate) async fn close_within(self, timeout: Duration) -> Result<()> {
        let cas = shutdown(&self.cas_channel, timeout).await;
        let execution = shutdown(&self.execution_channel, timeout).await;
        cas.and(execution)
    }

    #[cfg(test)]
    pub(crate) fn channels(&self) -> (ManagedChannel, ManagedChannel) {
        (self.execution_channel.clone(), self.cas_channel.clone())
    }
}

async fn shutdown(channel: &ManagedChannel, timeout: Duration) -> Result<()> {
    channel.shutdown();
    if channel.await_termination(timeout).await {
        tracing::info!(channel = channel.name(), "channel terminated");
        Ok(())
    } else {
        tracing::warn!(channel = channel.name(), ?timeout, "channel did not terminate in time");
        Err(Error::Shutdown {
            channel: channel.name(),
            timeout,
        })
    }
}

async fn open_channel(endpoint: &str, tls_ca_cert: Option<&Path>) -> Result<Channel> {
    let mut builder = Endpoint::from_shared(endpoint.to_string())
        .map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;
    if endpoint.starts_with("https://") {
        let mut tls = ClientTlsConfig::new();
        if let Some(path) = tls_ca_cert {
            let pem = tokio::fs::read(path).await?;
            tls = tls.ca_certificate(Certificate::from_pem(pem));
        }
        builder = builder.tls_config(tls)?;
    }
    Ok(builder.connect().await?)
}
