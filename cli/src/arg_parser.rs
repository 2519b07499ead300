use clap::{Parser, Subcommand};
use remexec::{ClientConfig, Digest};
use std::path::PathBuf;

/// Run actions on a remote execution cluster
#[derive(Debug, Parser)]
#[clap(name = "remexec")]
pub struct ArgParser {
    /// Address of the execution service, e.g. http://localhost:8980
    #[clap(short = 's', long = "server", env = "REMEXEC_EXECUTION_SERVER")]
    pub server: String,
    /// Address of the content-addressable storage, defaults to the execution service
    #[clap(long = "cas-server", env = "REMEXEC_CAS_SERVER")]
    pub cas_server: Option<String>,
    /// Instance name scoping every request
    #[clap(short = 'i', long, env = "REMEXEC_INSTANCE", default_value = "")]
    pub instance: String,
    /// Correlation id sent with execution requests
    #[clap(long, env = "REMEXEC_TRACE_ID")]
    pub trace_id: Option<String>,
    /// PEM CA certificate for https servers
    #[clap(long, env = "REMEXEC_TLS_CA", parse(from_os_str))]
    pub tls_ca: Option<PathBuf>,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum SubCommand {
    /// execute an action that is already uploaded, and wait for it
    Execute {
        /// action digest as HASH/SIZE
        action: Digest,
    },
    /// write a blob to stdout
    Cat {
        /// blob digest as HASH/SIZE
        digest: Digest,
    },
    /// print the ByteStream resource name of a blob
    ResourceName {
        /// blob digest as HASH/SIZE
        digest: Digest,
    },
}

impl ArgParser {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            execution_endpoint: self.server.clone(),
            cas_endpoint: self.cas_server.clone().unwrap_or_else(|| self.server.clone()),
            instance_name: self.instance.clone(),
            trace_id: self.trace_id.clone(),
            tls_ca_cert: self.tls_ca.clone(),
        }
    }
}
