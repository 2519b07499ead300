mod arg_parser;
mod client_cli;

use arg_parser::{ArgParser, SubCommand};
use client_cli::ClientCli;

use clap::Parser;
use std::{error, process};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = ArgParser::parse();
    let config = args.client_config();

    let exit_code = match &args.sub_command {
        SubCommand::ResourceName { digest } => {
            // nothing to connect to for a pure name lookup
            println!("{}", remexec::resource_name(&args.instance, digest));
            return Ok(());
        }
        SubCommand::Execute { action } => {
            let client = ClientCli::connect(&config).await?;
            let exit_code = client.execute(action).await?;
            client.close().await?;
            exit_code
        }
        SubCommand::Cat { digest } => {
            let client = ClientCli::connect(&config).await?;
            client.cat(digest).await?;
            client.close().await?;
            0
        }
    };

    if exit_code != 0 {
        process::exit(exit_code);
    }
    Ok(())
}
