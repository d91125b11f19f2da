//! Zentinel SOAP client binary.
//!
//! Run with: `zentinel-soap-client --config client.yaml call GetUser --message '<ins:Id>42</ins:Id>'`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zentinel_soap_client::{GlobalOptions, LocalOptions, SoapClient};

/// Command-line SOAP client.
///
/// The configuration file is a YAML mapping of client options, e.g.
/// `wsdl`, or `endpoint` plus `namespace`, and transport settings such as
/// `read_timeout` or `basic_auth`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "client.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the operations declared by the WSDL document
    Operations,

    /// Call an operation and print the response body
    Call {
        /// Operation name
        name: String,

        /// XML placed inside the operation element
        #[arg(short, long, conflicts_with = "message_file")]
        message: Option<String>,

        /// File holding the XML message
        #[arg(long)]
        message_file: Option<PathBuf>,

        /// SOAPAction to send instead of the declared one
        #[arg(long)]
        soap_action: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Zentinel SOAP client v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", args.config.display());

    let globals = GlobalOptions::from_yaml_file(&args.config).context("Failed to load config file")?;
    let mut client = SoapClient::new(globals).context("Failed to initialize SOAP client")?;

    match args.command {
        Command::Operations => {
            for name in client.operations()? {
                println!("{}", name);
            }
        }
        Command::Call {
            name,
            message,
            message_file,
            soap_action,
        } => {
            let message = match message_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read message file {}", path.display()))?,
                ),
                None => message,
            };

            let mut locals = LocalOptions::new();
            locals.message = message;
            locals.soap_action = soap_action;

            let response = client
                .call(&name, &locals)
                .with_context(|| format!("SOAP call '{}' failed", name))?;
            println!("{}", response.body());
        }
    }

    Ok(())
}
