//! Command line HTTP client.
//!
//! ```text
//! soapwire-cli get   <url> <path>        print the body of a 2xx response
//! soapwire-cli post  <url> <body|@file>  POST text/xml and print the reply
//! soapwire-cli fetch <url> <path> <dir>  save the body into <dir>
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use soapwire::config::{SoapwireConfig, TrustMode};
use soapwire::observability::logging;
use soapwire::HttpClient;

#[derive(Parser)]
#[command(name = "soapwire-cli")]
#[command(about = "HTTP client for soapwire services", long_about = None)]
struct Cli {
    /// Connection attempts after the first one fails
    #[arg(short, long, global = true)]
    retries: Option<u32>,

    /// PEM bundle of trusted certificates (and optional client key);
    /// without it every server certificate is accepted
    #[arg(short, long, global = true)]
    keystore: Option<PathBuf>,

    /// Log level for the client
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a path and print the body
    Get { url: String, path: String },
    /// POST a SOAP envelope (inline, or @file) and print the reply
    Post { url: String, body: String },
    /// GET a path and save the body into a directory
    Fetch {
        url: String,
        path: String,
        directory: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when the server answered without usable content.
async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = SoapwireConfig::default();
    if let Some(keystore) = &cli.keystore {
        config.tls.trust = TrustMode::Keystore;
        config.tls.keystore_path = Some(keystore.display().to_string());
    }
    let client = HttpClient::from_config(&config)?;

    match cli.command {
        Commands::Get { url, path } => {
            let retries = cli.retries.unwrap_or(config.client.get_retries);
            print_content(client.get_content_with_retries(&url, &path, retries).await?)
        }
        Commands::Post { url, body } => {
            let body = match body.strip_prefix('@') {
                Some(file) => tokio::fs::read_to_string(file).await?,
                None => body,
            };
            let retries = cli.retries.unwrap_or(config.client.post_retries);
            let reply = client
                .post_with_retries(&url, &body, "text/xml; charset=utf-8", retries)
                .await?;
            print_content(reply)
        }
        Commands::Fetch {
            url,
            path,
            directory,
        } => {
            let retries = cli.retries.unwrap_or(config.client.get_retries);
            match client
                .get_file_with_retries(&url, &path, &directory, retries)
                .await?
            {
                Some(saved) => {
                    println!("{}", saved.display());
                    Ok(true)
                }
                None => {
                    eprintln!("no content");
                    Ok(false)
                }
            }
        }
    }
}

fn print_content(content: Option<String>) -> Result<bool, Box<dyn std::error::Error>> {
    match content {
        Some(content) => {
            println!("{content}");
            Ok(true)
        }
        None => {
            eprintln!("no content");
            Ok(false)
        }
    }
}
