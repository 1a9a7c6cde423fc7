//! ferry: the file transfer client.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fileferry::client::{ClientError, FileClient};

#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version = "0.1.0")]
#[command(about = "Talk to a ferryd file server", long_about = None)]
struct Cli {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7778")]
    server: String,

    /// Round-trip deadline in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the files the server holds
    List,
    /// Download one file
    Get {
        /// File name on the server
        name: String,
        /// Directory to write the file into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Upload one file under its own name
    Upload {
        /// Path of the file to send
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Quiet unless RUST_LOG asks otherwise.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let client = match cli.timeout {
        Some(secs) => FileClient::with_timeout(&cli.server, Duration::from_secs(secs)),
        None => FileClient::new(&cli.server),
    };

    let result = match cli.command {
        Command::List => list(&client),
        Command::Get { name, out } => get(&client, &name, &out),
        Command::Upload { path } => upload(&client, &path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ferry: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn list(client: &FileClient) -> Result<(), ClientError> {
    let names = client.list()?;
    if names.is_empty() {
        println!("(no files)");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn get(client: &FileClient, name: &str, out: &Path) -> Result<(), ClientError> {
    let transfer = client.download(name, out)?;
    println!(
        "downloaded {} ({} bytes in {:.2?})",
        name, transfer.bytes, transfer.elapsed
    );
    Ok(())
}

fn upload(client: &FileClient, path: &Path) -> Result<(), ClientError> {
    let transfer = client.upload(path)?;
    println!(
        "uploaded {} ({} bytes in {:.2?})",
        path.display(),
        transfer.bytes,
        transfer.elapsed
    );
    Ok(())
}
