//! ferry-bench: stress harness for a running ferryd.
//!
//! `run` points N concurrent clients at one server, each performing a
//! single operation, and reports wall time and throughput. Results can be
//! appended to a CSV file for comparison across pool strategies and worker
//! counts. `generate` writes the standard fixture files the measurements
//! move.

use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fileferry::client::FileClient;
use fileferry::workload::{self, STANDARD_SIZES_MIB};

#[derive(Parser, Debug)]
#[command(name = "ferry-bench")]
#[command(version = "0.1.0")]
#[command(about = "Stress a running ferryd with concurrent clients", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one measurement: N clients, one request each
    Run(RunArgs),
    /// Generate the standard fixture files
    Generate {
        /// Directory the fixtures are written into
        #[arg(short, long, default_value = "files")]
        dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7778")]
    server: String,

    /// What every client does
    #[arg(short, long, value_enum)]
    operation: Operation,

    /// Fixture file the clients move
    #[arg(short, long, default_value = "test_10mb.dat")]
    file: String,

    /// Directory holding the local fixtures
    #[arg(long, default_value = "files")]
    fixtures: PathBuf,

    /// Number of concurrent clients
    #[arg(short, long, default_value_t = 1)]
    clients: usize,

    /// Worker count of the server under test, recorded in the CSV
    #[arg(long)]
    server_workers: Option<usize>,

    /// Round-trip deadline per request in seconds
    #[arg(short, long, default_value_t = 300)]
    timeout: u64,

    /// CSV file results are appended to
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Operation {
    Upload,
    Download,
    List,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Upload => write!(f, "upload"),
            Operation::Download => write!(f, "download"),
            Operation::List => write!(f, "list"),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Generate { dir } => generate(&dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ferry-bench: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn generate(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let paths = workload::generate(dir, &STANDARD_SIZES_MIB)?;
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let timeout = Duration::from_secs(args.timeout);
    let fixture = args.fixtures.join(&args.file);

    let volume_mib = match args.operation {
        Operation::Upload => {
            ensure_fixture(&fixture)?;
            fs::metadata(&fixture)?.len() / (1024 * 1024)
        }
        Operation::Download => {
            ensure_fixture(&fixture)?;
            // Seed the server so every download finds its file.
            let seeder = FileClient::with_timeout(&args.server, timeout);
            seeder.upload(&fixture)?;
            fs::metadata(&fixture)?.len() / (1024 * 1024)
        }
        Operation::List => 0,
    };

    info!(
        server = %args.server,
        operation = %args.operation,
        file = %args.file,
        clients = args.clients,
        "starting measurement"
    );

    let started = Instant::now();
    let outcomes = run_clients(&args, timeout);
    let wall = started.elapsed();

    let report = Report::tally(&args, volume_mib, wall, &outcomes);
    report.print();
    if let Some(csv) = &args.csv {
        report.append_csv(csv)?;
        info!(path = %csv.display(), "results appended");
    }
    Ok(())
}

/// Regenerate a standard fixture if its name encodes a size; otherwise the
/// file must already exist.
fn ensure_fixture(path: &Path) -> io::Result<()> {
    let name = path.file_name().and_then(|n| n.to_str());
    if let Some(size) = name.and_then(workload::fixture_size) {
        let dir = path.parent().unwrap_or(Path::new("."));
        workload::generate(dir, &[size])?;
        return Ok(());
    }
    if !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("fixture {} not found", path.display()),
        ));
    }
    Ok(())
}

struct Outcome {
    ok: bool,
    bytes: u64,
    elapsed: Duration,
}

fn run_clients(args: &RunArgs, timeout: Duration) -> Vec<Outcome> {
    // Each client downloads into its own scratch directory, so parallel
    // writes of the same file name never collide.
    let scratch = std::env::temp_dir().join(format!("ferry-bench-{}", std::process::id()));
    let server = Arc::new(args.server.clone());
    let name = Arc::new(args.file.clone());
    let fixture = Arc::new(args.fixtures.join(&args.file));
    let operation = args.operation;

    let mut handles = Vec::with_capacity(args.clients);
    for id in 0..args.clients {
        let server = Arc::clone(&server);
        let name = Arc::clone(&name);
        let fixture = Arc::clone(&fixture);
        let dest = scratch.join(format!("client-{}", id));
        handles.push(thread::spawn(move || {
            let client = FileClient::with_timeout(server.as_str(), timeout);
            let started = Instant::now();
            let result = match operation {
                Operation::Upload => client.upload(&fixture).map(|t| t.bytes),
                Operation::Download => client.download(&name, &dest).map(|t| t.bytes),
                Operation::List => client.list().map(|_| 0),
            };
            match result {
                Ok(bytes) => Outcome {
                    ok: true,
                    bytes,
                    elapsed: started.elapsed(),
                },
                Err(e) => {
                    warn!(client = id, error = %e, "request failed");
                    Outcome {
                        ok: false,
                        bytes: 0,
                        elapsed: started.elapsed(),
                    }
                }
            }
        }));
    }

    let outcomes = handles
        .into_iter()
        .map(|handle| {
            handle.join().unwrap_or(Outcome {
                ok: false,
                bytes: 0,
                elapsed: Duration::ZERO,
            })
        })
        .collect();
    let _ = fs::remove_dir_all(&scratch);
    outcomes
}

struct Report {
    timestamp: String,
    operation: String,
    volume_mib: u64,
    clients: usize,
    server_workers: Option<usize>,
    wall: Duration,
    throughput_mib_s: f64,
    avg_client: Duration,
    ok: usize,
    failed: usize,
}

impl Report {
    fn tally(args: &RunArgs, volume_mib: u64, wall: Duration, outcomes: &[Outcome]) -> Report {
        let ok = outcomes.iter().filter(|o| o.ok).count();
        let bytes: u64 = outcomes.iter().filter(|o| o.ok).map(|o| o.bytes).sum();
        let total_client: Duration = outcomes.iter().map(|o| o.elapsed).sum();

        let secs = wall.as_secs_f64();
        let throughput_mib_s = if secs > 0.0 {
            bytes as f64 / secs / (1024.0 * 1024.0)
        } else {
            0.0
        };
        let avg_client = if outcomes.is_empty() {
            Duration::ZERO
        } else {
            total_client / outcomes.len() as u32
        };

        Report {
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation: args.operation.to_string(),
            volume_mib,
            clients: args.clients,
            server_workers: args.server_workers,
            wall,
            throughput_mib_s,
            avg_client,
            ok,
            failed: outcomes.len() - ok,
        }
    }

    fn print(&self) {
        let server_workers = self
            .server_workers
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!();
        println!("Operation:        {}", self.operation);
        println!("File volume:      {} MiB", self.volume_mib);
        println!("Client workers:   {}", self.clients);
        println!("Server workers:   {}", server_workers);
        println!("Total time:       {:.2} s", self.wall.as_secs_f64());
        println!("Throughput:       {:.2} MiB/s", self.throughput_mib_s);
        println!("Avg client time:  {:.2} s", self.avg_client.as_secs_f64());
        println!("Client success:   {}", self.ok);
        println!("Client failure:   {}", self.failed);
    }

    fn append_csv(&self, path: &Path) -> io::Result<()> {
        let fresh = !path.exists();
        let mut out = OpenOptions::new().create(true).append(true).open(path)?;
        if fresh {
            writeln!(
                out,
                "timestamp,operation,volume_mib,client_workers,server_workers,\
                 total_time_s,throughput_mib_s,client_success,client_fail,\
                 server_success,server_fail"
            )?;
        }
        let server_workers = self
            .server_workers
            .map(|n| n.to_string())
            .unwrap_or_default();
        // The server is not instrumented, so its success columns mirror
        // what the clients observed.
        writeln!(
            out,
            "{},{},{},{},{},{:.2},{:.2},{},{},{},{}",
            self.timestamp,
            self.operation,
            self.volume_mib,
            self.clients,
            server_workers,
            self.wall.as_secs_f64(),
            self.throughput_mib_s,
            self.ok,
            self.failed,
            self.ok,
            self.failed,
        )
    }
}
