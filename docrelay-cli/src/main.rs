//! docrelay-cli - Command-line interface for docrelay
//!
//! Sends one document (or a set of documents for merge) to a docrelay
//! server and saves the result.

mod commands;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use docrelay_client::{Client, ConnectionConfig};
use docrelay_protocol::options::parse_angle;
use docrelay_protocol::{Position, DEFAULT_CHUNK_SIZE};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docrelay-cli")]
#[command(about = "Command-line client for the docrelay document transfer server")]
#[command(version)]
struct Cli {
    /// Server address as host:port
    #[arg(short, long, env = "DOCRELAY_SERVER", default_value = "127.0.0.1:65432")]
    server: String,

    /// Seconds to wait for the connection to open
    #[arg(long, default_value = "30")]
    connect_timeout: u64,

    /// Seconds to wait for the server to process and for each bulk transfer
    #[arg(long, default_value = "600")]
    timeout: u64,

    /// Bytes per read or write during transfer
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[command(flatten)]
    output: OutputArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct OutputArgs {
    /// Write the result to this exact path
    #[arg(short, long, global = true, conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write the result into this directory under the server's suggested name
    #[arg(short = 'd', long, global = true)]
    output_dir: Option<PathBuf>,

    /// Replace an existing file at the destination
    #[arg(short, long, global = true)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compress a PDF
    Compress { input: PathBuf },

    /// Convert a document to PDF
    Convert { input: PathBuf },

    /// Password-protect a PDF
    Encrypt {
        input: PathBuf,

        #[arg(short, long, env = "DOCRELAY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Remove the password from a PDF
    Decrypt {
        input: PathBuf,

        #[arg(short, long, env = "DOCRELAY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Split a PDF into one file per page range (e.g. "1-3,5,8-")
    Split {
        input: PathBuf,

        #[arg(short, long)]
        ranges: String,
    },

    /// Merge PDFs into one, in file name order
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
    },

    /// Rotate pages of a PDF
    Rotate {
        input: PathBuf,

        /// Pages to rotate: "all" or ranges such as "1,3-4"
        #[arg(short, long, default_value = "all")]
        pages: String,

        /// Clockwise angle, a multiple of 90
        #[arg(short, long, value_parser = parse_angle, allow_hyphen_values = true)]
        angle: i32,
    },

    /// Stamp page numbers onto a PDF
    AddNumbers {
        input: PathBuf,

        #[arg(long, default_value_t = Position::BottomCenter)]
        position: Position,
    },

    /// Render every page of a PDF to JPEG (returned as a ZIP)
    PdfToJpg { input: PathBuf },

    /// Convert a PDF to a Word document
    PdfToWord { input: PathBuf },

    /// Convert a PDF to a PowerPoint presentation
    PdfToPptx { input: PathBuf },

    /// List the actions and the options each one takes
    Actions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Handled locally (no server connection needed)
    if let Commands::Actions = cli.command {
        println!("{}", commands::list_actions());
        return Ok(());
    }

    let config = ConnectionConfig::new(cli.server.clone())
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout))
        .with_operation_timeout(Duration::from_secs(cli.timeout))
        .with_chunk_size(cli.chunk_size);
    let client = Client::new(config);

    let request = match commands::build_request(cli.command) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    let mut target = commands::OutputTarget::new(cli.output);
    let result = client.submit(&request, &mut target).await;

    match commands::render(&result, target.refused()) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err((code, message)) => {
            eprintln!("{}", message);
            std::process::exit(code);
        }
    }
}
