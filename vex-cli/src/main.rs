//! vex CLI
//!
//! A thin demonstration binary over the `vex` compression pipeline
//! toolkit: compress/decompress against a small named-graph catalog,
//! inspect a frame's header, run ACE training, and convert the CBOR
//! persisted-state format to/from JSON for human inspection
//! (`SPEC_FULL.md` §6). Argument parsing detail beyond this minimal
//! surface is out of scope.

mod commands;
mod graphs;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::{cmd_cbor_to_json, cmd_compress, cmd_decompress, cmd_frame_info, cmd_json_to_cbor, cmd_train};

#[derive(Parser)]
#[command(name = "vex")]
#[command(author, version, about = "A format-aware compression pipeline toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file through a named compressor graph
    Compress {
        /// File to compress
        input: PathBuf,
        /// Where to write the compressed frame
        output: PathBuf,
        /// Named compressor graph to run (see `vex compress --help`)
        #[arg(long, default_value = "store")]
        graph: String,
        /// Format version to negotiate
        #[arg(long, default_value_t = vex_core::wire::magic::MAX_VERSION)]
        format_version: u16,
    },

    /// Decompress a frame produced by `vex compress`
    Decompress {
        /// Frame to decompress
        input: PathBuf,
        /// Where to write the reconstructed bytes
        output: PathBuf,
    },

    /// Print a frame's header metadata without decompressing it
    FrameInfo {
        /// Frame to inspect
        file: PathBuf,
    },

    /// Run ACE training over a directory of numeric corpus files
    Train {
        /// Directory of training files, each a run of little-endian i64s
        corpus_dir: PathBuf,
        /// Where to write the resulting population snapshot
        #[arg(long)]
        out: PathBuf,
        /// Number of generations to run
        #[arg(long, default_value_t = 50)]
        generations: usize,
        /// Population size held at the end of every generation
        #[arg(long, default_value_t = 50)]
        population: usize,
    },

    /// Convert a CBOR file to pretty-printed JSON
    CborToJson {
        /// CBOR file to read
        input: PathBuf,
        /// JSON file to write
        output: PathBuf,
    },

    /// Convert a JSON file to CBOR
    JsonToCbor {
        /// JSON file to read
        input: PathBuf,
        /// CBOR file to write
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compress { input, output, graph, format_version } => cmd_compress(&input, &output, &graph, format_version),
        Commands::Decompress { input, output } => cmd_decompress(&input, &output),
        Commands::FrameInfo { file } => cmd_frame_info(&file),
        Commands::Train { corpus_dir, out, generations, population } => cmd_train(&corpus_dir, &out, generations, population),
        Commands::CborToJson { input, output } => cmd_cbor_to_json(&input, &output),
        Commands::JsonToCbor { input, output } => cmd_json_to_cbor(&input, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
