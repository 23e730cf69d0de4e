mod stress;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", about = "Build and test tasks for mrrb")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scaled-up multi-writer/multi-reader stress scenario
    Stress {
        /// Number of concurrent writer threads
        #[arg(long, default_value_t = 5)]
        writers: u32,

        /// Number of BLOCKING reader threads
        #[arg(long, default_value_t = 8)]
        readers: u32,

        /// Bytes each writer produces
        #[arg(long, default_value_t = 10_000)]
        bytes_per_writer: usize,

        /// Largest chunk a single write may cover
        #[arg(long, default_value_t = 15)]
        chunk_max: usize,

        /// Ring buffer length
        #[arg(long, default_value_t = 4096)]
        buf_len: usize,
    },

    /// Run the workspace test suite
    Test {
        /// Only run tests whose name contains this filter
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stress { writers, readers, bytes_per_writer, chunk_max, buf_len } => {
            stress::run(writers, readers, bytes_per_writer, chunk_max, buf_len)?;
        }

        Commands::Test { filter } => {
            stress::run_cargo_test(filter.as_deref())?;
        }
    }

    Ok(())
}
