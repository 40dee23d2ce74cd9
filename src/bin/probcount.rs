use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use probcount::benchmark::{self, DEFAULT_PRECISION};
use probcount::classifier::classify;
use probcount::source::LogFile;
use probcount::MembershipFilter;

#[derive(Parser)]
#[command(name = "probcount", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify candidates as unique, duplicate or invalid against a membership filter
    Classify {
        /// Number of bits in the filter
        #[arg(long, default_value_t = 1000)]
        size: usize,
        /// Number of probe positions per item
        #[arg(long, default_value_t = 3)]
        probes: usize,
        /// Item inserted into the filter before classification (repeatable)
        #[arg(long = "known", value_name = "ITEM")]
        known: Vec<String>,
        /// File with one known item per line
        #[arg(long, value_name = "PATH")]
        known_file: Option<PathBuf>,
        /// Insert unique candidates as they are classified
        #[arg(long)]
        add_unique: bool,
        /// Candidates to classify
        candidates: Vec<String>,
    },
    /// Compare exact and HyperLogLog distinct counts of IP addresses in a log file
    Benchmark {
        /// HyperLogLog precision in [4, 20]
        #[arg(long, short, default_value_t = DEFAULT_PRECISION)]
        precision: u8,
        /// Log file to scan
        log_path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Classify {
            size,
            probes,
            known,
            known_file,
            add_unique,
            candidates,
        } => {
            let mut filter = MembershipFilter::new(size, probes)?;
            for item in &known {
                filter.insert(item)?;
            }
            if let Some(path) = known_file {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                for item in contents.lines().filter(|l| !l.is_empty()) {
                    filter.insert(item)?;
                }
            }

            for (item, status) in classify(&mut filter, &candidates, add_unique) {
                println!("'{item}' - {status}");
            }
        }
        Command::Benchmark {
            precision,
            log_path,
        } => {
            let report = benchmark::run(&LogFile::new(log_path), precision)?;
            println!("{report}");
        }
    }

    Ok(())
}
