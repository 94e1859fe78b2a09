// Command line interface module
// Handles parsing of command line arguments

use clap::Parser;
use std::path::PathBuf;
use std::process::exit;
use std::time::{SystemTime, UNIX_EPOCH};

/// segview - an interactive point-prompt segmentation viewer
#[derive(Parser, Debug)]
#[command(name = "segview")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// RNG seed (-1 for time-based)
    #[arg(short, long, default_value_t = -1)]
    pub seed: i64,

    /// Number of threads to use during computation
    #[arg(short, long, default_value_t = default_threads(), value_parser = parse_threads)]
    pub threads: usize,

    /// Model path (reserved for plugging in an external segmentation backend)
    #[arg(short, long, value_name = "FNAME")]
    pub model: Option<PathBuf>,

    /// Input image file
    #[arg(short = 'i', long = "inp", value_name = "FNAME", default_value = "img.jpg")]
    pub input: PathBuf,

    /// Output file for the saved primary mask
    #[arg(short = 'o', long = "out", value_name = "FNAME", default_value = "mask_out.png")]
    pub output: PathBuf,
}

/// Default thread count: up to four, capped by the machine.
fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(4)
}

/// Parse thread count and ensure at least one worker.
fn parse_threads(s: &str) -> Result<usize, String> {
    let threads: usize = s.parse().map_err(|_| "Invalid thread count")?;
    if threads == 0 {
        return Err("Thread count must be at least 1".to_string());
    }
    Ok(threads)
}

/// Resolve a negative seed to wall-clock seconds.
fn resolve_seed(seed: i64) -> i64 {
    if seed >= 0 {
        return seed;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Parse command line arguments.
///
/// Any argument error prints the usage text and exits with status 0 — the
/// same contract for `--help` and for unknown flags.
pub fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(mut args) => {
            args.seed = resolve_seed(args.seed);
            args
        }
        Err(e) => {
            let _ = e.print();
            exit(0);
        }
    }
}
