use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::Level;

use pf8::extract_archive;

#[derive(Parser)]
#[command(
    name = "pf8",
    about = "Extract Artemis engine pf8 archives",
    version,
    long_about = "Decrypts and extracts pf8 (.pfs) archives. The XOR keystream is \
                  recovered from the archive's own PNG or OGG members; no key needs \
                  to be supplied."
)]
struct Cli {
    /// Path to the pf8 archive (.pfs file)
    archive: PathBuf,

    /// Destination directory (defaults to the archive path without its extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Destination directory used when `--output` is not given: the archive
/// path with its extension stripped (`/games/foo/root.pfs` extracts into
/// `/games/foo/root`).
fn default_output_dir(archive: &Path) -> PathBuf {
    match archive.file_stem() {
        Some(stem) => archive.with_file_name(stem),
        None => archive.with_file_name("extracted"),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let dest = cli
        .output
        .unwrap_or_else(|| default_output_dir(&cli.archive));

    let report = extract_archive(&cli.archive, &dest);
    if !report.success {
        anyhow::bail!(report.message);
    }

    println!("{}", report.message);
    Ok(())
}
