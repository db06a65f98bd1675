use clap::Parser;
use std::path::PathBuf;

/// Unset options fall back to the YAML config file, then to built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(version, about = "Block-chained single-file storage served over TCP", long_about = None)]
pub struct Args {
    /// YAML config file
    #[arg(short, long, env = "CHAINFS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listening host
    #[arg(long, env = "CHAINFS_HOST")]
    pub host: Option<String>,

    /// Listening port
    #[arg(short, long, env = "CHAINFS_PORT")]
    pub port: Option<u16>,

    /// Container file path
    #[arg(short, long, env = "CHAINFS_DISK")]
    pub disk: Option<PathBuf>,

    /// Size in bytes of a newly created container
    #[arg(long, env = "CHAINFS_TOTAL_SIZE")]
    pub total_size: Option<u64>,

    /// Longest accepted request line in bytes
    #[arg(long, env = "CHAINFS_MAX_LINE_LENGTH")]
    pub max_line_length: Option<usize>,
}
