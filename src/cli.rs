use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use locusdb::{Assembly, Position, StoreOptions};

#[derive(Debug, Clone, Parser)]
#[command(name = "locusdb")]
#[command(about = "Build and query genomic position stores", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, global = true, env = "LOCUSDB_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build (or extend) a store from a sorted source file
    Build(BuildArgs),
    /// Look up conservation scores at positions
    Get(GetArgs),
    /// Print the metadata of a store
    Info(StoreArgs),
    /// Scan a store and check keys and record framing
    Verify(StoreArgs),
}

#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Path of the store directory
    #[arg(long, env = "LOCUSDB_PATH")]
    pub db: PathBuf,

    /// Number of positions per bucket [default: the size stored with the store, else 200]
    #[arg(long)]
    pub bucket_size: Option<u32>,
}
impl StoreArgs {
    /// Open options carrying the bucket size, if one was given
    #[must_use]
    pub fn options(&self) -> StoreOptions {
        let options = StoreOptions::default();
        match self.bucket_size {
            Some(bucket_size) => options.bucket_size(bucket_size),
            None => options,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Sorted TSV source (chrom, pos, gerp_n, gerp_rs), optionally compressed
    #[arg(short, long)]
    pub input: PathBuf,

    /// Assembly of the source coordinates
    #[arg(short, long, default_value = "GRCh38")]
    pub assembly: Assembly,

    /// Overwrite stored buckets instead of merging into them
    #[arg(long)]
    pub no_merge: bool,

    /// Disable RocksDB block compression
    #[arg(long)]
    pub no_compression: bool,
}

#[derive(Debug, Clone, Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Expected assembly of the store
    #[arg(short, long)]
    pub assembly: Option<Assembly>,

    /// Only warn when the store assembly differs
    #[arg(long)]
    pub lenient: bool,

    /// Number of lookup threads (0 = all cores)
    #[arg(short = 'T', long, default_value_t = 1)]
    pub threads: usize,

    /// Positions to look up, e.g. chr1:12345
    #[arg(required = true)]
    pub positions: Vec<Position>,
}
