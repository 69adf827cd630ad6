use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cowfs_store::BlockType;
use cowfs_types::BlockAddress;

#[derive(Parser)]
#[command(
    name = "cowfs",
    about = "Block store and journal tools for the copy-on-write overlay filesystem",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new filesystem layer
    Mkfs(MkfsArgs),
    /// Check blocks, attribute records and the journal for corruption
    Fsck(FsckArgs),
    /// Store a file as content-addressed blocks
    Put(PutArgs),
    /// Read or write block attribute records
    Attr(AttrArgs),
    /// Inspect or maintain the journal
    Log(LogArgs),
}

#[derive(Args)]
pub struct MkfsArgs {
    pub root: PathBuf,
    #[arg(long, default_value = "4096")]
    pub block_size: u64,
    /// fsync every block, attribute and journal write
    #[arg(long)]
    pub sync: bool,
}

#[derive(Args)]
pub struct FsckArgs {
    pub root: PathBuf,
}

#[derive(Args)]
pub struct PutArgs {
    pub root: PathBuf,
    pub file: PathBuf,
}

#[derive(Args)]
pub struct AttrArgs {
    #[command(subcommand)]
    pub action: AttrAction,
}

#[derive(Subcommand)]
pub enum AttrAction {
    /// Show the attribute record of a block
    Get { root: PathBuf, address: BlockAddress },
    /// Replace the attribute record of a block
    Set(AttrSetArgs),
}

#[derive(Args)]
pub struct AttrSetArgs {
    pub root: PathBuf,
    pub address: BlockAddress,
    #[arg(long)]
    pub compressed: bool,
    #[arg(long)]
    pub frozen: bool,
    #[arg(long)]
    pub no_cow: bool,
    #[arg(long = "type", value_enum, default_value = "metadata")]
    pub block_type: BlockTypeArg,
    #[arg(long, default_value = "0")]
    pub refresh_count: u64,
    #[arg(long, default_value = "0")]
    pub link_count: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BlockTypeArg {
    Metadata,
    CowRedundancy,
}

impl From<BlockTypeArg> for BlockType {
    fn from(arg: BlockTypeArg) -> Self {
        match arg {
            BlockTypeArg::Metadata => Self::Metadata,
            BlockTypeArg::CowRedundancy => Self::CowRedundancy,
        }
    }
}

#[derive(Args)]
pub struct LogArgs {
    #[command(subcommand)]
    pub action: LogAction,
}

#[derive(Subcommand)]
pub enum LogAction {
    /// Show the most recent entries, newest first
    Recent {
        root: PathBuf,
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },
    /// Append an entry stamped with the current time
    Append {
        root: PathBuf,
        action: u64,
        params: Vec<u64>,
    },
    /// Drop leading entries older than a cutoff
    Truncate {
        root: PathBuf,
        /// Cutoff in seconds since the UNIX epoch
        #[arg(long)]
        before: u64,
    },
}
