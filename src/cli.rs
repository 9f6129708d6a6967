use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for ebpf-pinloader
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Create BPF maps, load BPF programs and pin them to bpffs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// YAML loader configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table or json)
    #[arg(short = 'f', long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a map and optionally pin it
    CreateMap(CreateMapArgs),
    /// Load one program section from an object file
    Load(LoadArgs),
    /// Print the pin path derived for a name, without touching anything
    PinPath(PinPathArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for machine consumption
    Json,
}

/// Pin modes accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PinArg {
    None,
    Object,
    Global,
    Custom,
}

/// Arguments for the create-map command
#[derive(Args, Debug)]
pub struct CreateMapArgs {
    /// Map kind, e.g. hash, array, lru_hash
    #[arg(long = "type")]
    pub map_type: String,

    #[arg(long)]
    pub key_size: u32,

    #[arg(long)]
    pub value_size: u32,

    #[arg(long)]
    pub max_entries: u32,

    /// Object name (at most 15 bytes)
    #[arg(long, default_value = "")]
    pub name: String,

    /// Comma separated flags: no-prealloc, no-common-lru
    #[arg(long)]
    pub flags: Option<String>,

    /// Allocate the map on this NUMA node
    #[arg(long)]
    pub numa_node: Option<u32>,

    #[arg(long, value_enum, default_value = "none")]
    pub pin: PinArg,

    /// Explicit pin path; overrides the derived one
    #[arg(long)]
    pub pin_path: Option<PathBuf>,

    /// Object namespace used by `--pin object`
    #[arg(long)]
    pub object: Option<String>,
}

/// Arguments for the load command
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Relocatable BPF object file
    #[arg(long)]
    pub object: PathBuf,

    /// Section holding the program instructions
    #[arg(long)]
    pub section: String,

    /// Program type tag, e.g. xdp, classifier, kprobe
    #[arg(long = "type")]
    pub prog_type: String,

    /// License; defaults to the object's license section, then the config
    #[arg(long)]
    pub license: Option<String>,

    /// Program name (at most 15 bytes)
    #[arg(long)]
    pub name: Option<String>,

    /// Pin the loaded program at this path
    #[arg(long)]
    pub pin_path: Option<PathBuf>,
}

/// Arguments for the pin-path command
#[derive(Args, Debug)]
pub struct PinPathArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, value_enum, default_value = "global")]
    pub pin: PinArg,

    /// Object namespace used by `--pin object`
    #[arg(long)]
    pub object: Option<String>,
}
