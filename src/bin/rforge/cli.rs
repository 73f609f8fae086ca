use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "rforge",
    about = "Retrosynthesis dataset preparation",
    version,
    author,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Align raw reactions and write padded training records
    #[command(visible_alias = "p")]
    Prepare(PrepareArgs),

    /// Summarize a prepared split and its leaving-group vocabulary
    #[command(visible_alias = "i")]
    Inspect(InspectArgs),
}

impl Command {
    pub fn quiet(&self) -> bool {
        match self {
            Command::Prepare(args) => args.output.quiet,
            Command::Inspect(args) => args.output.quiet,
        }
    }
}

/// Output options shared by all commands.
#[derive(Args)]
pub struct OutputOptions {
    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Which corpus the raw file comes from.
#[derive(Args)]
#[command(next_help_heading = "Dataset")]
pub struct DatasetOptions {
    /// Corpus family (selects regent handling and map-number shuffling)
    #[arg(long = "dataset-type", value_name = "TYPE")]
    pub dataset_type: Option<DatasetKind>,

    /// Merge regent atoms into the product tensor
    #[arg(long)]
    pub known_regents: bool,

    /// Require spatial distances; reactions without them are skipped
    #[arg(long = "use-3d")]
    pub use_3d: bool,
}

/// Size bounds and padding targets.
#[derive(Args)]
#[command(next_help_heading = "Size Limits")]
pub struct LimitOptions {
    /// Product atoms must be below this; also the padded product size
    #[arg(long, value_name = "N")]
    pub max_node: Option<usize>,

    /// Product and reactant atoms must be above this
    #[arg(long, value_name = "N")]
    pub min_node: Option<usize>,

    /// Leaving-group atoms must be below this; also the padded group size
    #[arg(long, value_name = "N")]
    pub max_lg_na: Option<usize>,

    /// Gating atoms per leaving group must be below this
    #[arg(long, value_name = "N")]
    pub max_gate_num_size: Option<usize>,

    /// Extra product slots for regent atoms (with --known-regents)
    #[arg(long, value_name = "N")]
    pub max_regents_na: Option<usize>,

    /// Largest accepted reaction center, in changed bonds
    #[arg(long, value_name = "N")]
    pub center_cutoff: Option<usize>,
}

/// Scheduling, caching and reproducibility.
#[derive(Args)]
#[command(next_help_heading = "Execution")]
pub struct RunOptions {
    /// Worker threads for parsing and alignment
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Reactions between two checkpoints
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,

    /// Seed for atom-map shuffling
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Do not write the consolidated record cache
    #[arg(long)]
    pub no_save_cache: bool,

    /// Read records one file at a time instead of from memory
    #[arg(long)]
    pub no_fast_read: bool,
}

#[derive(Args)]
pub struct PrepareArgs {
    /// Dataset root containing raw/<split>.csv
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Splits to prepare, in order
    #[arg(
        short,
        long = "split",
        value_name = "SPLIT",
        value_delimiter = ',',
        default_value = "train,val,test"
    )]
    pub splits: Vec<String>,

    /// Base configuration (TOML); flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputOptions,

    #[command(flatten)]
    pub dataset: DatasetOptions,

    #[command(flatten)]
    pub limits: LimitOptions,

    #[command(flatten)]
    pub run: RunOptions,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Dataset root containing processed/
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Split to summarize
    #[arg(short, long, value_name = "SPLIT", default_value = "train")]
    pub split: String,

    /// Number of leaving groups to list, most frequent first
    #[arg(long, value_name = "N", default_value = "10")]
    pub top: usize,

    #[command(flatten)]
    pub output: OutputOptions,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DatasetKind {
    /// USPTO-50k (atom maps are shuffled)
    #[value(name = "uspto-50k", alias = "50k")]
    Uspto50k,
    /// USPTO-full
    #[value(name = "uspto-full", alias = "full")]
    UsptoFull,
    /// MIT/USPTO-480k (spectator regents)
    Mit,
}

pub fn parse() -> Cli {
    Cli::parse()
}
