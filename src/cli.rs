use clap::Parser;

#[derive(Parser)]
#[command(
    name = "enredo",
    version = "1.0",
    about = "Reconstructs multi-species syntenic blocks from a stream of anchor hits"
)]
pub struct Cli {
    /// Anchor-hits TSV file
    pub input: String,

    /// Output file (defaults to stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Minimum score required to accept an input row
    #[arg(long, default_value_t = 0.0)]
    pub min_score: f32,

    /// Maximum allowed gap between two consecutive anchors; 0 disables
    #[arg(long, default_value_t = 100_000)]
    pub max_gap_length: u64,

    /// Minimum length of a final syntenic block
    #[arg(long, default_value_t = 100_000)]
    pub min_length: u64,

    /// Minimum number of regions (tags) in a syntenic block
    #[arg(long, default_value_t = 2)]
    pub min_regions: u32,

    /// Minimum number of anchors in a syntenic block
    #[arg(long, default_value_t = 3)]
    pub min_anchors: u32,

    /// Mismatch budget for merge-alternative-paths; 0 means unlimited
    #[arg(short = 'D', long, default_value_t = 0)]
    pub max_path_dissimilarity: u32,

    /// Pass sequence to run, 0-7
    #[arg(long, default_value_t = 0)]
    pub simplify_level: u8,

    /// Per-species duplication-imbalance filter; values <= 1 disable it
    #[arg(long, default_value_t = 1.0)]
    pub max_ratio: f64,

    /// Cap on region length for assimilate-small-insertions
    #[arg(long, default_value_t = 10_000)]
    pub max_insertion_length: u64,

    /// Emit every non-empty link, ignoring the validity thresholds
    #[arg(long)]
    pub print_all: bool,

    /// Histogram bucket cap for the anchor-degree histogram
    #[arg(long, default_value_t = 10)]
    pub histogram_size: usize,
}

impl From<&Cli> for crate::config::Config {
    fn from(cli: &Cli) -> Self {
        Self {
            input: cli.input.clone(),
            output: cli.output.clone(),
            min_score: cli.min_score,
            max_gap_length: cli.max_gap_length,
            min_length: cli.min_length,
            min_regions: cli.min_regions,
            min_anchors: cli.min_anchors,
            max_path_dissimilarity: cli.max_path_dissimilarity,
            simplify_level: cli.simplify_level,
            max_ratio: cli.max_ratio,
            max_insertion_length: cli.max_insertion_length,
            print_all: cli.print_all,
            histogram_size: cli.histogram_size,
        }
    }
}
