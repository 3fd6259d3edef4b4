/// Plain configuration derived from `Cli`, passed to `Driver` and the
/// loader. Kept separate from `Cli` so library code never depends on
/// `clap`.
pub struct Config {
    pub input: String,
    pub output: Option<String>,
    pub min_score: f32,
    pub max_gap_length: u64,
    pub min_length: u64,
    pub min_regions: u32,
    pub min_anchors: u32,
    pub max_path_dissimilarity: u32,
    pub simplify_level: u8,
    pub max_ratio: f64,
    pub max_insertion_length: u64,
    pub print_all: bool,
    pub histogram_size: usize,
}

impl From<&Config> for crate::driver::DriverConfig {
    fn from(c: &Config) -> Self {
        Self {
            min_score: c.min_score,
            max_gap_length: c.max_gap_length,
            min_length: c.min_length,
            min_regions: c.min_regions,
            min_anchors: c.min_anchors,
            max_path_dissimilarity: c.max_path_dissimilarity,
            simplify_level: c.simplify_level,
            max_ratio: c.max_ratio,
            max_insertion_length: c.max_insertion_length,
            print_all: c.print_all,
        }
    }
}
