use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use log::info;

use enredo::cli::Cli;
use enredo::config::Config;
use enredo::driver::Driver;
use enredo::graph::Graph;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config: Config = (&cli).into();

    info!("Enredo starting on {}", config.input);
    let mut graph = Graph::new();

    let input_file = File::open(&config.input)
        .with_context(|| format!("opening input file {}", config.input))?;
    let stats = graph.populate(BufReader::new(input_file), config.min_score, config.max_gap_length)?;
    info!(
        "read {} rows, created {} tags, {} anchors",
        stats.rows_read,
        stats.tags_created,
        graph.anchor_count()
    );

    let histogram = graph.anchor_histogram(config.histogram_size);
    info!("anchor degree histogram: {:?}", histogram);

    let driver_config = (&config).into();
    let driver = Driver::new(driver_config);

    let emitted = match &config.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating output file {}", path))?;
            let mut writer = BufWriter::new(file);
            let n = driver.run(&mut graph, &mut writer)?;
            writer.flush()?;
            n
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            driver.run(&mut graph, &mut lock)?
        }
    };

    info!("done: {} blocks emitted", emitted);
    Ok(())
}
