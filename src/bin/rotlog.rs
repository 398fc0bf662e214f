use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use rotlog::config::{DEFAULT_KEEP, DEFAULT_OUTPUT};
use rotlog::ingest::DEFAULT_QUEUE_CAPACITY;
use rotlog::sink::DEFAULT_WRITE_BUFFER;
use rotlog::RotateConfig;

#[derive(Parser, Debug)]
#[command(name = "rotlog")]
#[command(about = "Copy stdin into a file that is rotated on a fixed interval")]
struct Cli {
    /// How often to rotate (e.g. 30s, 1m, 1h)
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    every: Duration,

    /// Output file to write to
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    to: PathBuf,

    /// How many rotated files to keep
    #[arg(long, default_value_t = DEFAULT_KEEP)]
    max: usize,

    /// Lines buffered between the stdin reader and the writer
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Bytes buffered in front of the output file (0 writes each line through)
    #[arg(long, default_value_t = DEFAULT_WRITE_BUFFER)]
    write_buffer: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = RotateConfig::new(cli.to);
    config.interval = cli.every;
    config.keep = cli.max;
    config.queue_capacity = cli.queue_capacity;
    config.write_buffer = cli.write_buffer;

    let stats = rotlog::run(&config, std::io::stdin())
        .with_context(|| format!("rotating output {}", config.path.display()))?;

    info!(
        "input closed after {} lines, {} rotations",
        stats.ingest.lines, stats.driver.rotations
    );
    Ok(())
}
