// Stream a fixed volume through the direct writer and report MB/s.

use std::{fs::OpenOptions, os::unix::fs::OpenOptionsExt, time::Instant};

use anyhow::Context;
use clap::Parser;
use diobuf::{DirectFile, DirectWriter};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    pub out_path: String,
    #[arg(long = "total-mb", default_value_t = 1024)]
    pub total_mb: usize,
    #[arg(long = "chunk-kb", default_value_t = 256)]
    pub chunk_kb: usize,
    #[arg(long = "rounds", default_value_t = 5)]
    pub rounds: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let chunk = vec![0x5a_u8; cli.chunk_kb * 1024];
    let total = cli.total_mb * 1024 * 1024;

    for round in 1..=cli.rounds {
        println!("  Round {}...", round);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .custom_flags(libc::O_DIRECT)
            .open(&cli.out_path)
            .context("open out_path with O_DIRECT")?;

        let mut writer = DirectWriter::new(DirectFile::new(&file))?;

        let start = Instant::now();
        let mut written = 0_usize;
        while written < total {
            written += writer.write(&chunk)?;
        }
        writer.close()?;
        let elapsed = start.elapsed().as_secs_f64();
        println!(
            "MB per second: {:.2}MB/s",
            (written as f64 / 1024.0 / 1024.0) / elapsed
        );
    }

    Ok(())
}
