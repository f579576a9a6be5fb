// Compare plain buffered writes against the direct writer on the same path.

use std::{fs::OpenOptions, io::Write, os::unix::fs::OpenOptionsExt, time::Instant};

use anyhow::{Context, bail};
use clap::Parser;
use diobuf::{DirectFile, DirectWriter};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    pub out_path: String,
    #[arg(long = "mode", default_value = "buffered")]
    pub mode: String,
    #[arg(long = "total-mb", default_value_t = 2048)]
    pub total_mb: usize,
}

fn buffered_write(cli: &Cli, chunk: &[u8]) -> anyhow::Result<f64> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.out_path)
        .context("open out_path")?;

    let total = cli.total_mb * 1024 * 1024;
    let start = Instant::now();
    let mut written = 0_usize;
    while written < total {
        file.write_all(chunk)?;
        written += chunk.len();
    }
    file.sync_all()?;
    Ok(start.elapsed().as_secs_f64())
}

fn direct_write(cli: &Cli, chunk: &[u8]) -> anyhow::Result<f64> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .custom_flags(libc::O_DIRECT)
        .open(&cli.out_path)
        .context("open out_path with O_DIRECT")?;

    let total = cli.total_mb * 1024 * 1024;
    let start = Instant::now();
    let mut writer = DirectWriter::with_capacity(DirectFile::new(&file), 4 * 1024 * 1024)?;
    let mut written = 0_usize;
    while written < total {
        written += writer.write(chunk)?;
    }
    writer.close()?;
    Ok(start.elapsed().as_secs_f64())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let chunk = vec![0_u8; 1024 * 1024];

    let elapsed = match cli.mode.as_str() {
        "buffered" => buffered_write(&cli, &chunk)?,
        "direct" => direct_write(&cli, &chunk)?,
        other => bail!("unknown mode: {}", other),
    };

    println!(
        "{}: {:.2}MB/s",
        cli.mode,
        cli.total_mb as f64 / elapsed
    );
    Ok(())
}
