// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Command-line front end for `scroll264`: reads two externally-encoded
//! reference pictures and writes a single Annex-B elementary stream that
//! scrolls between them.
//!
//! All of the encoding logic lives in the library; this binary only parses
//! arguments, does file I/O, and reports progress.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use scroll264::ScrollEncoder;

/// Synthesize an H.264 elementary stream that scrolls between two still
/// reference pictures.
#[derive(Parser)]
#[command(name = "scroll264", version, about)]
struct Cli {
    /// Path to the externally-encoded reference picture shown at scroll
    /// offset 0.
    #[arg(long)]
    ref_a: PathBuf,

    /// Path to the externally-encoded reference picture shown once the
    /// scroll reaches the full picture height.
    #[arg(long)]
    ref_b: PathBuf,

    /// Number of scroll frames to synthesize.
    #[arg(long)]
    frames: u32,

    /// Scroll speed in pixels per frame.
    #[arg(long)]
    speed: u32,

    /// Output path for the Annex-B elementary stream.
    #[arg(short = 'o', long = "output")]
    output: PathBuf,
}

fn run(cli: Cli) -> Result<(), scroll264::Error> {
    let ref_a = fs::read(&cli.ref_a)?;
    let ref_b = fs::read(&cli.ref_b)?;

    tracing::debug!(bytes_a = ref_a.len(), bytes_b = ref_b.len(), "read reference pictures");

    let mut encoder = ScrollEncoder::new(&ref_a, &ref_b)?;
    tracing::info!(width = encoder.width(), height = encoder.height(), "stream header written");

    encoder.write_scroll_sequence(cli.frames, cli.speed)?;
    tracing::info!(frames = cli.frames, speed = cli.speed, "scroll sequence encoded");

    let bytes = encoder.into_bytes();
    fs::write(&cli.output, &bytes)?;
    tracing::info!(path = %cli.output.display(), bytes = bytes.len(), "wrote output stream");

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("scroll264: {err}");
            ExitCode::FAILURE
        }
    }
}
