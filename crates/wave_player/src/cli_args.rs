//! Definition of the Clap command line.
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wave_streamer::DEFAULT_FIFO_CAPACITY;

#[derive(Debug, Parser)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a list of WAV files, taking commands from stdin.
    Play(PlayArgs),

    /// Print the chunks and format of a WAV file.
    Inspect(InspectArgs),
}

#[derive(Debug, Parser)]
pub struct PlayArgs {
    /// The playlist, in order.
    #[arg(required = true)]
    pub tracks: Vec<PathBuf>,

    /// Where the current track number is remembered between runs.
    #[arg(long, default_value = "index.txt")]
    pub index_file: PathBuf,

    /// Write what the output receives to a 16-bit mono WAV per track in this directory.
    #[arg(long)]
    pub capture: Option<PathBuf>,

    /// Keep only this many high bits of every level, as a narrow DAC would.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub dac_bits: Option<u8>,

    #[arg(long, default_value_t = DEFAULT_FIFO_CAPACITY)]
    pub fifo_capacity: NonZeroUsize,

    /// Stop the clock as soon as a data chunk is decoded instead of letting the FIFO drain.
    #[arg(long)]
    pub abandon_tail: bool,

    /// Fail a track if the output makes no progress for this many milliseconds.
    #[arg(long)]
    pub stall_timeout_ms: Option<u64>,

    /// Go back to the first track after the last one finishes.
    #[arg(long)]
    pub repeat: bool,
}

#[derive(Debug, Parser)]
pub struct InspectArgs {
    pub file: PathBuf,
}
