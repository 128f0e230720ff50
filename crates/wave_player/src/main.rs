//! Plays WAV files through the streaming engine, with stdin standing in for the buttons.
//!
//! `wave_player play a.wav b.wav` starts the track remembered in `index.txt` and reads `play`, `pause`, `next`, `prev`
//! and `quit` from stdin.  There is no audio device: `--capture <dir>` records what the output would have received.
//! Set `RUST_LOG=debug` to see every chunk.
mod capture;
mod cli_args;
mod commands;
mod control;
mod playlist;
mod shell;

fn main() -> anyhow::Result<()> {
    use clap::Parser;

    env_logger::init();

    let args = cli_args::CliArgs::parse();
    commands::dispatch_command(args)
}
