use std::fs::File;
use std::time::Duration;

use anyhow::{Context, Result};
use wave_streamer::{probe, EndOfData, PlayerConfig, PlayerConfigBuilder};

use crate::cli_args::{CliArgs, Command, InspectArgs, PlayArgs};
use crate::control::{self, HELP};
use crate::playlist::{Playlist, TrackIndexStore};
use crate::shell::{Shell, ShellOptions};

pub fn dispatch_command(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Play(a) => play(a),
        Command::Inspect(a) => inspect(a),
    }
}

fn player_config(args: &PlayArgs) -> Result<PlayerConfig> {
    let end_of_data = if args.abandon_tail {
        EndOfData::Abandon
    } else {
        EndOfData::Drain
    };

    let mut builder = PlayerConfigBuilder::default()
        .fifo_capacity(args.fifo_capacity)
        .end_of_data(end_of_data);
    if let Some(ms) = args.stall_timeout_ms {
        builder = builder.backpressure_timeout(Duration::from_millis(ms));
    }
    Ok(builder.build()?)
}

fn play(args: PlayArgs) -> Result<()> {
    if let Some(dir) = args.capture.as_ref() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("While creating capture directory {}", dir.display()))?;
    }

    let options = ShellOptions {
        capture_dir: args.capture.clone(),
        dac_bits: args.dac_bits,
        config: player_config(&args)?,
        repeat: args.repeat,
    };
    let shell = Shell::new(
        Playlist::new(args.tracks)?,
        TrackIndexStore::new(args.index_file),
        options,
    );

    let (sender, events) = crossbeam::channel::unbounded();
    // Not joined: it may be blocked in a read of stdin forever.
    control::spawn_stdin_reader(sender).context("While starting the command reader")?;

    println!("{HELP}");
    shell.run(events)
}

fn inspect(args: InspectArgs) -> Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("While opening {}", args.file.display()))?;
    let probed = probe(file).with_context(|| format!("While probing {}", args.file.display()))?;

    if let Some(form_type) = probed.form_type {
        println!("Form type: {form_type}");
    }

    println!("Chunks:");
    for chunk in probed.chunks.iter() {
        println!("  {}: {} bytes", chunk.id, chunk.size);
    }

    match probed.format.as_ref() {
        Some(format) => {
            println!("Format: {format}");
            match format.encoding() {
                Ok(encoding) => println!("Playable as {encoding:?}"),
                Err(e) => println!("Not playable: {e}"),
            }
        }
        None => println!("No fmt chunk"),
    }

    if let (Some(frames), Some(duration)) = (probed.data_frames(), probed.duration()) {
        println!("{frames} frames, {:.3} seconds", duration.as_secs_f64());
    }

    Ok(())
}
