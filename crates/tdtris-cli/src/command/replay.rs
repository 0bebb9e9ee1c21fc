use std::{io::Write as _, path::PathBuf, thread, time::Duration};

use anyhow::Context as _;
use tdtris_training::{ReplaySummary, spawn_replay};

use crate::{config::AppConfig, util::Output};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub(crate) enum ReplayFormat {
    #[default]
    Text,
    Json,
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ReplayArg {
    /// Weight file to play with
    #[arg(long)]
    weights: PathBuf,
    /// Show only settled boards
    #[arg(long)]
    fast: bool,
    /// Stop after this many pieces
    #[arg(long)]
    max_pieces: Option<usize>,
    /// Pause between frames, in milliseconds
    #[arg(long, default_value_t = 0)]
    frame_delay: u64,
    /// Frame format: text or json (one snapshot per line)
    #[arg(long, default_value = "text")]
    format: ReplayFormat,
    /// Output file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(mut config: AppConfig, arg: &ReplayArg) -> anyhow::Result<()> {
    if arg.fast {
        config.replay.fast = true;
    }
    if let Some(max) = arg.max_pieces {
        config.replay.max_pieces = Some(max);
    }

    let board = config.build_board()?;
    let player = config.build_player(&board, Some(&arg.weights))?;
    let mut output = Output::from_output_path(arg.output.clone())?;

    let replay = spawn_replay(board, player, config.replay);
    let delay = Duration::from_millis(arg.frame_delay);
    let mut frames = 0;
    for snapshot in replay.snapshots() {
        match arg.format {
            ReplayFormat::Text => output.write_text(&snapshot.to_string())?,
            ReplayFormat::Json => output.write_json_line(&snapshot)?,
        }
        frames += 1;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
    let summary = replay.join()?;
    tracing::info!(
        frames,
        pieces = summary.pieces,
        lines = summary.lines,
        game_over = summary.game_over,
        "replay finished"
    );

    write_summary(&mut output, arg.format, &summary)?;
    output
        .flush()
        .with_context(|| format!("Failed to flush output to {}", output.display_path()))?;
    Ok(())
}

fn write_summary(
    output: &mut Output,
    format: ReplayFormat,
    summary: &ReplaySummary,
) -> anyhow::Result<()> {
    match format {
        ReplayFormat::Text => output.write_text(&format!(
            "pieces: {}  lines: {}  {}",
            summary.pieces,
            summary.lines,
            if summary.game_over {
                "game over"
            } else {
                "stopped"
            }
        )),
        ReplayFormat::Json => output.write_json_line(summary),
    }
}
