use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tdtris_training::{Trainer, TrainingSummary};

use crate::{config::AppConfig, util::Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Stop after this many games
    #[arg(long)]
    games: Option<usize>,
    /// Stop once a single game clears this many lines
    #[arg(long)]
    target_lines: Option<usize>,
    /// Directory checkpoints are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Continue training from a stored weight file
    #[arg(long, value_name = "WEIGHTS")]
    resume: Option<PathBuf>,
    /// Games per reporting batch
    #[arg(long)]
    report_interval: Option<usize>,
    /// Seed for the exploration RNG
    #[arg(long)]
    seed: Option<u64>,
    /// Training record output file path (stdout if omitted)
    #[arg(long)]
    report: Option<PathBuf>,
}

impl TrainArg {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(games) = self.games {
            config.stop.max_games = Some(games);
        }
        if let Some(lines) = self.target_lines {
            config.stop.target_lines = Some(lines);
        }
        if let Some(dir) = &self.output_dir {
            config.trainer.output_dir.clone_from(dir);
        }
        if let Some(interval) = self.report_interval {
            config.trainer.report_interval = interval;
        }
        if let Some(seed) = self.seed {
            config.agent.seed = Some(seed);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct TrainingRecord {
    trained_at: DateTime<Utc>,
    resumed_from: Option<PathBuf>,
    config: AppConfig,
    summary: TrainingSummary,
}

pub(crate) fn run(mut config: AppConfig, arg: &TrainArg) -> anyhow::Result<()> {
    arg.apply(&mut config);
    if config.stop.max_games.is_none() && config.stop.target_lines.is_none() {
        tracing::warn!("no stop condition set; training runs until interrupted");
    }

    let mut board = config.build_board()?;
    let mut player = config.build_player(&board, arg.resume.as_deref())?;
    let trainer = Trainer::new(config.trainer.clone())?;

    let summary = trainer.run(&mut board, &mut player, config.stop)?;
    tracing::info!(
        games = summary.games,
        best_lines = summary.best_lines,
        checkpoint = %summary.final_checkpoint.display(),
        "training completed"
    );

    let record = TrainingRecord {
        trained_at: Utc::now(),
        resumed_from: arg.resume.clone(),
        config,
        summary,
    };
    Output::save_json(&record, arg.report.clone())?;
    Ok(())
}
