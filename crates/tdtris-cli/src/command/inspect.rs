use std::path::PathBuf;

use serde::Serialize;
use tdtris_agent::{QLearnPlayer, WeightShape};
use tdtris_engine::{Action, FeatureVector, PieceKind};

use crate::{config::AppConfig, util::Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct InspectArg {
    /// Weight file to summarize
    weights: PathBuf,
    /// Output file path (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct WeightReport {
    path: PathBuf,
    shape: WeightShape,
    nonzero: usize,
    max_abs: f64,
    kinds: Vec<KindReport>,
}

/// Per piece kind, over the slots of its legal actions.
#[derive(Debug, Clone, Serialize)]
struct KindReport {
    kind: PieceKind,
    actions: usize,
    trained_actions: usize,
    max_abs: f64,
    /// Greedy choice on an empty board.
    empty_board_action: Action,
    empty_board_value: f64,
}

pub(crate) fn run(config: &AppConfig, arg: &InspectArg) -> anyhow::Result<()> {
    let board = config.build_board()?;
    let player = config.build_player(&board, Some(&arg.weights))?;
    let report = build_report(arg.weights.clone(), &player, &board.feature_vector());
    tracing::debug!(
        nonzero = report.nonzero,
        max_abs = report.max_abs,
        "weights inspected"
    );
    Output::save_json(&report, arg.output.clone())
}

fn build_report(
    path: PathBuf,
    player: &QLearnPlayer,
    empty_board: &FeatureVector,
) -> WeightReport {
    let weights = player.weights();
    let kinds = PieceKind::ALL
        .iter()
        .map(|&kind| {
            let mut actions = 0;
            let mut trained_actions = 0;
            let mut max_abs = 0.0_f64;
            for action in kind.actions() {
                let slot = weights.slot(kind, action);
                actions += 1;
                if slot.iter().any(|w| w.abs() > 0.0) {
                    trained_actions += 1;
                }
                max_abs = slot.iter().fold(max_abs, |acc, w| acc.max(w.abs()));
            }
            let (empty_board_action, empty_board_value) = player.best_action(empty_board, kind);
            KindReport {
                kind,
                actions,
                trained_actions,
                max_abs,
                empty_board_action,
                empty_board_value,
            }
        })
        .collect();

    let all = weights.as_slice();
    WeightReport {
        path,
        shape: weights.shape(),
        nonzero: all.iter().filter(|w| w.abs() > 0.0).count(),
        max_abs: all.iter().fold(0.0, |acc: f64, w| acc.max(w.abs())),
        kinds,
    }
}
