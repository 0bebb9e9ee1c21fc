use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, prelude::*};

use crate::config::AppConfig;

use self::{inspect::InspectArg, replay::ReplayArg, train::TrainArg};

mod inspect;
mod replay;
mod train;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Increase log verbosity (-v = DEBUG, -vv = TRACE)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// JSON config file (board, agent, trainer, stop, replay sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Train the Q-learning player by self-play
    Train(#[clap(flatten)] TrainArg),
    /// Watch a greedy game played with stored weights
    Replay(#[clap(flatten)] ReplayArg),
    /// Summarize a weight file
    Inspect(#[clap(flatten)] InspectArg),
}

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::WARN;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_tracing(level: Level) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(LevelFilter::from_level(level))
        .init();
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing(log_level(args.verbose, args.quiet));

    let config = AppConfig::load(args.config.as_deref())?;
    match &args.mode {
        Mode::Train(arg) => train::run(config, arg)?,
        Mode::Replay(arg) => replay::run(config, arg)?,
        Mode::Inspect(arg) => inspect::run(&config, arg)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        CommandArgs::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(log_level(0, false), Level::INFO);
        assert_eq!(log_level(1, false), Level::DEBUG);
        assert_eq!(log_level(5, false), Level::TRACE);
        assert_eq!(log_level(0, true), Level::WARN);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CommandArgs::try_parse_from([
            "tdtris", "train", "--games", "10", "-vv", "--config", "c.json",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
        assert!(matches!(args.mode, Mode::Train(_)));
    }
}
