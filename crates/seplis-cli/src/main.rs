use clap::{ArgAction, Parser, Subcommand};
use commands::{config, lookup, run};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "seplis-tasks")]
#[command(about = "Seplis lists and lookups for media automation tasks")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Also write logs to this file, rotated daily
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run configured tasks
    #[command(long_about = "Run all configured tasks, or only the named ones. Each task fetches its inputs, attaches Seplis lookups and runs clean_target.")]
    Run {
        /// Task names (default: all tasks)
        tasks: Vec<String>,

        /// Resolve every lookup field before printing
        #[arg(long, action = ArgAction::SetTrue)]
        resolve: bool,

        /// Report the files clean_target would delete without deleting them
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Look up a single movie or series
    Lookup {
        #[arg(value_enum)]
        kind: lookup::LookupTarget,

        /// Title to search for
        title: String,

        /// Release or premiere year, added to the search
        #[arg(long)]
        year: Option<i32>,

        /// Seplis id; skips the title search
        #[arg(long)]
        id: Option<String>,

        /// Season number (series only, requires --episode)
        #[arg(long, requires = "episode", conflicts_with_all = ["number", "date"])]
        season: Option<i64>,

        /// Episode number within the season
        #[arg(long, requires = "season")]
        episode: Option<i64>,

        /// Absolute episode number
        #[arg(long, conflicts_with = "date")]
        number: Option<i64>,

        /// Episode air date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigCommands {
    /// Show the effective configuration (masks the access token)
    Show {
        /// Show the access token unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Print the configuration file location
    Path,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    logging::init_logging(cli.verbose, cli.quiet, cli.log_file.clone())
        .map_err(|e| color_eyre::eyre::eyre!("Failed to initialise logging: {}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Run { tasks, resolve, dry_run } => {
            run::run_tasks(config_path, tasks, resolve, dry_run, &output).await
        }
        Commands::Lookup {
            kind,
            title,
            year,
            id,
            season,
            episode,
            number,
            date,
        } => {
            let request = lookup::LookupRequest {
                kind,
                title,
                year,
                id,
                season,
                episode,
                number,
                date,
            };
            lookup::run_lookup(config_path, request, &output).await
        }
        Commands::Config { cmd } => config::run_config(config_path, cmd, &output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["seplis-tasks", "-v", "run", "movies", "--dry-run"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run { tasks, resolve, dry_run } => {
                assert_eq!(tasks, vec!["movies"]);
                assert!(!resolve);
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_episode_flags_conflict() {
        let result = Cli::try_parse_from([
            "seplis-tasks", "lookup", "series", "Example", "--season", "1", "--episode", "2", "--number", "3",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["seplis-tasks", "lookup", "series", "Example", "--season", "1"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["seplis-tasks", "lookup", "series", "Example", "--date", "2021-03-04"]).unwrap();
        assert!(matches!(cli.command, Commands::Lookup { date: Some(_), .. }));
    }
}
