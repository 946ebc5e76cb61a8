//! Command-line front end for the synonym store.
//!
//! # Responsibility
//! - Parse flags and subcommands, open the SQLite store and run one use-case.
//! - Print JSON envelopes on stdout and error bodies on stderr.

use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use synonyms_core::db::open_db;
use synonyms_core::{
    core_version, default_log_level, init_logging, AddWordRequest, ApiResponse,
    ConsolidationEngine, ConsolidationError, LogConfig, LogLevel, LoggingError, RepoError,
    SqliteSynonymRepository, SynonymRepository,
};

#[derive(Parser)]
#[command(name = "synonyms")]
#[command(about = "Store words and keep their synonym groups consolidated", long_about = None)]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "SYNONYMS_DB", default_value = "synonyms.sqlite3", global = true)]
    db: PathBuf,
    /// Directory for rolling log files; logging is off when unset.
    #[arg(long, env = "SYNONYMS_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,
    /// One of trace|debug|info|warn|error.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a word with its synonyms
    Add {
        word: String,
        #[arg(required = true)]
        synonyms: Vec<String>,
    },
    /// List every word with its group
    List,
    /// Find one word and its synonyms
    Find { term: String },
    /// List every group, largest first
    Groups,
    /// Print the core version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        if let Err(err) = start_logging(log_dir, cli.log_level.as_deref()) {
            eprintln!("failed to initialize logging: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let body = err.to_error_body();
            match serde_json::to_string_pretty(&body) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, ConsolidationError> {
    if let Commands::Version = cli.command {
        return Ok(core_version().to_string());
    }

    let conn = open_db(&cli.db).map_err(RepoError::from)?;
    let engine = ConsolidationEngine::new(SqliteSynonymRepository::try_new(&conn)?);
    info!(
        "event=cli_command module=cli status=start db={}",
        cli.db.display()
    );
    execute(&engine, &cli.command)
}

fn execute<R: SynonymRepository>(
    engine: &ConsolidationEngine<R>,
    command: &Commands,
) -> Result<String, ConsolidationError> {
    match command {
        Commands::Add { word, synonyms } => {
            let request = AddWordRequest::new(word.as_str(), synonyms.iter().cloned());
            render(&ApiResponse::from(engine.add_word(&request)?))
        }
        Commands::List => render(&ApiResponse::ok(engine.list_words()?)),
        Commands::Find { term } => render(&ApiResponse::ok(engine.find_word(term)?)),
        Commands::Groups => render(&ApiResponse::ok(engine.list_groups()?)),
        Commands::Version => Ok(core_version().to_string()),
    }
}

fn render<T: Serialize>(response: &T) -> Result<String, ConsolidationError> {
    serde_json::to_string_pretty(response).map_err(|err| {
        ConsolidationError::Storage(RepoError::InvalidData(format!(
            "failed to encode response: {err}"
        )))
    })
}

fn start_logging(log_dir: &Path, level: Option<&str>) -> Result<(), LoggingError> {
    let level = match level {
        Some(value) => value.parse::<LogLevel>()?,
        None => default_log_level(),
    };
    init_logging(&LogConfig {
        level,
        log_dir: absolute(log_dir),
        echo_stderr: true,
    })
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::{execute, Cli, Commands};
    use clap::{CommandFactory, Parser};
    use synonyms_core::{ConsolidationEngine, InMemorySynonymRepository};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_requires_at_least_one_synonym() {
        assert!(Cli::try_parse_from(["synonyms", "add", "Wash"]).is_err());

        let cli = Cli::try_parse_from(["synonyms", "--db", "x.sqlite3", "add", "Wash", "Clean"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Add { ref synonyms, .. } if synonyms.len() == 1));
    }

    #[test]
    fn execute_renders_envelopes() {
        let engine = ConsolidationEngine::new(InMemorySynonymRepository::new());
        let add = Commands::Add {
            word: "Wash".to_string(),
            synonyms: vec!["Clean".to_string()],
        };

        let inserted: serde_json::Value =
            serde_json::from_str(&execute(&engine, &add).unwrap()).unwrap();
        assert_eq!(inserted["success"], true);
        assert_eq!(inserted["data"]["msg"], "Words inserted");

        let found: serde_json::Value = serde_json::from_str(
            &execute(&engine, &Commands::Find { term: "clean".to_string() }).unwrap(),
        )
        .unwrap();
        assert_eq!(found["data"]["name"], "Clean");

        let missing = execute(&engine, &Commands::Find { term: "Truck".to_string() }).unwrap_err();
        assert_eq!(missing.to_error_body().status_hint(), 404);
    }
}
