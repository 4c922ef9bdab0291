mod export;
mod logging;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use engine::{CompareRequest, Config, MergeOptions, MergeStrategy, SearchFilter, Store, VersionOrder};

use crate::export::ExportFormat;

#[derive(Parser)]
#[command(author, version, about = "Versioned store for ML job configurations", long_about = None)]
struct Cli {
    /// Configuration file (.yaml, .yml or .toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Database file; overrides the config file and MLJOBS_DB
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Latest,
    Earliest,
    MostCommon,
}

impl From<StrategyArg> for MergeStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Latest => MergeStrategy::Latest,
            StrategyArg::Earliest => MergeStrategy::Earliest,
            StrategyArg::MostCommon => MergeStrategy::MostCommon,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Load job documents from a JSON file
    Load {
        file: PathBuf,
    },
    /// Search current job records
    Search {
        #[arg(long)]
        job_id: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        bucket_span: Option<String>,
        /// Comma-separated; all must be present
        #[arg(long, value_delimiter = ',')]
        influencers: Vec<String>,
        #[arg(long)]
        created_by: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// YYYY-MM-DD, inclusive
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long, default_value_t = engine::search::DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Compare two versions of a job, or a version with the current record
    Compare {
        #[arg(long)]
        job_id: String,
        #[arg(long)]
        version1: Option<u32>,
        #[arg(long)]
        version2: Option<u32>,
        /// Compare against the current record; without --version1 the most
        /// recent snapshot is used
        #[arg(long)]
        latest: bool,
        /// Print the raw grouped diff
        #[arg(long)]
        show_json: bool,
    },
    /// List the version history of a job
    History {
        #[arg(long)]
        job_id: String,
    },
    /// Print the current record of a job
    Show {
        #[arg(long)]
        job_id: String,
    },
    /// Collapse duplicate versions into one current value
    Merge {
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Delete the losing snapshots
        #[arg(long)]
        prune: bool,
    },
    /// Export the version history of a job
    Export {
        #[arg(long)]
        job_id: String,
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore a job from its most recent snapshot
    Undo {
        #[arg(long)]
        job_id: String,
    },
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME").map(|home| Path::new(&home).join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => match expand_home(common::USER_CONFIG_PATH) {
            Some(path) if path.exists() => Config::from_file(&path)?,
            _ => Config::default(),
        },
    };
    config.apply_env();
    if let Some(db) = &cli.db {
        config.store.db_path = db.clone();
    }
    Ok(config)
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let mut store = Store::open(&config.store.db_path)
        .with_context(|| format!("Failed to open database at {:?}", config.store.db_path))?;

    match cli.command {
        Commands::Load { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let input: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?} as JSON", file))?;
            let report = engine::load_value(&mut store, &input);
            for line in render::load_lines(&report) {
                println!("{}", line);
            }
        }
        Commands::Search {
            job_id,
            group,
            bucket_span,
            influencers,
            created_by,
            start_date,
            end_date,
            limit,
        } => {
            let filter = SearchFilter {
                job_id,
                group,
                bucket_span,
                influencers,
                created_by,
                start_date,
                end_date,
                limit,
            };
            let hits = engine::search(&store, &filter)?;
            if hits.is_empty() {
                println!("No jobs found matching the criteria.");
            } else {
                println!("{}", render::search_table(&hits));
            }
        }
        Commands::Compare {
            job_id,
            version1,
            version2,
            latest,
            show_json,
        } => {
            let req = CompareRequest {
                from: version1,
                to: version2,
                against_current: latest,
            };
            let cmp = engine::compare(&store, &job_id, &req)?;
            println!("Comparing {} {} -> {}", cmp.job_id, cmp.from, cmp.to);
            if cmp.diff.is_empty() {
                println!("No changes detected.");
            } else if show_json {
                println!("{}", serde_json::to_string_pretty(&cmp.diff.to_json())?);
            } else {
                println!("{}", render::compare_table(&cmp));
            }
        }
        Commands::History { job_id } => {
            let versions = engine::history(&store, &job_id, VersionOrder::NewestFirst)?;
            if versions.is_empty() {
                println!("No version history for job {}.", job_id);
            } else {
                println!("{}", render::history_table(&versions));
            }
        }
        Commands::Show { job_id } => {
            let decoded = store
                .current(&job_id)?
                .ok_or_else(|| engine::Error::NotFound(format!("job '{}'", job_id)))?;
            for w in &decoded.warnings {
                log::warn!("job {}: {}", job_id, w);
            }
            println!("{}", serde_json::to_string_pretty(&decoded.value)?);
        }
        Commands::Merge { strategy, prune } => {
            let opts = MergeOptions {
                strategy: strategy.map(MergeStrategy::from).unwrap_or(config.merge.default_strategy),
                prune: prune || config.merge.prune_losers,
            };
            let report = engine::merge(&mut store, opts)?;
            for job in &report.jobs {
                println!(
                    "{}: version {} of {} selected",
                    job.job_id, job.winning_version, job.candidates
                );
            }
            println!(
                "Merged {} job(s) using strategy: {}",
                report.jobs_merged(),
                report.strategy
            );
            if report.pruned > 0 {
                println!("Pruned {} snapshot(s)", report.pruned);
            }
        }
        Commands::Export {
            job_id,
            format,
            output,
        } => {
            let versions = engine::history(&store, &job_id, VersionOrder::OldestFirst)?;
            if versions.is_empty() {
                return Err(engine::Error::NoHistory(job_id).into());
            }
            let path = output.unwrap_or_else(|| export::default_output(&job_id, format));
            export::export_versions(&path, format, &versions)?;
            println!("Exported {} version(s) of {} to {}", versions.len(), job_id, path.display());
        }
        Commands::Undo { job_id } => {
            let report = engine::undo(&mut store, &job_id)?;
            println!(
                "Rolled back job {} to version {} ({} snapshot(s) remaining)",
                report.job_id, report.restored_version, report.remaining
            );
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = resolve_config(&cli).and_then(|config| {
        logging::setup_logging(&config.logging, cli.verbose)?;
        log::debug!("Using database {:?}", config.store.db_path);
        run(cli, config)
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn latest_alone_compares_previous_with_current() {
        let cli = Cli::try_parse_from(["mljobs", "compare", "--job-id", "j1", "--latest"]).unwrap();
        match cli.command {
            Commands::Compare { version1, latest, .. } => {
                assert_eq!(version1, None);
                assert!(latest);
            }
            _ => panic!("expected compare"),
        }
        assert!(Cli::try_parse_from(["mljobs", "compare", "--job-id", "j1", "--version1", "1", "--latest"]).is_ok());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "store:\n  db_path: from-file.db\n").unwrap();

        let config_arg = path.to_str().unwrap();
        let cli = Cli::try_parse_from(["mljobs", "--config", config_arg, "--db", "flag.db", "history", "--job-id", "j1"]).unwrap();
        assert_eq!(resolve_config(&cli).unwrap().store.db_path, PathBuf::from("flag.db"));
    }

    #[test]
    fn influencers_split_on_commas() {
        let cli = Cli::try_parse_from(["mljobs", "search", "--influencers", "host,user"]).unwrap();
        match cli.command {
            Commands::Search { influencers, limit, .. } => {
                assert_eq!(influencers, ["host", "user"]);
                assert_eq!(limit, 10);
            }
            _ => panic!("expected search"),
        }
    }
}
