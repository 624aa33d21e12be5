mod columns;
mod config;
mod duration;
mod error;
mod filter;
mod i18n;
mod query;
mod range;
mod retry;
mod storage;
mod store;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use columns::{format_timestamp, parse_columns, render_row, render_table};
use config::Config;
use error::StoreError;
use filter::{Filter, SessionFilter};
use i18n::I18n;
use range::Bucket;
use storage::NewCommand;
use store::Store;

#[derive(Parser)]
#[command(name = "cmdlog", version)]
#[command(about = "Record shell commands and query them back")]
struct Cli {
    /// Path to the history database [default: ~/.cmdlog/history.db]
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one command (called from the shell hook)
    Insert {
        /// Command text exactly as typed
        #[arg(long)]
        cmd: String,
        /// Working directory [default: current directory]
        #[arg(long)]
        pwd: Option<String>,
        /// Exit status
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        status: i32,
        /// Start time in unix seconds [default: now]
        #[arg(long)]
        ts: Option<i64>,
        /// Duration in milliseconds, when already known
        #[arg(long)]
        duration: Option<i64>,
        #[arg(long)]
        git_branch: Option<String>,
        #[arg(long)]
        git_repo: Option<String>,
        /// Invoking shell or program
        #[arg(long)]
        source_app: Option<String>,
        /// Pid of the invoking shell
        #[arg(long)]
        source_pid: Option<i64>,
        #[arg(long)]
        source_active: Option<bool>,
    },
    /// Set the duration of a recorded command
    SetDuration {
        #[arg(long)]
        id: i64,
        /// Milliseconds
        #[arg(long)]
        ms: i64,
    },
    /// Most recent commands starting with PREFIX
    LikeRecent {
        prefix: Option<String>,
        /// Number of results [default: query.default_limit]
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        text: TextArgs,
    },
    /// Commands that usually follow --prev-cmd, starting with PREFIX
    LikeRecentAfter {
        prefix: Option<String>,
        /// Previous command to anchor on
        #[arg(long)]
        prev_cmd: Option<String>,
        /// Number of results [default: query.default_limit]
        #[arg(long)]
        limit: Option<usize>,
        #[command(flatten)]
        text: TextArgs,
    },
    /// List recorded commands, optionally within a calendar bucket or time range
    List {
        /// Maximum number of records [default: all]
        #[arg(long)]
        limit: Option<usize>,
        /// today | yesterday | this-week | last-week
        #[arg(long, conflicts_with_all = ["start", "end"])]
        bucket: Option<String>,
        /// Range start, unix seconds (inclusive)
        #[arg(long)]
        start: Option<i64>,
        /// Range end, unix seconds (inclusive)
        #[arg(long)]
        end: Option<i64>,
        /// Tab-separated columns: timestamp,status,pwd,cmd,gb,gr,durs,durms
        #[arg(long, conflicts_with = "json")]
        fmt: Option<String>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        text: TextArgs,
    },
    /// Distinct source apps seen in history
    Sources,
    /// Dump every record as one JSON object per line, oldest id first
    Export,
}

#[derive(Args, Default)]
struct ScopeArgs {
    /// Only commands run in this directory
    #[arg(long)]
    pwd: Option<String>,
    /// Only commands from this session: APP or APP:PID
    #[arg(long)]
    session: Option<String>,
}

#[derive(Args)]
struct TextArgs {
    /// Drop commands matching this shell glob
    #[arg(long)]
    exclude: Option<String>,
    /// Keep cmdlog's own invocations
    #[arg(long)]
    include_self: bool,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_env("CMDLOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    // stdout carries completion results; logs go to stderr.
    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("Log system initialization failed: {e}");
    }
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let result = Config::new()
        .context("Failed to load configuration")
        .and_then(|config| run(cli, &config));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Storage failures go through the log; everything else is a plain message.
            if err.downcast_ref::<StoreError>().is_some_and(StoreError::is_io) {
                error!("{:#}", err);
            } else {
                eprintln!("{} {:#}", "Error:".red(), err);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    let i18n = I18n::new(&config.get_effective_language());

    let db_path = config.resolve_db_path(cli.db);
    let retry = config.retry_policy();
    let open_error = || i18n.t_format("error_open_store", &[&db_path.display().to_string()]);

    match cli.command {
        Commands::Insert {
            cmd,
            pwd,
            status,
            ts,
            duration,
            git_branch,
            git_repo,
            source_app,
            source_pid,
            source_active,
        } => {
            let working_dir = match pwd {
                Some(dir) => dir,
                None => std::env::current_dir()
                    .context(i18n.t("error_current_dir"))?
                    .to_string_lossy()
                    .into_owned(),
            };
            let mut record = NewCommand::new(cmd, working_dir, ts.unwrap_or_else(|| Utc::now().timestamp()));
            record.exit_status = status;
            record.duration = duration;
            record.git_branch = git_branch;
            record.git_repo = git_repo;
            record.source_app = source_app;
            record.source_pid = source_pid;
            record.source_active = source_active;

            let mut store = Store::open_or_create(&db_path, retry).with_context(open_error)?;
            let id = store.insert(&record).context(i18n.t("error_insert"))?;
            println!("{}", id);
        }
        Commands::SetDuration { id, ms } => {
            let store = Store::open_or_empty(&db_path, retry).with_context(open_error)?;
            match store.set_duration(id, ms) {
                Ok(()) => {}
                Err(StoreError::CommandNotFound(id)) => {
                    warn!(id, "duration update for unknown command");
                    eprintln!("{}", i18n.t_format("duration_not_found", &[&id.to_string()]).yellow());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::LikeRecent { prefix, limit, scope, text } => {
            let filter = build_filter(config, &scope, &text)?;
            let limit = Some(limit.unwrap_or(config.query.default_limit));
            let store = Store::open_or_empty(&db_path, retry).with_context(open_error)?;
            let found = store
                .like_recent(prefix.as_deref().unwrap_or(""), limit, &filter)
                .context(i18n.t("error_query"))?;
            for text in found {
                println!("{}", text);
            }
        }
        Commands::LikeRecentAfter { prefix, prev_cmd, limit, text } => {
            let Some(prev_cmd) = prev_cmd else {
                return Err(StoreError::usage(i18n.t("prev_cmd_required")).into());
            };
            let filter = build_filter(config, &ScopeArgs::default(), &text)?;
            if prev_cmd.is_empty() {
                return Ok(());
            }
            let limit = Some(limit.unwrap_or(config.query.default_limit));
            let store = Store::open_or_empty(&db_path, retry).with_context(open_error)?;
            let found = store
                .like_recent_after(prefix.as_deref().unwrap_or(""), &prev_cmd, limit, &filter)
                .context(i18n.t("error_query"))?;
            for text in found {
                println!("{}", text);
            }
        }
        Commands::List { limit, bucket, start, end, fmt, json, scope, text } => {
            let filter = build_filter(config, &scope, &text)?;
            let columns = parse_columns(fmt.as_deref().unwrap_or(&config.display.columns))?;
            let range = match (bucket, start, end) {
                (Some(name), _, _) => Some(name.parse::<Bucket>()?.range(Local::now())),
                (None, Some(start), Some(end)) => Some((start, end)),
                (None, None, None) => None,
                _ => return Err(StoreError::usage(i18n.t("range_needs_both")).into()),
            };

            let store = Store::open_or_empty(&db_path, retry).with_context(open_error)?;
            if store.is_empty_handle() && !json {
                eprintln!("{}", i18n.t_format("no_history", &[&db_path.display().to_string()]).dimmed());
                return Ok(());
            }
            let commands = match range {
                Some((start, end)) => store.list_commands_in_range(start, end, limit, &filter),
                None => store.list_commands(limit, &filter),
            }
            .context(i18n.t("error_query"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&commands)?);
            } else if commands.is_empty() {
                eprintln!("{}", i18n.t("no_records").dimmed());
            } else if fmt.is_some() {
                for command in &commands {
                    println!("{}", render_row(command, &columns));
                }
            } else {
                for line in render_table(&commands, &columns) {
                    println!("{}", line);
                }
                if let Some((start, end)) = range {
                    let summary = i18n.t_format(
                        "range_summary",
                        &[
                            &commands.len().to_string(),
                            &format_timestamp(start),
                            &format_timestamp(end),
                        ],
                    );
                    eprintln!("{}", summary.dimmed());
                }
            }
        }
        Commands::Sources => {
            let store = Store::open_or_empty(&db_path, retry).with_context(open_error)?;
            for app in store.unique_source_apps().context(i18n.t("error_query"))? {
                println!("{}", app);
            }
        }
        Commands::Export => {
            let store = Store::open_or_empty(&db_path, retry).with_context(open_error)?;
            for command in store.scan_all().context(i18n.t("error_query"))? {
                println!("{}", serde_json::to_string(&command)?);
            }
        }
    }

    Ok(())
}

/// Per-invocation filter built from flags and config; nothing is kept globally.
fn build_filter(config: &Config, scope: &ScopeArgs, text: &TextArgs) -> Result<Filter, StoreError> {
    let mut filter = Filter::new()
        .self_prefix(config.query.self_prefix.clone())
        .include_self(text.include_self);
    if let Some(dir) = &scope.pwd {
        filter = filter.working_dir(dir.clone());
    }
    if let Some(token) = &scope.session {
        filter = filter.session(token.parse::<SessionFilter>()?);
    }
    if let Some(pattern) = &text.exclude {
        filter = filter.exclude(pattern)?;
    }
    Ok(filter)
}
