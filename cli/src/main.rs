//! Lookout CLI - list, tree and search from the terminal.
//!
//! ```text
//! lookout list <path>
//! lookout tree <path> [--depth N]
//! lookout search <path> [--pattern GLOB] [--text TEXT]
//! lookout tools                      # tool definitions as JSON
//! lookout call <Name> '<json args>'  # dispatch through the tool registry
//! ```
//!
//! Logs go to `~/.lookout/logs/lookout.log`; stdout carries only results.

mod render;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lookout_config::LookoutConfig;
use lookout_tools::{
    BackendPreference, FsTools, ListRequest, SearchRequest, ToolCtx, ToolRegistry, ToolSettings,
    TreeRequest, register_builtins,
};
use lookout_types::{GlyphSet, ToolResponse};

/// Portable file inspection backed by native tools where available.
#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print the full response as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Draw trees with ASCII glyphs
    #[arg(long, global = true)]
    ascii: bool,

    /// Skip native tools and use the portable fallback
    #[arg(long, global = true)]
    fallback: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the immediate children of a directory
    List { path: PathBuf },
    /// Render a directory tree
    Tree {
        path: PathBuf,
        /// Levels below the root to show
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// Find files by glob, optionally filtered by literal content
    Search {
        path: PathBuf,
        /// Glob matched against the file name, or the relative path if it contains `/`
        #[arg(short, long)]
        pattern: Option<String>,
        /// Literal text to search for inside files
        #[arg(short, long)]
        text: Option<String>,
        /// Ignore case in both pattern and text
        #[arg(short = 'i', long)]
        ignore_case: bool,
        /// Only search the root's immediate children
        #[arg(long)]
        no_recursive: bool,
        /// Deepest level searched
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// Print the agent tool definitions
    Tools,
    /// Call an agent tool with JSON arguments
    Call { name: String, args: String },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than mix logs into results.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.lookout/logs/lookout.log
    if let Some(config_path) = LookoutConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("lookout.log"));
    }

    // Fallback: ./.lookout/logs/lookout.log
    candidates.push(PathBuf::from(".lookout").join("logs").join("lookout.log"));

    candidates
}

fn settings(args: &Args) -> ToolSettings {
    let config = match LookoutConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("warning: {err}; using defaults");
            LookoutConfig::default()
        }
    };
    let mut settings = config.tool_settings();
    if args.ascii {
        settings.glyphs = GlyphSet::Ascii;
    }
    if args.fallback {
        settings.backend = BackendPreference::Fallback;
    }
    settings
}

fn emit(response: &ToolResponse, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        print!("{}", render::body(response));
        for note in render::notes(response) {
            eprintln!("{note}");
        }
    }
    tracing::info!(
        backend = %response.backend.backend,
        reason = %response.backend.reason,
        error = ?response.error_kind(),
        "Command finished"
    );
    Ok(if response.result.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing();

    let tools = Arc::new(FsTools::detected(settings(&args)));

    match args.command {
        Command::List { ref path } => {
            let response = tools.list(&ListRequest::new(path)).await;
            emit(&response, args.json)
        }
        Command::Tree { ref path, depth } => {
            let mut request = TreeRequest::new(path);
            request.depth = depth;
            let response = tools.tree(&request).await;
            emit(&response, args.json)
        }
        Command::Search {
            ref path,
            ref pattern,
            ref text,
            ignore_case,
            no_recursive,
            depth,
        } => {
            let mut request = SearchRequest::new(path);
            request.pattern.clone_from(pattern);
            request.text.clone_from(text);
            request.case_insensitive = ignore_case.then_some(true);
            request.recursive = !no_recursive;
            request.depth = depth;
            let response = tools.search(&request).await;
            emit(&response, args.json)
        }
        Command::Tools => {
            let registry = registry(tools)?;
            println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { ref name, args: ref raw } => {
            let registry = registry(tools)?;
            let value: serde_json::Value =
                serde_json::from_str(raw).context("tool arguments must be JSON")?;
            let mut ctx = ToolCtx::new(std::env::current_dir()?);
            let output = registry.dispatch(name, value, &mut ctx).await?;
            println!("{output}");
            let failed = serde_json::from_str::<ToolResponse>(&output)
                .is_ok_and(|response| response.result.is_error());
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

fn registry(tools: Arc<FsTools>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::default();
    register_builtins(&mut registry, tools)?;
    Ok(registry)
}
