//! Merlin CLI
//!
//! Command-line interface for the Merlin EQL to SQL translator.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::{CliConfig, Overrides};
use merlin_eql::{EqlError, EqlTranspiler, Translation};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "merlin")]
#[command(about = "Merlin - EQL to SQL query translator", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "merlin.yaml")]
    config: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one query into a SQL WHERE clause
    Translate {
        /// EQL query
        query: String,
    },

    /// Print the parse tree of a query as JSON
    Parse {
        /// EQL query
        query: String,
    },

    /// Translate every line of a file
    Batch {
        /// File with one query per line; blank lines and `#` comments are skipped
        file: PathBuf,
    },

    /// Interactive translator; type `exit` to quit
    Repl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let mut config = CliConfig::load(&cli.config)?;
    config.apply(&cli.overrides);

    let options = config.transform_options()?;
    let transpiler = Arc::new(EqlTranspiler::new(options));

    match cli.command {
        Commands::Translate { query } => translate(&transpiler, &config, cli.format, &query)?,
        Commands::Parse { query } => parse(&transpiler, &query)?,
        Commands::Batch { file } => batch(transpiler, &config, cli.format, file).await?,
        Commands::Repl => repl(&transpiler, &config).await?,
    }

    Ok(())
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(())
}

/// Apply the configured strictness to a translation result
fn finish(result: merlin_eql::Result<Translation>, strict: bool) -> merlin_eql::Result<Translation> {
    let translation = result?;
    for error in &translation.errors {
        warn!(error = %error, "translation degraded");
    }
    if strict {
        translation.into_strict()
    } else {
        Ok(translation)
    }
}

fn select_statement(table: &str, where_clause: &str) -> String {
    if where_clause.is_empty() {
        format!("SELECT * FROM {}", table)
    } else {
        format!("SELECT * FROM {} WHERE {}", table, where_clause)
    }
}

fn print_translation(translation: &Translation, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(translation)?),
        OutputFormat::Text => {
            println!("{}", translation.where_clause);
            for (name, value) in &translation.parameters {
                println!("  {} = {}", name, value);
            }
        }
    }
    Ok(())
}

fn translate(
    transpiler: &EqlTranspiler,
    config: &CliConfig,
    format: OutputFormat,
    query: &str,
) -> Result<()> {
    let translation = finish(transpiler.transform(query), config.strict)
        .with_context(|| format!("failed to translate {:?}", query))?;
    print_translation(&translation, format)
}

fn parse(transpiler: &EqlTranspiler, query: &str) -> Result<()> {
    let cst = transpiler.parse(query)?;
    println!("{}", serde_json::to_string_pretty(&cst)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct BatchEntry {
    line: usize,
    query: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    translation: Option<Translation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Non-empty, non-comment lines with their 1-based line numbers
fn batch_queries(content: &str) -> Vec<(usize, String)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| (n, line.to_string()))
        .collect()
}

async fn batch(
    transpiler: Arc<EqlTranspiler>,
    config: &CliConfig,
    format: OutputFormat,
    file: PathBuf,
) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let queries = batch_queries(&content);
    info!(file = %file.display(), queries = queries.len(), "translating batch");

    let handles: Vec<_> = queries
        .into_iter()
        .map(|(line, query)| {
            let transpiler = transpiler.clone();
            let strict = config.strict;
            tokio::task::spawn_blocking(move || {
                let result = finish(transpiler.transform(&query), strict);
                (line, query, result)
            })
        })
        .collect();

    let mut entries = Vec::with_capacity(handles.len());
    for handle in handles {
        let (line, query, result) = handle.await?;
        let (translation, error) = match result {
            Ok(translation) => (Some(translation), None),
            Err(e) => (None, Some(e.to_string())),
        };
        entries.push(BatchEntry {
            line,
            query,
            translation,
            error,
        });
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                match (&entry.translation, &entry.error) {
                    (Some(t), _) => println!("{}: {}", entry.line, t.where_clause),
                    (None, Some(e)) => println!("{}: error: {}", entry.line, e),
                    (None, None) => {}
                }
            }
        }
    }

    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} queries failed", failed, entries.len());
    }
    Ok(())
}

async fn repl(transpiler: &EqlTranspiler, config: &CliConfig) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(b"EQL client\n").await?;
    loop {
        stdout.write_all(b"EQL> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query == "exit" {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let output = match finish(transpiler.transform(query), config.strict) {
            Ok(translation) => {
                let mut out = format!("where clause: '{}'\n", translation.where_clause);
                for (name, value) in &translation.parameters {
                    out.push_str(&format!("  {} = {}\n", name, value));
                }
                out.push_str(&format!(
                    "SQL:\n{}\n",
                    select_statement(&config.table, &translation.where_clause)
                ));
                out
            }
            Err(e) => describe_error(&e),
        };
        stdout.write_all(output.as_bytes()).await?;
    }

    Ok(())
}

fn describe_error(error: &EqlError) -> String {
    let mut out = format!("{} error:\n", error.stage());
    for message in error.messages() {
        out.push_str(&format!("  {}\n", message));
    }
    out
}
