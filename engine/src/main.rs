// Askdb natural-language SQL assistant
// Main entry point for the askdb binary

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use askdb_engine::assistant::Assistant;
use askdb_engine::cli::{Cli, Command, ConfigAction};
use askdb_engine::config::Config;
use askdb_engine::db::SqlDatabase;
use askdb_engine::history::QuestionHistory;
use askdb_engine::llm::build_provider;
use askdb_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    tracing::info!("Askdb v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with the CLI or config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    match cli.command {
        Command::Ask { question } => {
            let mut assistant = build_assistant(&config).await?;
            let answer = assistant.handle_query(&question).await;

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "question": question, "answer": answer })
                );
            } else {
                println!("{}", answer);
            }
            Ok(())
        }

        Command::Repl => {
            let assistant = build_assistant(&config).await?;
            run_repl(assistant).await
        }

        Command::History => {
            let history = QuestionHistory::new(&config.core.data_dir);
            let questions = history
                .recent()
                .await
                .context("Failed to read question history")?;

            if cli.json {
                println!("{}", serde_json::json!(questions));
            } else if questions.is_empty() {
                println!("No past questions yet.");
            } else {
                // Most recent first for display
                for (i, question) in questions.iter().rev().enumerate() {
                    println!("{}. {}", i + 1, question);
                }
            }
            Ok(())
        }

        Command::Config { action } => match action {
            ConfigAction::Show => {
                let toml_string =
                    toml::to_string_pretty(&config).context("Failed to render config")?;
                println!("{}", toml_string);
                Ok(())
            }
        },
    }
}

/// Wire the provider, database, and assistant session from config.
async fn build_assistant(config: &Config) -> Result<Assistant> {
    let provider = build_provider(&config.llm).context("Failed to build LLM provider")?;
    tracing::info!(
        "Using provider '{}' against database {}",
        provider.name(),
        config.database.path.display()
    );

    let db = Arc::new(SqlDatabase::connect(&config.database.path).await?);

    Ok(Assistant::new(
        provider,
        db,
        &config.core.data_dir,
        config.memory.window,
        config.llm.top_k,
    ))
}

/// Interactive loop: each non-command line is a question; `:history`,
/// `:clear`, and `:quit` are session commands.
async fn run_repl(mut assistant: Assistant) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("askdb: ask a question about your data (:quit to exit)");

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            ":quit" | ":exit" => break,
            ":clear" => {
                println!("{}", assistant.clear_memory());
            }
            ":history" => {
                let questions = assistant.saved_questions().await;
                if questions.is_empty() {
                    println!("No past questions yet.");
                } else {
                    for (i, question) in questions.iter().rev().enumerate() {
                        println!("{}. {}", i + 1, question);
                    }
                }
            }
            question => {
                let answer = assistant.handle_query(question).await;
                println!("{}", answer);
            }
        }
    }

    Ok(())
}
