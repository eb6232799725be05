//! CLI interface for askdb
//!
//! This module provides the command-line interface using clap's derive API.
//! The binary is the external caller of the query pipeline: it renders
//! answers and past questions but contains no pipeline logic of its own.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ask questions about your database in plain language
///
/// Translates natural-language questions into SQL with an LLM, runs the
/// query, and phrases the result back as a readable answer.
#[derive(Parser, Debug)]
#[command(name = "askdb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        question: String,
    },

    /// Start an interactive session with follow-up context
    Repl,

    /// Show past questions, most recent first
    History,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_command() {
        let cli = Cli::parse_from(["askdb", "ask", "How many customers are there?"]);
        if let Command::Ask { question } = cli.command {
            assert_eq!(question, "How many customers are there?");
        } else {
            panic!("Expected Ask command");
        }
        assert!(!cli.json);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["askdb", "--json", "--log", "debug", "history"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
        assert!(matches!(cli.command, Command::History));
    }

    #[test]
    fn test_repl_command() {
        let cli = Cli::parse_from(["askdb", "repl"]);
        assert!(matches!(cli.command, Command::Repl));
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["askdb", "config", "show"]);
        if let Command::Config { action } = cli.command {
            assert!(matches!(action, ConfigAction::Show));
        } else {
            panic!("Expected Config command");
        }
    }

    #[test]
    fn test_custom_config_path() {
        let cli = Cli::parse_from(["askdb", "--config", "/tmp/other.toml", "history"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/other.toml")));
    }
}
