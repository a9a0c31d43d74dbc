use crate::client::ClientConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Parser)]
#[command(name = "stagewise", version, about = "Watch a staged agent answer stream in")]
pub struct Cli {
    /// Base URL of the agent service.
    #[arg(long, env = "STAGEWISE_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Backend engine to request for the session.
    #[arg(long, env = "STAGEWISE_ENGINE")]
    pub engine: Option<String>,

    /// Rewrite this file with the transcript HTML after every change.
    #[arg(long, env = "STAGEWISE_HTML")]
    pub html: Option<PathBuf>,

    #[arg(long, env = "STAGEWISE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Interactive transcript (default).
    Chat,
    /// Send one prompt and print the staged answer.
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.url.clone(),
            engine: self
                .engine
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_lowercase),
        }
    }

    pub fn subcommand(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }
}
