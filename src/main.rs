mod app;
mod ask;
mod client;
mod config;
mod input;
mod markdown;
mod protocol;
mod render;
mod sse;
mod stream;
mod telemetry;
#[cfg(test)]
mod testing;
mod transcript;
mod ui;

use clap::Parser;
use config::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.subcommand();
    telemetry::init(cli.log_file.as_deref(), command == Command::Chat)?;

    let config = cli.client_config();
    match command {
        Command::Chat => ui::run_tui(config, cli.html),
        Command::Ask { prompt } => ask::run(&config, &prompt.join(" "), cli.html.as_deref()).await,
    }
}
