use clap::Parser;
use infrastructure::config::Config;
use presentation::cli::{Cli, CliApp, Command, ShellArgs};
use shared::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli
        .command
        .unwrap_or_else(|| Command::Shell(ShellArgs::default()));
    let mut config = Config::load()?;
    command.apply_overrides(&mut config);
    tracing::debug!(vectorstore = %config.vectorstore_path.display(), embedder = ?config.embedder, "configuration loaded");

    let mut app = CliApp::new(config)?;
    app.run(command).await
}
