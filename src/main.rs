use clap::Parser;
use risk_engine::cli::{Cli, Commands};
use risk_engine::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize telemetry
    let _telemetry = risk_engine::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            args.execute(&config).await?;
        }
        Commands::Decide(args) => {
            args.execute(&config).await?;
        }
        Commands::Positions => {
            let broker = risk_engine::cli::connect(&config).await?;
            let snapshot = risk_engine::position::read_snapshot(broker.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(snapshot.positions())?);
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
