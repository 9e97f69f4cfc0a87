use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use rescuebot::config::AppConfig;
use rescuebot::core;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("rescuebot {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("rescuebot {}", env!("CARGO_PKG_VERSION"));
                println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
                println!("Usage: rescuebot [OPTIONS]\n");
                println!("Options:");
                println!("  --config <path>  Path to config.toml (default: config.toml,");
                println!("                   or the RESCUEBOT_CONFIG environment variable)");
                println!("  -h, --help       Print help");
                println!("  -V, --version    Print version");
                return Ok(());
            }
            _ => {}
        }
    }

    let config = AppConfig::load(&config_path(&args))?;
    core::run(config).await
}

/// Resolve the config path: `--config <path>` beats `RESCUEBOT_CONFIG`
/// beats `config.toml`.
fn config_path(args: &[String]) -> PathBuf {
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if let Some(path) = args.get(pos + 1) {
            return PathBuf::from(path);
        }
    }
    std::env::var("RESCUEBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}
