use std::env;
use std::process;
use trade_opportunities::{config::AppConfig, init_tracing, serve};

#[tokio::main]
async fn main() {
    init_tracing();

    // Optional config file path; defaults apply without one.
    let mut config = match env::args().nth(1) {
        Some(path) => match AppConfig::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from {}: {}", path, e);
                eprintln!("Usage: trade-opportunities [config_file]");
                process::exit(1);
            }
        },
        None => AppConfig::default(),
    };
    config.apply_env_overrides();

    if let Err(e) = serve(config).await {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
