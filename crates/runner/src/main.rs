use bourse_runner::{BootstrapConfig, ExchangeBootstrap, summary};

fn print_help() {
    eprintln!(
        r#"Bourse - in-memory spot exchange bootstrap

USAGE:
    bourse-runner [OPTIONS]

OPTIONS:
    --config <PATH>     Load accounts, seed orders and exchange settings from JSON
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)

EXAMPLES:
    # Run the built-in demo (one crossing BTC pair)
    bourse-runner

    # Run with config file
    bourse-runner --config bourse.json
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = if let Some(path) = config_path {
        log::info!("Loading configuration from: {}", path);
        BootstrapConfig::from_file(&path)?
    } else {
        log::info!("Using default configuration");
        BootstrapConfig::default()
    };
    log::info!("Asset types: {}", config.exchange.asset_types.len());
    log::info!("Accounts: {}", config.accounts.len());
    log::info!("Seed orders: {}", config.seed_orders.len());

    let bootstrap = ExchangeBootstrap::with_config(config).await?;
    for line in summary(&bootstrap).await? {
        log::info!("{}", line);
    }

    bootstrap.shutdown().await;
    Ok(())
}
