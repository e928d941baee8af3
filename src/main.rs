use clap::Parser;
use std::sync::Arc;
use timed::config::Config;
use timed::coordinator::MixingCoordinator;
use timed::network_type::NetworkType;
use timed::scheduler;
use timed::shutdown::ShutdownManager;
use timed::wallet::Wallet;

#[derive(Parser, Debug)]
#[command(name = "anonpoold")]
#[command(about = "Mixing-pool node daemon", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[arg(long)]
    mainnet: bool,

    #[arg(long)]
    wallet: Option<String>,
}

fn init_tracing(config: &timed::config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if config.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let network_type = if args.mainnet {
        NetworkType::Mainnet
    } else {
        NetworkType::Testnet
    };

    let config = match Config::load_or_create(&args.config, &network_type) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);

    tracing::info!(
        network = %config.node.network,
        inode = config.inode.enabled,
        mixing_enabled = config.mixing.enable_mixing,
        "starting mixing node"
    );

    let wallet_path = args
        .wallet
        .unwrap_or_else(|| format!("{}/wallet.json", config.storage.data_dir));

    if let Err(e) = std::fs::create_dir_all(&config.storage.data_dir) {
        tracing::error!("failed to create data directory: {}", e);
        std::process::exit(1);
    }

    let passphrase = std::env::var("ANONPOOL_WALLET_PASSPHRASE").unwrap_or_default();
    let wallet = match Wallet::load(&wallet_path, &passphrase) {
        Ok(wallet) => {
            tracing::info!(address = %wallet.address(), "loaded existing wallet");
            wallet
        }
        Err(_) => {
            tracing::info!("no existing wallet found, creating one");
            match Wallet::new(network_type, None) {
                Ok(wallet) => {
                    if let Err(e) = wallet.save(&wallet_path, &passphrase) {
                        tracing::error!("failed to persist new wallet: {}", e);
                    }
                    tracing::info!(address = %wallet.address(), "created new wallet");
                    wallet
                }
                Err(e) => {
                    tracing::error!("failed to create wallet: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };
    let _ = wallet;

    let coordinator = Arc::new(MixingCoordinator::new());
    let mut shutdown = ShutdownManager::new();

    let scheduler_coordinator = coordinator.clone();
    let scheduler_token = shutdown.token();
    let scheduler_handle = tokio::spawn(async move {
        scheduler::run(scheduler_coordinator, scheduler_token, now_ms).await;
    });
    shutdown.register_task(scheduler_handle);

    tracing::info!("mixing core is up; network transport and chain collaborators are supplied by the host node");

    shutdown.wait_for_shutdown().await;
    tracing::info!("shutdown complete");
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
