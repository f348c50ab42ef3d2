use clap::Parser;
use rad5gc_gw::{Config, Gateway, GatewayServer, DEFAULT_CONFIG_FILE};
use std::fs::OpenOptions;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Rad-5GC GW - RADIUS to 5GC (N12) authentication gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "rad5gc-gw")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config_path: String,

    /// Validate configuration and exit (doesn't start the gateway)
    #[arg(short, long)]
    validate: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    println!(
        "[Rad-5GC GW] ver.{} reading configuration...",
        env!("CARGO_PKG_VERSION")
    );
    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[Rad-5GC GW] reading configuration failed / {e}");
            process::exit(1);
        }
    };

    if cli.validate {
        println!("Configuration validated successfully");
        println!("  Allowed client: {}", config.allowed_client_address);
        println!("  AUSF address:   {}", config.ausf_address);
        println!("  Listen address: {}", config.listen_address);
        println!("  Overwrite link: {}", config.overwrite_link_string);
        process::exit(0);
    }

    init_logging(&config);

    info!("--------------------");
    info!("[Rad-5GC GW] ver.{} initializing...", env!("CARGO_PKG_VERSION"));
    info!(
        "[CONFIG] allowed client: {} / AUSF: {} / attributes logging: {} / overwrite link: {}",
        config.allowed_client_address,
        config.ausf_address,
        config.attributes_logging,
        config.overwrite_link_string
    );
    if !config.filename.is_empty() {
        // Rotation itself is external tooling's job; these settings are
        // surfaced so operators can cross-check them against it.
        info!(
            "[CONFIG] log file: {} (rotation: maxSize={}MB maxBackups={} maxAge={}d localTime={} compress={})",
            config.filename,
            config.max_size,
            config.max_backups,
            config.max_age,
            config.local_time,
            config.compress
        );
    }

    let listen_addr = match config.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("[Rad-5GC GW] invalid listen address: {e}");
            process::exit(1);
        }
    };

    let gateway = match Gateway::new(Arc::new(config)) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("[Rad-5GC GW] initialization failed / {e}");
            process::exit(1);
        }
    };

    let server = match GatewayServer::bind(listen_addr, gateway).await {
        Ok(server) => server,
        Err(e) => {
            error!("[Rad-5GC GW] Activation failed / {e}");
            process::exit(1);
        }
    };

    println!("[Rad-5GC GW] Activation success and start.");
    info!("[Rad-5GC GW] Activation success and start.");

    if let Err(e) = server.run().await {
        error!("[Rad-5GC GW] Activation failed / {e}");
        process::exit(1);
    }
}

/// Route logs to the configured file (append) or stdout, honoring
/// RUST_LOG overrides.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.filename.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        let file = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.filename)
        {
            Ok(file) => file,
            Err(e) => {
                eprintln!("[Rad-5GC GW] cannot open log file {}: {e}", config.filename);
                process::exit(1);
            }
        };
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
            .init();
    }
}
