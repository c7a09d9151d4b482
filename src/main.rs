//! proxy-gateway: multi-protocol forward proxy
//!
//! This is the main entry point for the gateway.
//!
//! # Usage
//!
//! ```bash
//! # Run with the configuration in the current directory
//! ./proxy-gateway
//!
//! # Run with custom configuration
//! ./proxy-gateway -c /path/to/config.json
//!
//! # Run with environment overrides
//! PROXY_GATEWAY_LOG_LEVEL=debug ./proxy-gateway
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use proxy_gateway::config::{create_default_config, load_config_with_env, Config};
use proxy_gateway::connection::{run_accept_loop, ConnectionStats};
use proxy_gateway::rules::ChannelRouter;

/// Command-line arguments
struct Args {
    /// Configuration file path
    config_path: PathBuf,
    /// Generate default configuration
    generate_config: bool,
    /// Check configuration only
    check_config: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = PathBuf::from("proxy-gateway.json");
        let mut generate_config = false;
        let mut check_config = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    if let Some(path) = args.next() {
                        config_path = PathBuf::from(path);
                    }
                }
                "-g" | "--generate-config" => {
                    generate_config = true;
                }
                "--check" => {
                    check_config = true;
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("proxy-gateway v{}", proxy_gateway::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {arg}");
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self {
            config_path,
            generate_config,
            check_config,
        }
    }
}

fn print_help() {
    println!(
        r#"proxy-gateway v{}

Forward proxy accepting HTTP CONNECT, HTTP and SOCKS5 clients on one port,
routing each destination domain through a configured channel.

USAGE:
    proxy-gateway [OPTIONS]

OPTIONS:
    -c, --config <PATH>     Configuration file path [default: proxy-gateway.json]
    -g, --generate-config   Generate default configuration and exit
    --check                 Check configuration and exit
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT:
    PROXY_GATEWAY_LISTEN_ADDR    Override listen address
    PROXY_GATEWAY_LOG_LEVEL      Override log level (trace, debug, info, warn, error)
    RUST_LOG                     Additional tracing filter directives

CHANNEL TYPES:
    direct                  Connect to the destination itself
    http                    Upstream HTTP proxy (CONNECT), addr = host:port
    socks5                  Upstream SOCKS5 server, addr = host:port
    ss,<method>,<password>  Shadowsocks, addr = host:port[,host:port...]
"#,
        proxy_gateway::VERSION
    );
}

/// Initialize logging
fn init_logging(config: &Config) {
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.target);

    if config.log.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();

    let args = Args::parse();

    if args.generate_config {
        create_default_config(&args.config_path)?;
        println!("Generated default configuration at {:?}", args.config_path);
        return Ok(());
    }

    let config = load_config_with_env(&args.config_path).with_context(|| {
        format!("Failed to load configuration from {:?}", args.config_path)
    })?;

    // Channel construction validates keys and server lists as well
    let router = Arc::new(
        ChannelRouter::from_config(&config).context("Failed to build channels")?,
    );

    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    init_logging(&config);

    info!("proxy-gateway v{}", proxy_gateway::VERSION);
    info!("Configuration loaded from {:?}", args.config_path);
    info!(
        "{} rules, socks5 channel '{}', default channel '{}'",
        router.table().rules.len(),
        router.socks5_channel().name(),
        router.default_channel().name()
    );

    let listener = TcpListener::bind(config.listen.address)
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen.address))?;

    let stats = Arc::new(ConnectionStats::new());
    let shutdown = CancellationToken::new();

    let accept_handle = tokio::spawn(run_accept_loop(
        listener,
        Arc::clone(&router),
        Arc::clone(&stats),
        shutdown.clone(),
    ));

    info!(
        "Startup complete in {:.2}ms",
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Received SIGINT, shutting down...");

    shutdown.cancel();
    accept_handle.await.context("Accept loop panicked")?;

    let stats = stats.snapshot();
    info!(
        "Final stats: {} total connections, {} completed, {} errored, {} active",
        stats.total_accepted, stats.completed, stats.errored, stats.active
    );
    info!(
        "Relayed: {} bytes up, {} bytes down, {} cached routes",
        stats.bytes_up,
        stats.bytes_down,
        router.cache_len()
    );

    info!("Shutdown complete");
    Ok(())
}
