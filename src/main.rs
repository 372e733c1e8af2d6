//! embercache - A Memcached-Compatible In-Memory Cache
//!
//! This is the main entry point for the embercache server.
//! It sets up the TCP listener, cache engine, and handles incoming connections.

use embercache::commands::CommandHandler;
use embercache::connection::{handle_connection, ConnectionStats};
use embercache::storage::{start_expiry_sweeper, CacheEngine};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: embercache::DEFAULT_HOST.to_string(),
            port: embercache::DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("embercache version {}", embercache::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
embercache - A Memcached-Compatible In-Memory Cache

USAGE:
    embercache [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 11211)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    embercache                      # Start on 127.0.0.1:11211
    embercache --port 11212         # Start on port 11212
    embercache --host 0.0.0.0       # Listen on all interfaces

CONNECTING:
    Use any memcached client, or plain netcat:
    $ printf 'set name 0 0 5\r\nember\r\nget name\r\n' | nc 127.0.0.1 11211
    STORED
    VALUE name 0 5
    ember
    END
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("embercache v{} starting", embercache::VERSION);

    // Create the cache engine (shared across all connections)
    let cache = Arc::new(CacheEngine::new());
    info!("Cache engine initialized");

    // Start the background expiry sweeper
    let _sweeper = start_expiry_sweeper(Arc::clone(&cache));

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&cache), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    let cache_stats = cache.stats();
    info!(
        entries = cache_stats.entries,
        set_ops = cache_stats.set_ops,
        add_ops = cache_stats.add_ops,
        delete_ops = cache_stats.delete_ops,
        get_hits = cache_stats.get_hits,
        get_misses = cache_stats.get_misses,
        expired = cache_stats.expired,
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        replies_suppressed = stats.replies_suppressed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    cache: Arc<CacheEngine>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                // Create a command handler for this connection
                let handler = CommandHandler::new(Arc::clone(&cache));
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
