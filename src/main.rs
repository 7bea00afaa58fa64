//! syslogkit - collect, store and search syslog messages
//!
//! # Usage
//!
//! ```bash
//! # Receive on UDP and TCP 5140, store into syslogkit.db
//! syslogkit serve
//! syslogkit --config syslogkit.toml serve --port 1514 --no-tcp
//!
//! # Search what was stored
//! syslogkit query --search "disk full" --min-severity warning
//!
//! # Emit a message
//! syslogkit send --tcp --severity err --app backup "nightly job failed"
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use syslogkit::{sender, Config, Facility, Listener, LogFilter, LogStore, Severity, SyslogMessage};

#[derive(Parser, Debug)]
#[command(name = "syslogkit")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `syslogkit=trace`; overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive messages and store them
    Serve(ServeArgs),

    /// Print stored messages, most recent first
    Query(QueryArgs),

    /// Send one message to a receiver
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port for both transports
    #[arg(short, long)]
    port: Option<u16>,

    /// Database file
    #[arg(long)]
    db: Option<PathBuf>,

    /// Do not listen on UDP
    #[arg(long)]
    no_udp: bool,

    /// Do not listen on TCP
    #[arg(long)]
    no_tcp: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Database file
    #[arg(long)]
    db: Option<PathBuf>,

    /// Only messages whose body contains this text
    #[arg(short, long, default_value = "")]
    search: String,

    /// Maximum number of rows
    #[arg(short = 'n', long, default_value_t = syslogkit::store::DEFAULT_QUERY_LIMIT)]
    limit: u32,

    /// Only messages at least this severe (name or 0-7)
    #[arg(long)]
    min_severity: Option<Severity>,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Receiver host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Receiver port
    #[arg(short, long, default_value_t = syslogkit::config::DEFAULT_PORT)]
    port: u16,

    /// Use TCP instead of UDP
    #[arg(long)]
    tcp: bool,

    /// Facility name or numeric code
    #[arg(long, default_value = "user", value_parser = parse_facility)]
    facility: u32,

    /// Severity name or 0-7
    #[arg(long, default_value = "info")]
    severity: Severity,

    /// Hostname in the header, `localhost` when omitted
    #[arg(long, default_value = "")]
    hostname: String,

    /// Application tag
    #[arg(long, default_value = "")]
    app: String,

    /// Message body
    message: String,
}

fn parse_facility(s: &str) -> Result<u32, syslogkit::Error> {
    match s.parse::<u32>() {
        Ok(code) => Ok(code),
        Err(_) => s.parse::<Facility>().map(Facility::code),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| config.log.level.as_str());
    init_logging(level)?;

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::Query(args) => query(config, args),
        Command::Send(args) => send(args).await,
    }
}

/// Initialize the tracing subscriber. Logs go to stderr so query output stays clean.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

async fn serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(db) = args.db {
        config.store.path = db;
    }
    let udp = config.server.udp && !args.no_udp;
    let tcp = config.server.tcp && !args.no_tcp;

    let store = Arc::new(LogStore::new());
    store.open(&config.store.path)?;

    let mut listener = Listener::new(config.listener.clone());
    let sink = Arc::clone(&store);
    listener.set_callback(move |message| {
        tracing::info!(
            host = message.hostname(),
            app = message.app_name(),
            severity = %message.severity(),
            "{}",
            message.message()
        );
        if let Err(err) = sink.write(&message) {
            tracing::error!(error = %err, "failed to store message");
        }
    });

    listener.start(config.server.port, udp, tcp).await?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutting down");

    listener.stop().await;
    let stats = listener.stats();
    tracing::info!(
        received = stats.received,
        dropped = stats.dropped,
        errors = stats.errors,
        "listener totals"
    );
    store.close();

    Ok(())
}

fn query(config: Config, args: QueryArgs) -> Result<()> {
    let path = args.db.unwrap_or(config.store.path);
    if !path.exists() {
        anyhow::bail!("no database at {}", path.display());
    }

    let store = LogStore::new();
    store.open(&path)?;

    let filter = LogFilter {
        search_text: args.search,
        min_severity: args.min_severity,
        limit: args.limit,
    };
    for message in store.query(&filter)? {
        println!(
            "{}\t{}\t{}\t{}",
            message.timestamp(),
            message.hostname(),
            message.app_name(),
            message.message()
        );
    }

    Ok(())
}

async fn send(args: SendArgs) -> Result<()> {
    let target = resolve(&args.host, args.port)?;
    let message = SyslogMessage::new(args.facility, args.severity, args.message)
        .with_hostname(args.hostname)
        .with_app_name(args.app);

    if args.tcp {
        sender::send_tcp(target, &message).await?;
    } else {
        sender::send_udp(target, &message).await?;
    }

    Ok(())
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {host}"))?
        .next()
        .with_context(|| format!("no address for {host}"))
}
