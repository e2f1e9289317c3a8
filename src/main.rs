use clap::Parser;
use smtp_intake::config::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_ERRORS, DEFAULT_MAX_MESSAGE_SIZE};
use smtp_intake::{DirectoryStorage, MemoryStorage, ServerConfig, SmtpServer, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "smtp-intake", version, about = "Inbound SMTP server")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:25")]
    listen: String,

    /// Host identity used in the greeting and HELO/EHLO replies
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Message size advertised through the SIZE extension
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_size: usize,

    /// Seconds a connection may stay idle before it is dropped (0 disables)
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs())]
    idle_timeout: u64,

    /// Unrecognized commands tolerated in a row before disconnecting
    #[arg(long, default_value_t = DEFAULT_MAX_ERRORS)]
    max_errors: u32,

    /// Reject RCPT until MAIL has been accepted
    #[arg(long)]
    require_sender: bool,

    /// Start a fresh transaction after each stored message
    #[arg(long)]
    reset_after_data: bool,

    /// Write messages to this directory instead of keeping them in memory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smtp_intake=info".into()),
        )
        .init();

    let args = Args::parse();

    let storage: Arc<dyn Storage> = match &args.data_dir {
        Some(dir) => match DirectoryStorage::new(dir) {
            Ok(storage) => {
                info!(dir = %dir.display(), "storing messages on disk");
                Arc::new(storage)
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "failed to open data directory");
                std::process::exit(1);
            }
        },
        None => {
            info!("storing messages in memory");
            Arc::new(MemoryStorage::new())
        }
    };

    let config = ServerConfig::new(&args.hostname)
        .with_max_message_size(args.max_size)
        .with_idle_timeout(Duration::from_secs(args.idle_timeout))
        .with_max_errors(args.max_errors)
        .with_require_sender(args.require_sender)
        .with_reset_after_data(args.reset_after_data);

    let server = SmtpServer::new(config, storage);
    if let Err(e) = server.start(&args.listen) {
        error!(addr = %args.listen, error = %e, "failed to start server");
        std::process::exit(1);
    }
}
