use clap::Parser;
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};
use tidehttp::{logging, Server, ServerConfig};

/// Multi-threaded HTTP/1.1 origin server serving a rooted content directory.
#[derive(Parser, Debug)]
#[command(name = "tidehttp", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(default_value_t = 8080)]
    port: u16,

    /// Host address to bind
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Worker pool size
    #[arg(default_value = "10")]
    max_threads: NonZeroUsize,

    /// Content directory served to clients
    #[arg(long, default_value = "resources")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        workers: cli.max_threads.get(),
        content_root: cli.root,
        ..ServerConfig::default()
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(err) => {
            eprintln!("tidehttp: failed to start: {err}");
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tidehttp: fatal error: {err}");
            ExitCode::FAILURE
        }
    }
}
