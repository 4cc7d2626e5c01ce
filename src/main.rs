//! hola-echo server binary.

use hola_echo::config::Config;
use hola_echo::logging;
use hola_echo::server::Server;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = logging::init(&config.logging)?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        idle_timeout_secs = config.server.idle_timeout.as_secs(),
        accept_timeout_secs = config.server.accept_timeout.as_secs(),
        backlog = config.server.backlog,
        log_file = %config.logging.file.display(),
        "Starting hola-echo server"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let server = Server::new(config.server);
    if let Err(e) = runtime.block_on(server.run()) {
        error!(error = %e, "Server failed to start");
        return Err(e.into());
    }

    Ok(())
}
