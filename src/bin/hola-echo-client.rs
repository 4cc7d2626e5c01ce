//! Interactive hola-echo client.

use clap::Parser;
use hola_echo::config::ClientArgs;
use hola_echo::{logging, EchoClient};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();
    let _log_guard = logging::init_console("warn")?;

    let client = EchoClient::new(args.host, args.port);
    if let Err(e) = client
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
    {
        println!("Unexpected error: {e}");
    }

    Ok(())
}
