use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;

use importer_cli::mock::MockApi;

/// Stand-in for the customer/account API
#[derive(Parser, Debug)]
#[command(name = "mock-api", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Customer or account number to answer with HTTP 500 (repeatable)
    #[arg(long = "fail-on", value_name = "KEY")]
    fail_on: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));

    MockApi::new().fail_on(cli.fail_on).serve(addr).await
}
