use clap::Args;
use patreg::server::{create_router, start_server, ServerConfig, WsContext};
use patreg::PatregConfig;

use super::fail;

/// Arguments for the Serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (defaults to the configured server_address)
    #[clap(long)]
    pub address: Option<String>,

    /// Port to listen on (defaults to the configured server_port)
    #[clap(short, long)]
    pub port: Option<u16>,
}

pub async fn run(config: &PatregConfig, args: ServeArgs) {
    let mut server_config = ServerConfig::from_config(config);
    if let Some(address) = args.address {
        server_config = server_config.with_address(address);
    }
    if let Some(port) = args.port {
        server_config = server_config.with_port(port);
    }

    eprintln!(
        "Serving registry {} on ws://{}/ws",
        config.database_path,
        server_config.bind_address()
    );

    let context = WsContext::from_config(config.clone());
    if let Err(e) = start_server(create_router(), context, server_config).await {
        fail(e);
    }
}
