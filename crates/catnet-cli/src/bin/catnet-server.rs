use anyhow::{Context, Result};
use catnet::prelude::*;
use catnet_cli::packets::server_registry;
use catnet_cli::NetArgs;
use clap::Parser;

#[derive(Parser)]
#[command(name = "catnet-server", version, about = "catnet demo chat server")]
struct Cli {
    #[command(flatten)]
    net: NetArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.net.load()?;
    catnet::telemetry::init(&config.log_filter);

    let mut server = Server::builder()
        .config(config)
        .registry(server_registry()?)
        .on(EventKind::Connect, |e| {
            if let Some(user) = e.user {
                tracing::info!(%user, peer = %e.peer, "user joined");
            }
        })
        .on(EventKind::Disconnect, |e| {
            if let Some(user) = e.user {
                tracing::info!(%user, peer = %e.peer, "user left");
            }
        })
        .build(UdpTransport::new())
        .await
        .context("start server")?;

    println!("listening on {}", server.ipaddress());
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
