use std::time::Duration;

use anyhow::{bail, Context, Result};
use catnet::prelude::*;
use catnet_cli::packets::{client_registry, Chat, Hello, Ping};
use catnet_cli::{Command, NetArgs};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "catnet-client", version, about = "catnet demo chat client")]
struct Cli {
    #[command(flatten)]
    net: NetArgs,
    /// Give up if the server has not accepted within this many seconds.
    #[arg(long, default_value_t = 5)]
    connect_timeout: u64,
}

/// Forwards stdin lines as commands; end of input becomes `Quit`.
fn spawn_input(tx: mpsc::UnboundedSender<Command>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(command) = Command::parse(&line) {
                if tx.send(command).is_err() {
                    return;
                }
            }
        }
        let _ = tx.send(Command::Quit);
    });
}

fn spawn_ctrl_c(tx: mpsc::UnboundedSender<Command>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Command::Quit);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.net.load()?;
    catnet::telemetry::init(&config.log_filter);
    let server = config.address();

    let mut client = Client::builder()
        .config(config)
        .registry(client_registry()?)
        .connect(UdpTransport::new())
        .await
        .with_context(|| format!("connect to {server}"))?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(cli.connect_timeout);
    while client.is_connecting() {
        if tokio::time::Instant::now() >= deadline {
            bail!("{server} did not answer within {}s", cli.connect_timeout);
        }
        client.poll().await?;
    }
    if !client.is_connected() {
        bail!("{server} refused the connection");
    }
    client.send(&Hello).await?;
    println!("connected to {server}; /ping, /quit or type to chat");

    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_input(tx.clone());
    spawn_ctrl_c(tx);

    let mut nonce = 0u64;
    loop {
        client.poll().await?;
        if !client.is_connected() {
            println!("* disconnected by server");
            return Ok(());
        }

        while let Ok(command) = rx.try_recv() {
            let sent = match command {
                Command::Quit => {
                    client.disconnect().await?;
                    return Ok(());
                }
                Command::Ping => {
                    nonce += 1;
                    client.send(&Ping { nonce }).await
                }
                Command::Say(text) => client.send(&Chat { text }).await,
            };
            if let Err(e) = sent {
                eprintln!("! {e}");
            }
        }
    }
}
