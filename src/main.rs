use std::sync::Arc;

use clap::Parser;
use config::{Cli, Command};
use tracing_subscriber::EnvFilter;

mod config;
mod echo;
mod error;
mod reader;
mod relay;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // connect tracing to stdout, `RUST_LOG` overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let stats = match cli.command {
        Command::Serve { listen, to } => {
            let listen = config::listen_or_generate(listen, &mut rand::thread_rng());
            let listener = server::bind(&listen).await?;
            println!("revtcp listening on: {}", listener.local_addr()?);
            tracing::info!("Server started {} <- {}", to, listen);

            let to: Arc<str> = to.into();
            server::run(
                listener,
                move |conn, peer| relay::handle(conn, peer, to.clone()),
                shutdown_signal(),
            )
            .await
        }
        Command::EchoServer { listen } => {
            let listen = config::listen_or_generate(listen, &mut rand::thread_rng());
            let listener = server::bind(&listen).await?;
            println!("echo-server listening on: {}", listener.local_addr()?);
            tracing::info!("Server started {}", listen);

            server::run(listener, echo::handle, shutdown_signal()).await
        }
    };

    tracing::info!(
        "Server stopped after {} connection(s), {} failed accept(s)",
        stats.accepted,
        stats.accept_errors
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        // without a signal handler the server runs until it is killed
        tracing::error!("failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
}
