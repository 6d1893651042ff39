#![deny(unused_must_use)]

mod api;
mod config;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use greetcard_core::site::Site;
use log::{error, info, warn};
use tokio::signal::ctrl_c;

use crate::config::ServerArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    args.log.init().context("Cannot initialize logging")?;

    let tls = args.tls()?;
    let site = Site::open(&args.site)
        .with_context(|| format!("Cannot open {:?} with pages in {:?}", args.site.database, args.site.pages_dir))?;
    let routes = routes::routes(Arc::new(site));
    let address = args.address();

    match tls {
        Some(tls) => {
            let (address, server) = warp::serve(routes)
                .tls()
                .cert_path(&tls.cert)
                .key_path(&tls.key)
                .bind_with_graceful_shutdown(address, shutdown_signal());
            info!("HTTPS server running at https://{}", address);
            server.await;
        }
        None => {
            let (address, server) = warp::serve(routes)
                .try_bind_with_graceful_shutdown(address, shutdown_signal())
                .with_context(|| format!("Cannot bind {}", address))?;
            warn!("TLS disabled, HTTP server running at http://{}", address);
            server.await;
        }
    }

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
