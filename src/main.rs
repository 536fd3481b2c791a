//! Process entry point: environment, logging, then serve.

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onehop::config::Settings;
use onehop::http::ProxyServer;
use onehop::net::tls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Env vars from a .env file when one exists; absence is not an error.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onehop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;

    tracing::info!(
        listen_address = %settings.listen_address,
        upstream = %settings.target,
        tls = settings.tls.is_some(),
        dump_traffic = settings.dump_traffic,
        "configuration loaded"
    );

    let server = ProxyServer::new(settings.clone())?;

    match settings.tls {
        Some(material) => {
            // Certificate problems are fatal before any listener exists.
            let rustls = tls::load_tls_config(&material.cert_path, &material.key_path).await?;
            server.run_tls(settings.listen_address, rustls).await?;
        }
        None => {
            let listener = TcpListener::bind(settings.listen_address).await?;
            server.run(listener).await?;
        }
    }

    Ok(())
}
