//! Run the pipeline behind the HTTP API until Ctrl+C / SIGTERM.
//!
//! ```text
//! cargo run --example serve -- [config.json]
//! ```
//!
//! Without a config file the defaults are used. `POSTMARK_SERVER_TOKEN`
//! overrides the delivery token.

use paperboy::{Config, Pipeline, run_with_shutdown};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,paperboy=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config: Config = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
        None => Config::default(),
    };
    if let Ok(token) = std::env::var("POSTMARK_SERVER_TOKEN") {
        config.delivery.server_token = Some(token);
    }

    let pipeline = Pipeline::new(config).await?;
    let api = pipeline.spawn_api_server();

    let mut events = pipeline.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(?event, "pipeline event");
        }
    });

    run_with_shutdown(pipeline).await?;
    api.abort();
    Ok(())
}
