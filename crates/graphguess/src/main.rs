use graphguess::{GraphGuessError, GraphGuessServer, ServerConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), GraphGuessError> {
    let config = ServerConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = GraphGuessServer::builder().config(&config)?.build().await?;
    tracing::info!(
        addr = %config.bind_addr(),
        round_secs = config.round.round_duration.as_secs(),
        loop_sets = config.round.loop_sets,
        "starting GraphGuess"
    );
    server.run().await
}
