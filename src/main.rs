use envconfig::Envconfig;
use tracing::{error, info};
use vigil::config::Config;
use vigil::deps::LiveConnector;
use vigil::server::SignalListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::init_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(addr = %config.bind(), "Starting vigil");

    // Register signal handlers before connecting so an early SIGTERM is not lost
    let signals = SignalListener::new()?;
    let connector = LiveConnector::new(config.backends.clone());

    if let Err(e) = vigil::app::run(config, &connector, signals).await {
        error!(error = %e, "Exiting after startup failure");
        return Err(e);
    }

    Ok(())
}
