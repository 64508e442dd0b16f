use infrakit_server::{Bootstrap, Config, KeyValCtrl, QueueCtrl, TestCtrl};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("infrakit_server=info,info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load()?;
    let registries = infrakit_providers::registries();
    info!(
        apps = ?registries.apps.names(),
        keyvals = ?registries.keyvals.names(),
        queues = ?registries.queues.names(),
        "Starting Infrakit server"
    );

    Bootstrap::new(config, registries)
        .add_ctrl(TestCtrl)
        .add_ctrl(KeyValCtrl)
        .add_ctrl(QueueCtrl)
        .start()
        .await?;

    Ok(())
}
