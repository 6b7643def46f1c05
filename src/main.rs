use anyhow::Error;
use tracing::info;

use crate::harvest::{ConfigManager, Harvester, init_logging};

mod harvest;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ConfigManager::new("config")?;
    let _log_guard = init_logging(config.app_config())?;

    info!("Starting breed_harvester {}...", env!("CARGO_PKG_VERSION"));

    // Credential placeholders are fatal before a single request goes out.
    let harvester = Harvester::from_config(&config)?;
    let summary = harvester.run().await?;

    info!(
        "Total downloads: {} images, root dir: {}",
        summary.grand_total,
        config.app_config().paths.root_dir
    );

    Ok(())
}
