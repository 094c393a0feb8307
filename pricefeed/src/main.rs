use std::sync::Arc;

use pricefeed::{
    catalog::{JsonFileCatalog, StaticCatalog},
    config::AppConfig,
    engine::PriceUpdateEngine,
};

async fn build_engine(cfg: &AppConfig) -> Arc<PriceUpdateEngine> {
    let engine = PriceUpdateEngine::new(cfg.engine.clone());

    let seeded = match &cfg.catalog_path {
        Some(path) => engine.seed_from(&JsonFileCatalog::new(path)).await,
        None => engine.seed_from(&StaticCatalog::builtin()).await,
    };
    if seeded == 0 {
        tracing::warn!("no stations seeded; prices will not move");
    }

    engine
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    common::init_logger("pricefeed", cfg.json_logs);

    tracing::info!(
        interval_secs = cfg.engine.update_interval.as_secs(),
        batch_size = cfg.engine.update_batch_size,
        "Starting CNG price feed..."
    );

    let engine = build_engine(&cfg).await;

    let subscription = engine.subscribe(|updates| {
        for u in updates {
            tracing::info!(
                station_id = %u.station_id,
                price = u.new_price,
                change = format_args!("{:+.2}", u.change),
                "price"
            );
        }
        Ok(())
    });

    engine.connect();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    subscription.unsubscribe();
    engine.disconnect();

    Ok(())
}
