use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use attendance_bot::{ScrapingContext, bot, config::BotConfig};
use dotenv::dotenv;
use env_logger::{Env, Target};
use log::info;

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = BotConfig::new()?;
    init_logging(config.log_file.as_deref())?;

    info!("bot is starting, portal at {}", config.portal_url);
    let ctx = Arc::new(ScrapingContext::new(config).await?);
    bot::run(ctx).await;
    Ok(())
}
