use std::sync::Arc;

use crate::{
    attendance_scraper::{AttendanceScraper, PortalLayout},
    chromium::ChromiumSessionFactory,
    config::BotConfig,
    credential_store::CredentialStore,
    telegram::TelegramApi,
};

/// Everything a bot handler needs, shared across spawned update tasks.
pub struct ScrapingContext {
    pub scraper: AttendanceScraper,
    pub telegram: TelegramApi,
    pub credentials: CredentialStore,
    pub poll_timeout_secs: u64,
}

impl ScrapingContext {
    pub async fn new(config: BotConfig) -> anyhow::Result<Self> {
        let factory = Arc::new(ChromiumSessionFactory::new(config.chrome_path));
        let scraper = AttendanceScraper::new(factory, PortalLayout::new(config.portal_url))
            .with_wait(config.wait_timeout);
        let telegram = TelegramApi::new(&config.telegram_token);
        let credentials = CredentialStore::open(config.session_file).await?;
        Ok(ScrapingContext {
            scraper,
            telegram,
            credentials,
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }
}
