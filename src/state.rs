use crate::config::AppConfig;
use crate::db::{MemoryUserStore, PgUserStore, UserStore};
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.database_url {
            Some(url) => {
                let pg = PgUserStore::connect(url).await?;
                if let Err(e) = pg.migrate().await {
                    tracing::warn!(error = %format!("{e:#}"), "migration failed; continuing");
                }
                Arc::new(pg) as Arc<dyn UserStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set, keeping users in memory");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        let mailer = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?) as Arc<dyn Mailer>,
            None => Arc::new(LogMailer) as Arc<dyn Mailer>,
        };

        Ok(Self::from_parts(store, config, mailer))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            config,
            mailer,
        }
    }
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> Self {
        Self::fake_with_mailer(Arc::new(crate::mail::testing::RecordingMailer::default()))
    }

    pub fn fake_with_mailer(mailer: Arc<crate::mail::testing::RecordingMailer>) -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            public_url: "http://localhost:5173".into(),
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                action_ttl_minutes: 60,
            },
            smtp: None,
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config, mailer)
    }
}
