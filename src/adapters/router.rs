use crate::adapters::outbox::LogDispatcher;
use crate::adapters::telegram::{TelegramDispatcher, DEFAULT_API_BASE};
use crate::config::toml_config::{CampaignConfig, NotificationChannel};
use crate::core::{ContactAddress, Notification, NotificationDispatcher, Result};
use crate::utils::error::PromoError;
use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_TELEGRAM_TIMEOUT_SECONDS: u64 = 5;

/// 依收件人的聯絡方式選擇通道；對應通道未啟用時退回 fallback。
#[derive(Default)]
pub struct ChannelRouter {
    telegram: Option<Arc<dyn NotificationDispatcher>>,
    email: Option<Arc<dyn NotificationDispatcher>>,
    fallback: Option<Arc<dyn NotificationDispatcher>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_telegram(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.telegram = Some(dispatcher);
        self
    }

    pub fn with_email(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.email = Some(dispatcher);
        self
    }

    pub fn with_fallback(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.fallback = Some(dispatcher);
        self
    }

    fn route(&self, recipient: &ContactAddress) -> Option<&Arc<dyn NotificationDispatcher>> {
        let preferred = match recipient {
            ContactAddress::Telegram(_) => self.telegram.as_ref(),
            ContactAddress::Email(_) => self.email.as_ref(),
        };
        preferred.or(self.fallback.as_ref())
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelRouter {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        match self.route(&notification.recipient) {
            Some(dispatcher) => dispatcher.notify(notification).await,
            None => Err(PromoError::notification(
                notification.recipient.channel_name(),
                "channel not enabled",
            )),
        }
    }
}

/// 依設定檔的 `notifications.channels` 組出通知通道
pub fn build_dispatcher(config: &CampaignConfig) -> Result<Arc<dyn NotificationDispatcher>> {
    let mut router = ChannelRouter::new();

    for channel in config.channels()? {
        match channel {
            NotificationChannel::Telegram => {
                let telegram = config.telegram().ok_or_else(|| PromoError::MissingConfigError {
                    field: "notifications.telegram".to_string(),
                })?;
                let dispatcher = TelegramDispatcher::new(
                    telegram.api_base.as_deref().unwrap_or(DEFAULT_API_BASE),
                    &telegram.bot_token,
                    telegram
                        .timeout_seconds
                        .unwrap_or(DEFAULT_TELEGRAM_TIMEOUT_SECONDS),
                )?;
                tracing::info!("📡 Telegram notifications enabled");
                router = router.with_telegram(Arc::new(dispatcher));
            }
            NotificationChannel::Email => {
                router = router.with_email(build_email_dispatcher(config)?);
            }
            NotificationChannel::Log => {
                router = router.with_fallback(Arc::new(LogDispatcher));
            }
        }
    }

    Ok(Arc::new(router))
}

#[cfg(feature = "smtp")]
fn build_email_dispatcher(config: &CampaignConfig) -> Result<Arc<dyn NotificationDispatcher>> {
    use crate::adapters::smtp::{SmtpDispatcher, SmtpSettings};

    let email = config.email().ok_or_else(|| PromoError::MissingConfigError {
        field: "notifications.email".to_string(),
    })?;
    let dispatcher = SmtpDispatcher::new(SmtpSettings {
        server: email.smtp_server,
        port: email.smtp_port.unwrap_or(587),
        username: email.username,
        password: email.password,
        from_email: email.from_email,
        from_name: email.from_name.unwrap_or_else(|| config.campaign.name.clone()),
    })?;
    tracing::info!("📡 E-mail notifications enabled");
    Ok(Arc::new(dispatcher))
}

#[cfg(not(feature = "smtp"))]
fn build_email_dispatcher(_config: &CampaignConfig) -> Result<Arc<dyn NotificationDispatcher>> {
    Err(PromoError::ConfigValidationError {
        field: "notifications.channels".to_string(),
        message: "e-mail channel requires the 'smtp' feature".to_string(),
    })
}
