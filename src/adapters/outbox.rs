use crate::core::{Notification, NotificationDispatcher, Result};
use crate::utils::error::PromoError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 只寫日誌，開發環境或沒有設定通道時使用。
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            "📝 [{}] to {}: {}",
            notification.event,
            notification.recipient,
            notification.message
        );
        Ok(())
    }
}

/// 把通知留在記憶體裡，方便檢查；可設定成一律投遞失敗。
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: bool,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for MemoryOutbox {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        if self.failing {
            return Err(PromoError::notification(
                notification.recipient.channel_name(),
                "outbox configured to fail",
            ));
        }
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}
