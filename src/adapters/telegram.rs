use crate::core::{ClaimRef, ContactAddress, Notification, NotificationDispatcher, Result};
use crate::utils::error::PromoError;
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use reqwest::Client;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// 透過 Bot API `sendMessage` 投遞。
pub struct TelegramDispatcher {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramDispatcher {
    pub fn new(api_base: &str, bot_token: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationDispatcher for TelegramDispatcher {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let ContactAddress::Telegram(chat_id) = &notification.recipient else {
            return Err(PromoError::notification(
                "telegram",
                format!("{} is not a Telegram chat", notification.recipient),
            ));
        };

        tracing::debug!("Sending Telegram message to chat {}", chat_id);
        let response = self
            .client
            .post(self.send_message_url())
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": notification.message,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PromoError::notification(
                "telegram",
                format!("HTTP {}: {}", status, body),
            ));
        }
        Ok(())
    }
}

/// 一般訊息或按鈕回呼中的 chat id
pub fn chat_id_from_update(update: &serde_json::Value) -> Option<i64> {
    update
        .pointer("/message/chat/id")
        .or_else(|| update.pointer("/callback_query/message/chat/id"))
        .and_then(serde_json::Value::as_i64)
}

/// `/start <token>` 深層連結帶回來的 claim token
pub fn start_token_from_update(update: &serde_json::Value) -> Option<Uuid> {
    let text = update.pointer("/message/text")?.as_str()?;
    let payload = text.trim().strip_prefix("/start")?.trim();
    Uuid::parse_str(payload).ok()
}

/// 讓訪客開啟 bot 時帶上自己的 claim token
pub fn deep_link(bot_username: &str, claim: &ClaimRef) -> String {
    format!(
        "https://t.me/{}?start={}",
        bot_username.trim_start_matches('@'),
        claim.token
    )
}

/// 訪客透過深層連結私訊 bot 後，以 claim token 暫存他的 chat id。
/// 只有持有同一個 token 的登記流程拿得到，超過 TTL 就丟掉。
#[derive(Debug)]
pub struct PendingChatLinks {
    links: Mutex<HashMap<Uuid, (i64, NaiveDateTime)>>,
    ttl: Duration,
}

impl PendingChatLinks {
    pub fn new(ttl: Duration) -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn link(&self, token: Uuid, chat_id: i64, at: NaiveDateTime) {
        let mut links = self.links.lock().await;
        let cutoff = at - self.ttl;
        links.retain(|_, (_, seen_at)| *seen_at >= cutoff);
        links.insert(token, (chat_id, at));
    }

    /// 處理 webhook update；不是帶 token 的 `/start` 就略過
    pub async fn record_update(&self, update: &serde_json::Value, at: NaiveDateTime) -> Option<Uuid> {
        let token = start_token_from_update(update)?;
        let chat_id = chat_id_from_update(update)?;
        self.link(token, chat_id, at).await;
        tracing::debug!("🔗 Chat {} linked to a pending claim", chat_id);
        Some(token)
    }

    /// 取出並移除此 claim 的 chat，供 `finalize_identity` 使用
    pub async fn take(&self, claim: &ClaimRef, now: NaiveDateTime) -> Option<ContactAddress> {
        let mut links = self.links.lock().await;
        let (chat_id, seen_at) = links.remove(&claim.token)?;
        (seen_at >= now - self.ttl).then_some(ContactAddress::Telegram(chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_chat_id_from_message_update() {
        let update = serde_json::json!({
            "update_id": 1,
            "message": {"chat": {"id": 4242, "type": "private"}, "text": "/start"}
        });
        assert_eq!(chat_id_from_update(&update), Some(4242));
    }

    #[test]
    fn test_chat_id_from_callback_update() {
        let update = serde_json::json!({
            "update_id": 2,
            "callback_query": {"message": {"chat": {"id": -77}}}
        });
        assert_eq!(chat_id_from_update(&update), Some(-77));
        assert_eq!(chat_id_from_update(&serde_json::json!({"update_id": 3})), None);
    }

    fn start_update(chat_id: i64, text: &str) -> serde_json::Value {
        serde_json::json!({
            "update_id": chat_id,
            "message": {"chat": {"id": chat_id, "type": "private"}, "text": text}
        })
    }

    #[test]
    fn test_start_token_from_update() {
        let claim = ClaimRef::new("SPA-001");
        let update = start_update(4242, &format!("/start {}", claim.token));
        assert_eq!(start_token_from_update(&update), Some(claim.token));
        assert_eq!(start_token_from_update(&start_update(4242, "/start")), None);
        assert_eq!(start_token_from_update(&start_update(4242, "ciao")), None);
    }

    #[test]
    fn test_deep_link_carries_token() {
        let claim = ClaimRef::new("SPA-001");
        assert_eq!(
            deep_link("@gustino_bot", &claim),
            format!("https://t.me/gustino_bot?start={}", claim.token)
        );
    }

    #[tokio::test]
    async fn test_each_claim_gets_its_own_chat() {
        let links = PendingChatLinks::new(Duration::minutes(10));
        let maria = ClaimRef::new("SPA-001");
        let luca = ClaimRef::new("SPA-002");

        // 後來私訊 bot 的人不會搶走先前的連結
        links
            .record_update(&start_update(111, &format!("/start {}", maria.token)), at(10, 0))
            .await;
        links
            .record_update(&start_update(222, &format!("/start {}", luca.token)), at(10, 1))
            .await;

        assert_eq!(links.take(&maria, at(10, 2)).await, Some(ContactAddress::Telegram(111)));
        assert_eq!(links.take(&luca, at(10, 2)).await, Some(ContactAddress::Telegram(222)));
        assert_eq!(links.take(&maria, at(10, 3)).await, None);
    }

    #[tokio::test]
    async fn test_chat_link_expires() {
        let links = PendingChatLinks::new(Duration::minutes(10));
        let claim = ClaimRef::new("SPA-001");
        links.link(claim.token, 100, at(10, 0)).await;

        assert_eq!(links.take(&claim, at(10, 20)).await, None);
    }

    #[tokio::test]
    async fn test_record_update_ignores_updates_without_token() {
        let links = PendingChatLinks::new(Duration::minutes(10));
        assert_eq!(
            links.record_update(&serde_json::json!({"update_id": 9}), at(10, 0)).await,
            None
        );
        assert_eq!(links.record_update(&start_update(5, "/start"), at(10, 0)).await, None);
    }
}
