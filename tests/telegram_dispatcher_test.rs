use httpmock::prelude::*;
use promo_booking::adapters::{ChannelRouter, LogDispatcher, TelegramDispatcher};
use promo_booking::core::{ContactAddress, EventKind, Notification, NotificationDispatcher};
use std::sync::Arc;

fn notification(recipient: ContactAddress) -> Notification {
    Notification {
        event: EventKind::ReservationCreated,
        recipient,
        message: "Prenotazione confermata: 24/12/2025 15:00-17:00".to_string(),
    }
}

#[tokio::test]
async fn test_send_message_posts_chat_and_text() {
    let server = MockServer::start_async().await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .json_body(serde_json::json!({
                    "chat_id": 4242,
                    "text": "Prenotazione confermata: 24/12/2025 15:00-17:00"
                }));
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"ok": true, "result": {"message_id": 1}}));
        })
        .await;

    let dispatcher = TelegramDispatcher::new(&server.base_url(), "test-token", 5).unwrap();
    dispatcher
        .notify(&notification(ContactAddress::Telegram(4242)))
        .await
        .unwrap();

    send_mock.assert_async().await;
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start_async().await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/botbad-token/sendMessage");
            then.status(401)
                .json_body(serde_json::json!({"ok": false, "description": "Unauthorized"}));
        })
        .await;

    let dispatcher = TelegramDispatcher::new(&server.base_url(), "bad-token", 5).unwrap();
    let err = dispatcher
        .notify(&notification(ContactAddress::Telegram(4242)))
        .await
        .unwrap_err();

    send_mock.assert_async().await;
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_email_recipient_is_not_sent_over_telegram() {
    let server = MockServer::start_async().await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let dispatcher = TelegramDispatcher::new(&server.base_url(), "test-token", 5).unwrap();
    let result = dispatcher
        .notify(&notification(ContactAddress::Email("maria@example.it".to_string())))
        .await;

    assert!(result.is_err());
    send_mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_router_sends_telegram_and_logs_the_rest() {
    let server = MockServer::start_async().await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/bottest-token/sendMessage");
            then.status(200).json_body(serde_json::json!({"ok": true}));
        })
        .await;

    let telegram = TelegramDispatcher::new(&server.base_url(), "test-token", 5).unwrap();
    let router = ChannelRouter::new()
        .with_telegram(Arc::new(telegram))
        .with_fallback(Arc::new(LogDispatcher));

    router
        .notify(&notification(ContactAddress::Telegram(1)))
        .await
        .unwrap();
    router
        .notify(&notification(ContactAddress::Email("owner@example.it".to_string())))
        .await
        .unwrap();

    send_mock.assert_hits_async(1).await;
}
