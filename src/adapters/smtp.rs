//! 透過 Lettre 以 SMTP 寄送通知。

use crate::core::{ContactAddress, EventKind, Notification, NotificationDispatcher, Result};
use crate::utils::error::PromoError;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpDispatcher {
    pub fn new(settings: SmtpSettings) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)
            .map_err(|e| PromoError::notification("email", format!("SMTP relay error: {e}")))?
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .build();

        let from = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse::<Mailbox>()
            .map_err(|e| PromoError::InvalidConfigValueError {
                field: "notifications.email.from_email".to_string(),
                value: settings.from_email.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self { transport, from })
    }
}

fn subject_for(event: EventKind) -> &'static str {
    match event {
        EventKind::PromoRedeemed => "Registrazione completata",
        EventKind::GrandPrizeRedeemed => "Hai vinto il premio speciale!",
        EventKind::ReservationCreated => "Prenotazione confermata",
    }
}

#[async_trait]
impl NotificationDispatcher for SmtpDispatcher {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let ContactAddress::Email(address) = &notification.recipient else {
            return Err(PromoError::notification(
                "email",
                format!("{} is not an e-mail address", notification.recipient),
            ));
        };

        let to = address
            .parse::<Mailbox>()
            .map_err(|e| PromoError::notification("email", format!("bad recipient: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject_for(notification.event))
            .header(ContentType::TEXT_PLAIN)
            .body(notification.message.clone())
            .map_err(|e| PromoError::notification("email", format!("build error: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| PromoError::notification("email", format!("SMTP send error: {e}")))?;
        Ok(())
    }
}
