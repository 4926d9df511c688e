use crate::core::{
    ContactAddress, EventKind, Guest, Notification, NotificationDispatcher, Reservation, Warning,
};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// 通知訊息模板，支援 `{name}`、`{code}`、`{date}`、`{start}`、`{end}`、`{service}`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplates {
    pub promo_redeemed_guest: String,
    pub promo_redeemed_owner: String,
    pub grand_prize_guest: String,
    pub grand_prize_owner: String,
    pub reservation_guest: String,
    pub reservation_owner: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            promo_redeemed_guest: "Ciao {name}, registrazione completata!".to_string(),
            promo_redeemed_owner: "{name} si è registrato con promo {code}".to_string(),
            grand_prize_guest: "Complimenti {name}! Il codice {code} ha vinto il premio speciale!"
                .to_string(),
            grand_prize_owner: "{name} ha vinto il premio speciale con il codice {code}".to_string(),
            reservation_guest: "Prenotazione confermata: {date} {start}-{end}".to_string(),
            reservation_owner: "{name} ha prenotato: {date} {start}-{end}".to_string(),
        }
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([a-z_]+)\}").ok())
        .as_ref()
}

/// 未知的 placeholder 原樣保留
pub fn render(template: &str, values: &HashMap<&str, String>) -> String {
    let Some(re) = placeholder_regex() else {
        return template.to_string();
    };

    re.replace_all(template, |caps: &Captures| {
        values
            .get(&caps[1])
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// 把業務事件轉成訊息，送給訪客與店家。投遞失敗只產生 `Warning`。
pub struct EventPublisher {
    dispatcher: Arc<dyn NotificationDispatcher>,
    templates: MessageTemplates,
    owner: Option<ContactAddress>,
}

impl EventPublisher {
    pub fn new(
        dispatcher: Arc<dyn NotificationDispatcher>,
        templates: MessageTemplates,
        owner: Option<ContactAddress>,
    ) -> Self {
        Self {
            dispatcher,
            templates,
            owner,
        }
    }

    pub async fn promo_redeemed(&self, guest: &Guest, code: &str, grand_prize: bool) -> Vec<Warning> {
        let mut values = HashMap::new();
        values.insert("name", guest.display_name.clone());
        values.insert("code", code.to_string());

        let (event, guest_template, owner_template) = if grand_prize {
            (
                EventKind::GrandPrizeRedeemed,
                &self.templates.grand_prize_guest,
                &self.templates.grand_prize_owner,
            )
        } else {
            (
                EventKind::PromoRedeemed,
                &self.templates.promo_redeemed_guest,
                &self.templates.promo_redeemed_owner,
            )
        };

        self.publish(event, &guest.contact, guest_template, owner_template, &values)
            .await
    }

    pub async fn reservation_created(&self, guest: &Guest, reservation: &Reservation) -> Vec<Warning> {
        let mut values = HashMap::new();
        values.insert("name", guest.display_name.clone());
        values.insert("date", reservation.date.format("%d/%m/%Y").to_string());
        values.insert("start", reservation.start.format("%H:%M").to_string());
        values.insert("end", reservation.end.format("%H:%M").to_string());
        values.insert(
            "service",
            reservation.service_label.clone().unwrap_or_default(),
        );

        self.publish(
            EventKind::ReservationCreated,
            &guest.contact,
            &self.templates.reservation_guest,
            &self.templates.reservation_owner,
            &values,
        )
        .await
    }

    async fn publish(
        &self,
        event: EventKind,
        guest_contact: &ContactAddress,
        guest_template: &str,
        owner_template: &str,
        values: &HashMap<&str, String>,
    ) -> Vec<Warning> {
        let mut warnings = Vec::new();

        let guest_message = Notification {
            event,
            recipient: guest_contact.clone(),
            message: render(guest_template, values),
        };
        warnings.extend(self.deliver(&guest_message).await);

        if let Some(owner) = &self.owner {
            let owner_message = Notification {
                event,
                recipient: owner.clone(),
                message: render(owner_template, values),
            };
            warnings.extend(self.deliver(&owner_message).await);
        }

        warnings
    }

    async fn deliver(&self, notification: &Notification) -> Option<Warning> {
        match self.dispatcher.notify(notification).await {
            Ok(()) => {
                tracing::debug!(
                    "📨 {} delivered to {}",
                    notification.event,
                    notification.recipient
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ {} could not be delivered to {}: {}",
                    notification.event,
                    notification.recipient,
                    e
                );
                Some(Warning::NotificationDeliveryFailed {
                    recipient: notification.recipient.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}
