use crate::core::{
    Claim, ClaimRef, Clock, CodeStatus, ContactAddress, EventPublisher, FinalizeOutcome, Guest,
    GuestId, GuestStore, PromoCode, PromoCodeRegistry, PromoCodeStore, RedeemOutcome, Result,
};
use std::collections::HashSet;
use std::sync::Arc;

/// `Unredeemed -> AwaitingIdentity -> Redeemed`
///
/// claim 經由 [`PromoCodeRegistry`]，同一個碼最多一個呼叫端持有。
/// `Redeemed` 之後再兌換只會回到已綁定的訪客，不會重新登記。
pub struct RedemptionStateMachine<S>
where
    S: PromoCodeStore + GuestStore,
{
    registry: PromoCodeRegistry<S>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    publisher: Arc<EventPublisher>,
    grand_prize_codes: HashSet<String>,
}

impl<S> RedemptionStateMachine<S>
where
    S: PromoCodeStore + GuestStore,
{
    pub fn new(
        registry: PromoCodeRegistry<S>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        publisher: Arc<EventPublisher>,
        grand_prize_codes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
            publisher,
            grand_prize_codes: grand_prize_codes.into_iter().collect(),
        }
    }

    pub fn registry(&self) -> &PromoCodeRegistry<S> {
        &self.registry
    }

    pub fn is_grand_prize(&self, code: &str) -> bool {
        self.grand_prize_codes.contains(code.trim())
    }

    pub async fn redeem(&self, code: &str) -> Result<RedeemOutcome> {
        let outcome = match self.registry.claim(code).await? {
            Claim::Claimed(claim) => RedeemOutcome::AwaitingIdentity { claim },
            Claim::AlreadyRedeemed(guest_id) => RedeemOutcome::AlreadyRedeemed { guest_id },
            Claim::NotFound => RedeemOutcome::InvalidCode,
        };

        match &outcome {
            RedeemOutcome::InvalidCode => tracing::info!("❌ Invalid promo code submitted"),
            RedeemOutcome::AlreadyRedeemed { guest_id: Some(guest_id) } => {
                tracing::info!("🔁 Code already redeemed by guest {}", guest_id)
            }
            _ => {}
        }
        Ok(outcome)
    }

    pub async fn finalize_identity(
        &self,
        claim: &ClaimRef,
        name: &str,
        contact: &str,
    ) -> Result<FinalizeOutcome> {
        let (name, contact) = match parse_identity(name, contact) {
            Ok(identity) => identity,
            Err(reason) => return Ok(FinalizeOutcome::InvalidIdentity { reason }),
        };

        // 快速檢查；真正的保證在 bind_code 的條件式更新
        let holds_claim = match self.registry.lookup(&claim.code).await? {
            Some(PromoCode {
                status: CodeStatus::AwaitingIdentity { claim: held, .. },
                ..
            }) => held.token == claim.token,
            _ => false,
        };
        if !holds_claim {
            return Ok(FinalizeOutcome::InvalidCode);
        }

        // 訪客先於綁定建立：碼只會綁到已存在的訪客。
        // 預檢之後才輸掉 claim 時，新訪客會留下但沒有碼，之後同聯絡方式會重用他
        let guest = self.guest_for(&name, contact).await?;
        if !self.registry.bind(claim, guest.id).await? {
            tracing::warn!("⚠️ Claim on {} was lost before it could be bound", claim.code);
            return Ok(FinalizeOutcome::InvalidCode);
        }

        let grand_prize = self.is_grand_prize(&claim.code);
        tracing::info!(
            "🎉 Code {} redeemed by guest {}{}",
            claim.code,
            guest.id,
            if grand_prize { " (grand prize)" } else { "" }
        );

        let warnings = self
            .publisher
            .promo_redeemed(&guest, &claim.code, grand_prize)
            .await;
        Ok(FinalizeOutcome::Redeemed {
            guest_id: guest.id,
            warnings,
        })
    }

    /// 一次送出優惠碼與身分資料的註冊表單
    pub async fn redeem_with_identity(
        &self,
        code: &str,
        name: &str,
        contact: &str,
    ) -> Result<RedeemOutcome> {
        if let Err(reason) = parse_identity(name, contact) {
            return Ok(RedeemOutcome::InvalidIdentity { reason });
        }

        let claim = match self.redeem(code).await? {
            RedeemOutcome::AwaitingIdentity { claim } => claim,
            other => return Ok(other),
        };

        Ok(match self.finalize_identity(&claim, name, contact).await? {
            FinalizeOutcome::Redeemed { guest_id, warnings } => {
                RedeemOutcome::Redeemed { guest_id, warnings }
            }
            FinalizeOutcome::InvalidCode => RedeemOutcome::InvalidCode,
            FinalizeOutcome::InvalidIdentity { reason } => RedeemOutcome::InvalidIdentity { reason },
        })
    }

    /// 依聯絡方式重用既有訪客；尚未預約前允許改名
    async fn guest_for(&self, name: &str, contact: ContactAddress) -> Result<Guest> {
        if let Some(mut existing) = self.store.find_guest_by_contact(&contact).await? {
            if existing.display_name != name
                && self.store.rename_guest_if_unbooked(existing.id, name).await?
            {
                existing.display_name = name.to_string();
            }
            return Ok(existing);
        }

        let guest = Guest {
            id: GuestId::new(),
            display_name: name.to_string(),
            contact,
            created_at: self.clock.now(),
        };
        let stored = self.store.create_guest(guest).await?;
        tracing::debug!("👤 Guest {} registered", stored.id);
        Ok(stored)
    }
}

fn parse_identity(name: &str, contact: &str) -> std::result::Result<(String, ContactAddress), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    let contact = ContactAddress::parse(contact).map_err(|e| e.user_friendly_message())?;
    Ok((name.to_string(), contact))
}
