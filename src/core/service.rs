use crate::core::{
    Availability, BookOutcome, BookingRejection, CampaignStore, ClaimRef, Clock, ContactAddress,
    EventPublisher, FinalizeOutcome, GuestId, MessageTemplates, NotificationDispatcher,
    PromoCodeRegistry, PromotionWindow, RedeemOutcome, RedemptionStateMachine, Reservation,
    ReservationLedger, Result, SlotAvailabilityEngine, TimeBlock,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::sync::Arc;

/// 啟動時組裝好的活動設定，之後唯讀。
#[derive(Debug, Clone)]
pub struct CampaignSettings {
    pub window: PromotionWindow,
    pub claim_ttl: Duration,
    pub grand_prize_codes: Vec<String>,
    pub templates: MessageTemplates,
    pub owner_contact: Option<ContactAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub guest_id: GuestId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub service_label: Option<String>,
}

/// 對外 (例如 web 層) 的入口：兌換、登記身分、查空檔、預約。
pub struct CampaignService<S: CampaignStore> {
    store: Arc<S>,
    redemption: RedemptionStateMachine<S>,
    engine: Arc<SlotAvailabilityEngine<S>>,
    ledger: ReservationLedger<S>,
}

impl<S: CampaignStore> CampaignService<S> {
    pub fn new(
        store: Arc<S>,
        settings: CampaignSettings,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let publisher = Arc::new(EventPublisher::new(
            dispatcher,
            settings.templates,
            settings.owner_contact,
        ));

        let registry = PromoCodeRegistry::new(store.clone(), clock.clone(), settings.claim_ttl);
        let redemption = RedemptionStateMachine::new(
            registry,
            store.clone(),
            clock.clone(),
            publisher.clone(),
            settings.grand_prize_codes,
        );
        let engine = Arc::new(SlotAvailabilityEngine::new(
            store.clone(),
            settings.window,
            clock.clone(),
        ));
        let ledger = ReservationLedger::new(store.clone(), engine.clone(), clock, publisher);

        Self {
            store,
            redemption,
            engine,
            ledger,
        }
    }

    pub fn registry(&self) -> &PromoCodeRegistry<S> {
        self.redemption.registry()
    }

    pub fn availability_engine(&self) -> &SlotAvailabilityEngine<S> {
        &self.engine
    }

    pub async fn redeem(&self, code: &str) -> Result<RedeemOutcome> {
        self.redemption.redeem(code).await
    }

    pub async fn finalize_identity(
        &self,
        claim: &ClaimRef,
        name: &str,
        contact: &str,
    ) -> Result<FinalizeOutcome> {
        self.redemption.finalize_identity(claim, name, contact).await
    }

    pub async fn redeem_with_identity(
        &self,
        code: &str,
        name: &str,
        contact: &str,
    ) -> Result<RedeemOutcome> {
        self.redemption
            .redeem_with_identity(code, name, contact)
            .await
    }

    /// 訪客不存在時回傳 `None`
    pub async fn list_availability(
        &self,
        guest_id: GuestId,
        from: NaiveDate,
    ) -> Result<Option<Availability>> {
        if self.store.find_guest(guest_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.engine.availability_from(from).await?))
    }

    pub async fn book(&self, request: BookingRequest) -> Result<BookOutcome> {
        let Some(guest) = self.store.find_guest(request.guest_id).await? else {
            return Ok(rejected(BookingRejection::UnknownGuest));
        };

        let block = TimeBlock::new(request.start, request.end);
        if let Err(reason) = self.engine.validate(request.date, &block) {
            tracing::info!("🚫 Booking on {} {} rejected: {}", request.date, block, reason);
            return Ok(rejected(reason));
        }

        // 提案階段的檢查；提交時還會在同一個交易裡再檢查一次
        if !self.engine.is_free(request.date, &block).await? {
            tracing::info!("🚫 Slot {} on {} is already taken", block, request.date);
            return Ok(rejected(BookingRejection::SlotConflict));
        }

        self.ledger
            .commit(&guest, request.date, block, request.service_label)
            .await
    }

    pub async fn reservations_for(&self, guest_id: GuestId) -> Result<Vec<Reservation>> {
        self.store.reservations_for_guest(guest_id).await
    }
}

fn rejected(reason: BookingRejection) -> BookOutcome {
    BookOutcome::Rejected { reason }
}
