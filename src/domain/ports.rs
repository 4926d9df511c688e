use crate::domain::model::{
    ClaimRef, ContactAddress, Guest, GuestId, Notification, PromoCode, Reservation,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimResult {
    Claimed,
    AlreadyRedeemed(GuestId),
    /// 另一個呼叫端持有尚未過期的 claim
    Pending,
    NotFound,
}

/// 優惠碼的持久化。`claim_code` 與 `bind_code` 必須是單一條件式更新，
/// 不可拆成「先讀再寫」。
pub trait PromoCodeStore: Send + Sync {
    fn find_code(&self, code: &str)
        -> impl std::future::Future<Output = Result<Option<PromoCode>>> + Send;

    /// 已存在時回傳 `false`
    fn insert_code(&self, code: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// 未兌換、或 claim 早於 `stale_before` 的碼改由 `claim` 持有
    fn claim_code(
        &self,
        claim: &ClaimRef,
        now: NaiveDateTime,
        stale_before: NaiveDateTime,
    ) -> impl std::future::Future<Output = Result<ClaimResult>> + Send;

    /// `claim` 仍持有此碼時才綁定 `guest_id`
    fn bind_code(
        &self,
        claim: &ClaimRef,
        guest_id: GuestId,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait GuestStore: Send + Sync {
    fn find_guest(&self, id: GuestId)
        -> impl std::future::Future<Output = Result<Option<Guest>>> + Send;

    fn find_guest_by_contact(
        &self,
        contact: &ContactAddress,
    ) -> impl std::future::Future<Output = Result<Option<Guest>>> + Send;

    /// 聯絡方式唯一；衝突時回傳既有的訪客
    fn create_guest(&self, guest: Guest) -> impl std::future::Future<Output = Result<Guest>> + Send;

    /// 只在訪客還沒有任何預約時改名，檢查與寫入不可分開
    fn rename_guest_if_unbooked(
        &self,
        id: GuestId,
        display_name: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait ReservationStore: Send + Sync {
    fn reservations_on(
        &self,
        date: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<Reservation>>> + Send;

    /// 兩端都包含
    fn reservations_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl std::future::Future<Output = Result<Vec<Reservation>>> + Send;

    fn reservations_for_guest(
        &self,
        guest_id: GuestId,
    ) -> impl std::future::Future<Output = Result<Vec<Reservation>>> + Send;

    /// 原子性的「檢查重疊 + 寫入」。有重疊時回傳 `false`，不寫入。
    fn insert_reservation_if_free(
        &self,
        reservation: &Reservation,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

pub trait CampaignStore: PromoCodeStore + GuestStore + ReservationStore {}

impl<T: PromoCodeStore + GuestStore + ReservationStore> CampaignStore for T {}

/// 活動所在地的牆上時間
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}
