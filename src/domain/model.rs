use crate::utils::error::{PromoError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuestId(pub Uuid);

impl GuestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GuestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for GuestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 訪客的聯絡方式：e-mail 或 Telegram chat id。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContactAddress {
    Email(String),
    Telegram(i64),
}

impl ContactAddress {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if let Ok(chat_id) = trimmed.parse::<i64>() {
            return Ok(ContactAddress::Telegram(chat_id));
        }

        // 只做最基本的檢查，真正的投遞由通知通道負責
        match trimmed.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
                Ok(ContactAddress::Email(trimmed.to_lowercase()))
            }
            _ => Err(PromoError::InvalidContact {
                value: raw.to_string(),
            }),
        }
    }

    pub fn channel_name(&self) -> &'static str {
        match self {
            ContactAddress::Email(_) => "email",
            ContactAddress::Telegram(_) => "telegram",
        }
    }
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactAddress::Email(address) => f.write_str(address),
            ContactAddress::Telegram(chat_id) => write!(f, "{}", chat_id),
        }
    }
}

impl TryFrom<String> for ContactAddress {
    type Error = PromoError;

    fn try_from(value: String) -> Result<Self> {
        ContactAddress::parse(&value)
    }
}

impl From<ContactAddress> for String {
    fn from(value: ContactAddress) -> Self {
        value.to_string()
    }
}

/// `redeem` 交給呼叫端的憑證，之後用來完成身分登記。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimRef {
    pub code: String,
    pub token: Uuid,
}

impl ClaimRef {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            token: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CodeStatus {
    Unredeemed,
    AwaitingIdentity {
        claim: ClaimRef,
        claimed_at: NaiveDateTime,
    },
    Redeemed {
        guest_id: GuestId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub status: CodeStatus,
}

impl PromoCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status: CodeStatus::Unredeemed,
        }
    }

    pub fn redeemed(&self) -> bool {
        self.bound_guest_id().is_some()
    }

    pub fn bound_guest_id(&self) -> Option<GuestId> {
        match &self.status {
            CodeStatus::Redeemed { guest_id } => Some(*guest_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub display_name: String,
    pub contact: ContactAddress,
    pub created_at: NaiveDateTime,
}

/// 半開區間 `[start, end)`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBlock {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeBlock {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// 端點相接不算重疊
    pub fn overlaps(&self, other: &TimeBlock) -> bool {
        other.start < self.end && other.end > self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for TimeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub guest_id: GuestId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub service_label: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Reservation {
    pub fn block(&self) -> TimeBlock {
        TimeBlock::new(self.start, self.end)
    }

    pub fn conflicts_with(&self, date: NaiveDate, block: &TimeBlock) -> bool {
        self.date == date && self.block().overlaps(block)
    }
}

/// 活動期間與每日營業時段，啟動後唯讀。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_open: NaiveTime,
    pub daily_close: NaiveTime,
    pub block_duration: Duration,
    pub min_lead_time: Option<Duration>,
}

impl PromotionWindow {
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn within_hours(&self, block: &TimeBlock) -> bool {
        block.start >= self.daily_open && block.end <= self.daily_close
    }

    /// 不足一個時段長度的尾段不產生，也不跨越午夜。
    pub fn blocks_for(&self, date: NaiveDate) -> Vec<TimeBlock> {
        let mut blocks = Vec::new();
        if !self.contains_date(date) || self.block_duration <= Duration::zero() {
            return blocks;
        }

        let mut cursor = self.daily_open;
        loop {
            let (end, wrapped_secs) = cursor.overflowing_add_signed(self.block_duration);
            if wrapped_secs != 0 || end > self.daily_close {
                break;
            }
            blocks.push(TimeBlock::new(cursor, end));
            cursor = end;
        }
        blocks
    }

    /// 從 `from`（不早於活動開始）到活動結束的每一天
    pub fn dates_from(&self, from: NaiveDate) -> impl Iterator<Item = NaiveDate> + '_ {
        let first = from.max(self.start_date);
        first.iter_days().take_while(move |d| *d <= self.end_date)
    }

    pub fn meets_lead_time(&self, date: NaiveDate, start: NaiveTime, now: NaiveDateTime) -> bool {
        match self.min_lead_time {
            Some(lead) => date.and_time(start) - now >= lead,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PromoRedeemed,
    GrandPrizeRedeemed,
    ReservationCreated,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::PromoRedeemed => "promo_redeemed",
            EventKind::GrandPrizeRedeemed => "grand_prize_redeemed",
            EventKind::ReservationCreated => "reservation_created",
        };
        f.write_str(name)
    }
}

/// 交給外部通知通道的訊息，已套用模板。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub event: EventKind,
    pub recipient: ContactAddress,
    pub message: String,
}
