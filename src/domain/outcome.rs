use crate::domain::model::{ClaimRef, GuestId, Reservation, TimeBlock};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// 不影響交易結果、但要讓呼叫端知道的狀況。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    NotificationDeliveryFailed { recipient: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedeemOutcome {
    AwaitingIdentity { claim: ClaimRef },
    Redeemed { guest_id: GuestId, warnings: Vec<Warning> },
    InvalidCode,
    /// 另一個呼叫端持有未過期的 claim 時 `guest_id` 為 `None`
    AlreadyRedeemed { guest_id: Option<GuestId> },
    InvalidIdentity { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    Redeemed { guest_id: GuestId, warnings: Vec<Warning> },
    InvalidCode,
    InvalidIdentity { reason: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingRejection {
    #[error("Unknown guest")]
    UnknownGuest,
    #[error("The end of the slot must come after its start")]
    InvalidInterval,
    #[error("The requested date is outside the promotion period")]
    OutOfWindow,
    #[error("The requested time is outside opening hours")]
    OutsideHours,
    #[error("The requested slot starts too soon")]
    TooSoon,
    #[error("The requested slot is already booked")]
    SlotConflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookOutcome {
    Booked {
        reservation: Reservation,
        warnings: Vec<Warning>,
    },
    Rejected { reason: BookingRejection },
}

impl BookOutcome {
    pub fn rejection(&self) -> Option<BookingRejection> {
        match self {
            BookOutcome::Rejected { reason } => Some(*reason),
            BookOutcome::Booked { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub blocks: Vec<TimeBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub first_available_date: Option<NaiveDate>,
    pub days: Vec<DayAvailability>,
}
