pub mod availability;
pub mod ledger;
pub mod notify;
pub mod redemption;
pub mod registry;
pub mod service;

pub use crate::domain::model::{
    ClaimRef, CodeStatus, ContactAddress, EventKind, Guest, GuestId, Notification, PromoCode,
    PromotionWindow, Reservation, ReservationId, TimeBlock,
};
pub use crate::domain::outcome::{
    Availability, BookOutcome, BookingRejection, DayAvailability, FinalizeOutcome, RedeemOutcome,
    Warning,
};
pub use crate::domain::ports::{
    CampaignStore, ClaimResult, Clock, GuestStore, NotificationDispatcher, PromoCodeStore,
    ReservationStore,
};
pub use crate::utils::error::Result;

pub use availability::SlotAvailabilityEngine;
pub use ledger::ReservationLedger;
pub use notify::{EventPublisher, MessageTemplates};
pub use redemption::RedemptionStateMachine;
pub use registry::{Claim, PromoCodeRegistry};
pub use service::{BookingRequest, CampaignService, CampaignSettings};
