pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{FixedClock, MemoryStore, SystemClock};
pub use crate::config::CampaignConfig;
pub use crate::core::{BookingRequest, CampaignService, CampaignSettings};
pub use crate::utils::error::{PromoError, Result};
