// Adapters layer: concrete implementations of the domain ports (storage, clock, notification channels).

pub mod clock;
pub mod memory;
pub mod outbox;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod router;
#[cfg(feature = "smtp")]
pub mod smtp;
pub mod telegram;

pub use clock::{FixedClock, SystemClock};
pub use memory::MemoryStore;
pub use outbox::{LogDispatcher, MemoryOutbox};
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use router::{build_dispatcher, ChannelRouter};
#[cfg(feature = "smtp")]
pub use smtp::{SmtpDispatcher, SmtpSettings};
pub use telegram::{
    chat_id_from_update, deep_link, start_token_from_update, PendingChatLinks, TelegramDispatcher,
};
