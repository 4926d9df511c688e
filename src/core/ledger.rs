use crate::core::{
    BookOutcome, BookingRejection, Clock, EventPublisher, Guest, Reservation, ReservationId,
    ReservationStore, Result, SlotAvailabilityEngine, TimeBlock,
};
use chrono::NaiveDate;
use std::sync::Arc;

/// 預約的唯一寫入者。提交時重新驗證，重疊檢查與寫入由儲存層一次完成。
pub struct ReservationLedger<S: ReservationStore> {
    store: Arc<S>,
    engine: Arc<SlotAvailabilityEngine<S>>,
    clock: Arc<dyn Clock>,
    publisher: Arc<EventPublisher>,
}

impl<S: ReservationStore> ReservationLedger<S> {
    pub fn new(
        store: Arc<S>,
        engine: Arc<SlotAvailabilityEngine<S>>,
        clock: Arc<dyn Clock>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            store,
            engine,
            clock,
            publisher,
        }
    }

    pub async fn commit(
        &self,
        guest: &Guest,
        date: NaiveDate,
        block: TimeBlock,
        service_label: Option<String>,
    ) -> Result<BookOutcome> {
        if let Err(reason) = self.engine.validate(date, &block) {
            return Ok(BookOutcome::Rejected { reason });
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            guest_id: guest.id,
            date,
            start: block.start,
            end: block.end,
            service_label,
            created_at: self.clock.now(),
        };

        if !self.store.insert_reservation_if_free(&reservation).await? {
            tracing::warn!(
                "⛔ Slot {} on {} lost to a concurrent booking",
                block,
                date
            );
            return Ok(BookOutcome::Rejected {
                reason: BookingRejection::SlotConflict,
            });
        }

        tracing::info!(
            "✅ Reservation {} committed for guest {} on {} {}",
            reservation.id,
            guest.id,
            date,
            block
        );

        let warnings = self.publisher.reservation_created(guest, &reservation).await;
        Ok(BookOutcome::Booked {
            reservation,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FixedClock, MemoryOutbox, MemoryStore};
    use crate::core::{ContactAddress, GuestId, MessageTemplates, PromotionWindow};
    use chrono::{Duration, NaiveTime};

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn ledger(store: Arc<MemoryStore>) -> ReservationLedger<MemoryStore> {
        let now = NaiveDate::from_ymd_opt(2025, 12, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let window = PromotionWindow {
            start_date: NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            daily_open: time(11, 0),
            daily_close: time(23, 59),
            block_duration: Duration::hours(2),
            min_lead_time: None,
        };
        let engine = Arc::new(SlotAvailabilityEngine::new(store.clone(), window, clock.clone()));
        let publisher = Arc::new(EventPublisher::new(
            Arc::new(MemoryOutbox::new()),
            MessageTemplates::default(),
            None,
        ));
        ReservationLedger::new(store, engine, clock, publisher)
    }

    fn guest() -> Guest {
        Guest {
            id: GuestId::new(),
            display_name: "Anna".to_string(),
            contact: ContactAddress::Telegram(7),
            created_at: NaiveDate::from_ymd_opt(2025, 12, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_commit_revalidates_request() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store.clone());

        let outcome = ledger
            .commit(
                &guest(),
                NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                TimeBlock::new(time(11, 0), time(13, 0)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.rejection(), Some(BookingRejection::OutOfWindow));
        assert_eq!(store.reservation_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_detects_overlap_without_proposal_check() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store.clone());
        let guest = guest();
        let day = NaiveDate::from_ymd_opt(2025, 12, 24).unwrap();

        let first = ledger
            .commit(&guest, day, TimeBlock::new(time(12, 0), time(14, 0)), None)
            .await
            .unwrap();
        assert_eq!(first.rejection(), None);

        let second = ledger
            .commit(&guest, day, TimeBlock::new(time(13, 59), time(15, 0)), None)
            .await
            .unwrap();
        assert_eq!(second.rejection(), Some(BookingRejection::SlotConflict));
        assert_eq!(store.reservation_count().await, 1);
    }
}
