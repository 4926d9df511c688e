use crate::core::{
    Availability, BookingRejection, Clock, DayAvailability, PromotionWindow, Reservation,
    ReservationStore, Result, TimeBlock,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 計算活動期間內可預約的時段，並檢查與既有預約是否重疊。
///
/// 這裡的檢查只用於顯示與提案；真正的裁決在 `ReservationLedger::commit`。
pub struct SlotAvailabilityEngine<S: ReservationStore> {
    store: Arc<S>,
    window: PromotionWindow,
    clock: Arc<dyn Clock>,
}

impl<S: ReservationStore> SlotAvailabilityEngine<S> {
    pub fn new(store: Arc<S>, window: PromotionWindow, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            window,
            clock,
        }
    }

    pub fn window(&self) -> &PromotionWindow {
        &self.window
    }

    pub fn generate_blocks(&self, date: NaiveDate) -> Vec<TimeBlock> {
        self.window.blocks_for(date)
    }

    pub async fn is_free(&self, date: NaiveDate, block: &TimeBlock) -> Result<bool> {
        let existing = self.store.reservations_on(date).await?;
        Ok(!existing.iter().any(|r| r.block().overlaps(block)))
    }

    /// 未被預約、且（有設定時）符合最短提前時間的時段
    pub async fn free_blocks(&self, date: NaiveDate) -> Result<Vec<TimeBlock>> {
        let existing = self.store.reservations_on(date).await?;
        Ok(self.bookable_blocks(date, &existing, self.clock.now()))
    }

    pub async fn first_available_date(&self, from: NaiveDate) -> Result<Option<NaiveDate>> {
        Ok(self.availability_from(from).await?.first_available_date)
    }

    /// 一次讀取整段期間的預約，逐日計算空檔
    pub async fn availability_from(&self, from: NaiveDate) -> Result<Availability> {
        let first = from.max(self.window.start_date);
        if first > self.window.end_date {
            return Ok(Availability {
                first_available_date: None,
                days: Vec::new(),
            });
        }

        let mut by_date: BTreeMap<NaiveDate, Vec<Reservation>> = BTreeMap::new();
        for reservation in self
            .store
            .reservations_between(first, self.window.end_date)
            .await?
        {
            by_date.entry(reservation.date).or_default().push(reservation);
        }

        let now = self.clock.now();
        let days: Vec<DayAvailability> = self
            .window
            .dates_from(first)
            .map(|date| {
                let existing = by_date.get(&date).map(Vec::as_slice).unwrap_or(&[]);
                DayAvailability {
                    date,
                    blocks: self.bookable_blocks(date, existing, now),
                }
            })
            .collect();

        let first_available_date = days
            .iter()
            .find(|day| !day.blocks.is_empty())
            .map(|day| day.date);

        Ok(Availability {
            first_available_date,
            days,
        })
    }

    /// 依序檢查：區間、日期、營業時間、提前量
    pub fn validate(&self, date: NaiveDate, block: &TimeBlock) -> std::result::Result<(), BookingRejection> {
        if block.is_empty() {
            return Err(BookingRejection::InvalidInterval);
        }
        if !self.window.contains_date(date) {
            return Err(BookingRejection::OutOfWindow);
        }
        if !self.window.within_hours(block) {
            return Err(BookingRejection::OutsideHours);
        }
        if !self
            .window
            .meets_lead_time(date, block.start, self.clock.now())
        {
            return Err(BookingRejection::TooSoon);
        }
        Ok(())
    }

    fn bookable_blocks(
        &self,
        date: NaiveDate,
        existing: &[Reservation],
        now: NaiveDateTime,
    ) -> Vec<TimeBlock> {
        self.window
            .blocks_for(date)
            .into_iter()
            .filter(|block| !existing.iter().any(|r| r.block().overlaps(block)))
            .filter(|block| self.window.meets_lead_time(date, block.start, now))
            .collect()
    }
}
