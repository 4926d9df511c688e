use crate::core::{
    ClaimRef, ClaimResult, ContactAddress, Guest, GuestId, GuestStore, PromoCode, PromoCodeStore,
    Reservation, ReservationStore, Result,
};
use crate::domain::model::CodeStatus;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    codes: HashMap<String, PromoCode>,
    guests: HashMap<GuestId, Guest>,
    guests_by_contact: HashMap<ContactAddress, GuestId>,
    reservations: BTreeMap<NaiveDate, Vec<Reservation>>,
}

/// 單一行程內的儲存實作。
///
/// 所有寫入都在同一把鎖底下完成，等同一個可序列化的交易；
/// 只適合單一實例部署與測試，多實例請用 Postgres。
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reservation_count(&self) -> usize {
        let state = self.state.lock().await;
        state.reservations.values().map(Vec::len).sum()
    }
}

impl PromoCodeStore for MemoryStore {
    async fn find_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let state = self.state.lock().await;
        Ok(state.codes.get(code).cloned())
    }

    async fn insert_code(&self, code: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.codes.contains_key(code) {
            return Ok(false);
        }
        state.codes.insert(code.to_string(), PromoCode::new(code));
        Ok(true)
    }

    async fn claim_code(
        &self,
        claim: &ClaimRef,
        now: NaiveDateTime,
        stale_before: NaiveDateTime,
    ) -> Result<ClaimResult> {
        let mut state = self.state.lock().await;
        let Some(promo) = state.codes.get_mut(&claim.code) else {
            return Ok(ClaimResult::NotFound);
        };

        let claimable = match &promo.status {
            CodeStatus::Unredeemed => true,
            CodeStatus::AwaitingIdentity { claimed_at, .. } => *claimed_at < stale_before,
            CodeStatus::Redeemed { guest_id } => {
                return Ok(ClaimResult::AlreadyRedeemed(*guest_id));
            }
        };

        if !claimable {
            return Ok(ClaimResult::Pending);
        }

        promo.status = CodeStatus::AwaitingIdentity {
            claim: claim.clone(),
            claimed_at: now,
        };
        Ok(ClaimResult::Claimed)
    }

    async fn bind_code(&self, claim: &ClaimRef, guest_id: GuestId) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(promo) = state.codes.get_mut(&claim.code) else {
            return Ok(false);
        };

        match &promo.status {
            CodeStatus::AwaitingIdentity { claim: held, .. } if held.token == claim.token => {
                promo.status = CodeStatus::Redeemed { guest_id };
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl GuestStore for MemoryStore {
    async fn find_guest(&self, id: GuestId) -> Result<Option<Guest>> {
        let state = self.state.lock().await;
        Ok(state.guests.get(&id).cloned())
    }

    async fn find_guest_by_contact(&self, contact: &ContactAddress) -> Result<Option<Guest>> {
        let state = self.state.lock().await;
        Ok(state
            .guests_by_contact
            .get(contact)
            .and_then(|id| state.guests.get(id))
            .cloned())
    }

    async fn create_guest(&self, guest: Guest) -> Result<Guest> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .guests_by_contact
            .get(&guest.contact)
            .and_then(|id| state.guests.get(id))
        {
            return Ok(existing.clone());
        }

        state.guests_by_contact.insert(guest.contact.clone(), guest.id);
        state.guests.insert(guest.id, guest.clone());
        Ok(guest)
    }

    async fn rename_guest_if_unbooked(&self, id: GuestId, display_name: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let booked = state
            .reservations
            .values()
            .flatten()
            .any(|r| r.guest_id == id);
        if booked {
            return Ok(false);
        }
        match state.guests.get_mut(&id) {
            Some(guest) => {
                guest.display_name = display_name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl ReservationStore for MemoryStore {
    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>> {
        let state = self.state.lock().await;
        Ok(state.reservations.get(&date).cloned().unwrap_or_default())
    }

    async fn reservations_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Reservation>> {
        if from > to {
            return Ok(Vec::new());
        }
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .range(from..=to)
            .flat_map(|(_, day)| day.iter().cloned())
            .collect())
    }

    async fn reservations_for_guest(&self, guest_id: GuestId) -> Result<Vec<Reservation>> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .flatten()
            .filter(|r| r.guest_id == guest_id)
            .cloned()
            .collect())
    }

    async fn insert_reservation_if_free(&self, reservation: &Reservation) -> Result<bool> {
        let mut state = self.state.lock().await;
        let block = reservation.block();
        let day = state.reservations.entry(reservation.date).or_default();

        if day.iter().any(|existing| existing.block().overlaps(&block)) {
            tracing::debug!(
                "Overlap on {} for {}, insert refused",
                reservation.date,
                block
            );
            return Ok(false);
        }

        day.push(reservation.clone());
        day.sort_by_key(|r| r.start);
        Ok(true)
    }
}
