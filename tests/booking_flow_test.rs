use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use promo_booking::adapters::{FixedClock, MemoryOutbox, MemoryStore};
use promo_booking::core::{
    BookOutcome, BookingRejection, BookingRequest, CampaignService, CampaignSettings,
    ContactAddress, EventKind, GuestId, MessageTemplates, PromotionWindow, RedeemOutcome,
    ReservationStore, TimeBlock,
};
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn now() -> NaiveDateTime {
    date(2025, 12, 15).and_hms_opt(10, 0, 0).unwrap()
}

fn window(min_lead_time: Option<Duration>) -> PromotionWindow {
    PromotionWindow {
        start_date: date(2025, 12, 20),
        end_date: date(2026, 1, 6),
        daily_open: time(11, 0),
        daily_close: time(23, 59),
        block_duration: Duration::hours(2),
        min_lead_time,
    }
}

struct Fixture {
    service: Arc<CampaignService<MemoryStore>>,
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    outbox: MemoryOutbox,
    guest_id: GuestId,
}

async fn setup_with(min_lead_time: Option<Duration>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(now()));
    let outbox = MemoryOutbox::new();
    let settings = CampaignSettings {
        window: window(min_lead_time),
        claim_ttl: Duration::minutes(10),
        grand_prize_codes: Vec::new(),
        templates: MessageTemplates::default(),
        owner_contact: Some(ContactAddress::Telegram(1000)),
    };
    let service = CampaignService::new(
        store.clone(),
        settings,
        Arc::new(outbox.clone()),
        clock.clone(),
    );
    service.registry().seed(["SPA-001"]).await.unwrap();

    let guest_id = match service
        .redeem_with_identity("SPA-001", "Maria", "4242")
        .await
        .unwrap()
    {
        RedeemOutcome::Redeemed { guest_id, .. } => guest_id,
        other => panic!("expected Redeemed, got {:?}", other),
    };

    Fixture {
        service: Arc::new(service),
        store,
        clock,
        outbox,
        guest_id,
    }
}

async fn setup() -> Fixture {
    setup_with(None).await
}

fn request(guest_id: GuestId, on: NaiveDate, start: NaiveTime, end: NaiveTime) -> BookingRequest {
    BookingRequest {
        guest_id,
        date: on,
        start,
        end,
        service_label: Some("Massaggio".to_string()),
    }
}

#[tokio::test]
async fn test_booking_scenario_over_the_holidays() {
    let f = setup().await;
    let christmas_eve = date(2025, 12, 24);

    // 不要求對齊時段格線
    let booked = f
        .service
        .book(request(f.guest_id, christmas_eve, time(12, 0), time(14, 0)))
        .await
        .unwrap();
    let reservation = match booked {
        BookOutcome::Booked {
            reservation,
            warnings,
        } => {
            assert!(warnings.is_empty());
            reservation
        }
        other => panic!("expected Booked, got {:?}", other),
    };
    assert_eq!(reservation.guest_id, f.guest_id);
    assert_eq!(reservation.block(), TimeBlock::new(time(12, 0), time(14, 0)));

    let overlap = f
        .service
        .book(request(f.guest_id, christmas_eve, time(13, 0), time(15, 0)))
        .await
        .unwrap();
    assert_eq!(overlap.rejection(), Some(BookingRejection::SlotConflict));

    // 端點相接不算重疊
    let adjacent = f
        .service
        .book(request(f.guest_id, christmas_eve, time(14, 0), time(16, 0)))
        .await
        .unwrap();
    assert_eq!(adjacent.rejection(), None);

    let after_window = f
        .service
        .book(request(f.guest_id, date(2026, 1, 7), time(11, 0), time(13, 0)))
        .await
        .unwrap();
    assert_eq!(after_window.rejection(), Some(BookingRejection::OutOfWindow));

    let too_early = f
        .service
        .book(request(f.guest_id, christmas_eve, time(10, 0), time(12, 0)))
        .await
        .unwrap();
    assert_eq!(too_early.rejection(), Some(BookingRejection::OutsideHours));

    let past_close = f
        .service
        .book(request(f.guest_id, christmas_eve, time(23, 0), time(23, 59)))
        .await
        .unwrap();
    assert_eq!(past_close.rejection(), None);

    assert_eq!(f.store.reservation_count().await, 3);
    assert_eq!(
        f.service.reservations_for(f.guest_id).await.unwrap().len(),
        3
    );
}

#[tokio::test]
async fn test_rejections_are_checked_in_order() {
    let f = setup().await;

    let unknown = f
        .service
        .book(request(GuestId::new(), date(2030, 1, 1), time(5, 0), time(4, 0)))
        .await
        .unwrap();
    assert_eq!(unknown.rejection(), Some(BookingRejection::UnknownGuest));

    // 區間本身無效時，先於日期檢查
    let inverted = f
        .service
        .book(request(f.guest_id, date(2030, 1, 1), time(14, 0), time(12, 0)))
        .await
        .unwrap();
    assert_eq!(inverted.rejection(), Some(BookingRejection::InvalidInterval));

    let empty = f
        .service
        .book(request(f.guest_id, date(2025, 12, 24), time(12, 0), time(12, 0)))
        .await
        .unwrap();
    assert_eq!(empty.rejection(), Some(BookingRejection::InvalidInterval));

    let before_window = f
        .service
        .book(request(f.guest_id, date(2025, 12, 19), time(9, 0), time(10, 0)))
        .await
        .unwrap();
    assert_eq!(before_window.rejection(), Some(BookingRejection::OutOfWindow));
}

#[tokio::test]
async fn test_minimum_lead_time() {
    let f = setup_with(Some(Duration::hours(24))).await;
    f.clock.advance(Duration::days(5)); // 2025-12-20 10:00

    let same_day = f
        .service
        .book(request(f.guest_id, date(2025, 12, 20), time(15, 0), time(17, 0)))
        .await
        .unwrap();
    assert_eq!(same_day.rejection(), Some(BookingRejection::TooSoon));

    let next_day = f
        .service
        .book(request(f.guest_id, date(2025, 12, 21), time(11, 0), time(13, 0)))
        .await
        .unwrap();
    assert_eq!(next_day.rejection(), None);

    let availability = f
        .service
        .list_availability(f.guest_id, date(2025, 12, 20))
        .await
        .unwrap()
        .unwrap();
    assert!(availability.days[0].blocks.is_empty());
    assert_eq!(availability.first_available_date, Some(date(2025, 12, 21)));
}

#[tokio::test]
async fn test_availability_lists_every_day_and_hides_taken_blocks() {
    let f = setup().await;
    let first_day = date(2025, 12, 20);

    let availability = f
        .service
        .list_availability(f.guest_id, first_day)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(availability.days.len(), 18);
    assert_eq!(availability.first_available_date, Some(first_day));
    assert_eq!(availability.days[0].blocks.len(), 6);
    assert_eq!(
        availability.days[0].blocks.last(),
        Some(&TimeBlock::new(time(21, 0), time(23, 0)))
    );

    f.service
        .book(request(f.guest_id, first_day, time(11, 0), time(13, 0)))
        .await
        .unwrap();

    let availability = f
        .service
        .list_availability(f.guest_id, first_day)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(availability.days[0].blocks.len(), 5);
    assert!(!availability.days[0]
        .blocks
        .contains(&TimeBlock::new(time(11, 0), time(13, 0))));

    // 從活動開始之前查詢，結果一樣
    let from_earlier = f
        .service
        .list_availability(f.guest_id, date(2025, 12, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(from_earlier, availability);
}

#[tokio::test]
async fn test_fully_booked_day_is_skipped() {
    let f = setup().await;
    let first_day = date(2025, 12, 20);

    f.service
        .book(request(f.guest_id, first_day, time(11, 0), time(23, 59)))
        .await
        .unwrap();

    let availability = f
        .service
        .list_availability(f.guest_id, first_day)
        .await
        .unwrap()
        .unwrap();
    assert!(availability.days[0].blocks.is_empty());
    assert_eq!(availability.first_available_date, Some(date(2025, 12, 21)));
}

#[tokio::test]
async fn test_list_availability_is_idempotent() {
    let f = setup().await;
    let from = date(2025, 12, 22);

    let first = f.service.list_availability(f.guest_id, from).await.unwrap();
    let second = f.service.list_availability(f.guest_id, from).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(f.store.reservation_count().await, 0);
}

#[tokio::test]
async fn test_unknown_guest_sees_no_availability() {
    let f = setup().await;
    assert_eq!(
        f.service
            .list_availability(GuestId::new(), date(2025, 12, 20))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_availability_after_window_is_empty() {
    let f = setup().await;
    let availability = f
        .service
        .list_availability(f.guest_id, date(2026, 2, 1))
        .await
        .unwrap()
        .unwrap();
    assert!(availability.days.is_empty());
    assert_eq!(availability.first_available_date, None);
}

#[tokio::test]
async fn test_booking_notifies_guest_and_owner() {
    let f = setup().await;
    f.service
        .book(request(f.guest_id, date(2025, 12, 24), time(15, 0), time(17, 0)))
        .await
        .unwrap();

    let sent: Vec<_> = f
        .outbox
        .sent()
        .await
        .into_iter()
        .filter(|n| n.event == EventKind::ReservationCreated)
        .collect();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|n| n.recipient == ContactAddress::Telegram(4242)
        && n.message == "Prenotazione confermata: 24/12/2025 15:00-17:00"));
    assert!(sent.iter().any(|n| n.recipient == ContactAddress::Telegram(1000)
        && n.message == "Maria ha prenotato: 24/12/2025 15:00-17:00"));
}

#[tokio::test]
async fn test_concurrent_overlapping_bookings_have_single_winner() {
    let f = setup().await;
    let on = date(2025, 12, 27);

    let mut handles = Vec::new();
    for i in 0..12u32 {
        let service = f.service.clone();
        let guest_id = f.guest_id;
        // 起點錯開但彼此重疊
        let start = time(15, i * 5);
        let end = time(17, i * 5);
        handles.push(tokio::spawn(async move {
            service.book(request(guest_id, on, start, end)).await
        }));
    }

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            BookOutcome::Booked { .. } => booked += 1,
            BookOutcome::Rejected { reason } => {
                assert_eq!(reason, BookingRejection::SlotConflict)
            }
        }
    }
    assert_eq!(booked, 1);
    assert_eq!(f.store.reservations_on(on).await.unwrap().len(), 1);
}
