//! PostgreSQL 儲存實作。
//!
//! 優惠碼的 claim 與綁定都是單一條件式 `UPDATE`；預約的重疊檢查交給
//! exclusion constraint，多個服務實例同時寫入也不會重複預約。

use crate::core::{
    ClaimRef, ClaimResult, ContactAddress, Guest, GuestId, GuestStore, PromoCode, PromoCodeStore,
    Reservation, ReservationId, ReservationStore, Result,
};
use crate::domain::model::CodeStatus;
use crate::utils::error::PromoError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// SQLSTATE exclusion_violation
const EXCLUSION_VIOLATION: &str = "23P01";

const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS btree_gist",
    r"
    CREATE TABLE IF NOT EXISTS promo_codes (
        code TEXT PRIMARY KEY,
        claim_token UUID,
        claimed_at TIMESTAMP,
        guest_id UUID
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS guests (
        id UUID PRIMARY KEY,
        display_name TEXT NOT NULL,
        contact TEXT NOT NULL UNIQUE,
        created_at TIMESTAMP NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS reservations (
        id UUID PRIMARY KEY,
        guest_id UUID NOT NULL REFERENCES guests(id),
        slot_date DATE NOT NULL,
        start_time TIME NOT NULL,
        end_time TIME NOT NULL,
        service_label TEXT,
        created_at TIMESTAMP NOT NULL,
        CHECK (start_time < end_time),
        EXCLUDE USING gist (
            slot_date WITH =,
            tsrange(slot_date + start_time, slot_date + end_time, '[)') WITH &&
        )
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_reservations_guest ON reservations(guest_id)",
];

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        tracing::info!("🐘 Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// 建立資料表；可重複執行
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA.iter().copied() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Schema is up to date");
        Ok(())
    }
}

fn promo_from_row(row: &PgRow) -> Result<PromoCode> {
    let code: String = row.try_get("code")?;
    let claim_token: Option<Uuid> = row.try_get("claim_token")?;
    let claimed_at: Option<NaiveDateTime> = row.try_get("claimed_at")?;
    let guest_id: Option<Uuid> = row.try_get("guest_id")?;

    let status = match (guest_id, claim_token, claimed_at) {
        (Some(guest_id), _, _) => CodeStatus::Redeemed {
            guest_id: GuestId(guest_id),
        },
        (None, Some(token), Some(claimed_at)) => CodeStatus::AwaitingIdentity {
            claim: ClaimRef {
                code: code.clone(),
                token,
            },
            claimed_at,
        },
        _ => CodeStatus::Unredeemed,
    };

    Ok(PromoCode { code, status })
}

fn guest_from_row(row: &PgRow) -> Result<Guest> {
    let contact: String = row.try_get("contact")?;
    Ok(Guest {
        id: GuestId(row.try_get("id")?),
        display_name: row.try_get("display_name")?,
        contact: ContactAddress::parse(&contact)?,
        created_at: row.try_get("created_at")?,
    })
}

fn reservation_from_row(row: &PgRow) -> Result<Reservation> {
    Ok(Reservation {
        id: ReservationId(row.try_get("id")?),
        guest_id: GuestId(row.try_get("guest_id")?),
        date: row.try_get::<NaiveDate, _>("slot_date")?,
        start: row.try_get::<NaiveTime, _>("start_time")?,
        end: row.try_get::<NaiveTime, _>("end_time")?,
        service_label: row.try_get("service_label")?,
        created_at: row.try_get("created_at")?,
    })
}

const RESERVATION_COLUMNS: &str =
    "id, guest_id, slot_date, start_time, end_time, service_label, created_at";

impl PromoCodeStore for PgStore {
    async fn find_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let row = sqlx::query(
            "SELECT code, claim_token, claimed_at, guest_id FROM promo_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(promo_from_row).transpose()
    }

    async fn insert_code(&self, code: &str) -> Result<bool> {
        let result = sqlx::query("INSERT INTO promo_codes (code) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn claim_code(
        &self,
        claim: &ClaimRef,
        now: NaiveDateTime,
        stale_before: NaiveDateTime,
    ) -> Result<ClaimResult> {
        let claimed = sqlx::query(
            r"
            UPDATE promo_codes
            SET claim_token = $2, claimed_at = $3
            WHERE code = $1
              AND guest_id IS NULL
              AND (claim_token IS NULL OR claimed_at < $4)
            ",
        )
        .bind(&claim.code)
        .bind(claim.token)
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        if claimed.rows_affected() == 1 {
            return Ok(ClaimResult::Claimed);
        }

        // 沒搶到：分辨是不存在、已兌換，還是別人正在登記
        Ok(match self.find_code(&claim.code).await? {
            None => ClaimResult::NotFound,
            Some(promo) => match promo.bound_guest_id() {
                Some(guest_id) => ClaimResult::AlreadyRedeemed(guest_id),
                None => ClaimResult::Pending,
            },
        })
    }

    async fn bind_code(&self, claim: &ClaimRef, guest_id: GuestId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE promo_codes
            SET guest_id = $3, claim_token = NULL, claimed_at = NULL
            WHERE code = $1 AND claim_token = $2 AND guest_id IS NULL
            ",
        )
        .bind(&claim.code)
        .bind(claim.token)
        .bind(guest_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl GuestStore for PgStore {
    async fn find_guest(&self, id: GuestId) -> Result<Option<Guest>> {
        let row = sqlx::query(
            "SELECT id, display_name, contact, created_at FROM guests WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(guest_from_row).transpose()
    }

    async fn find_guest_by_contact(&self, contact: &ContactAddress) -> Result<Option<Guest>> {
        let row = sqlx::query(
            "SELECT id, display_name, contact, created_at FROM guests WHERE contact = $1",
        )
        .bind(contact.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(guest_from_row).transpose()
    }

    async fn create_guest(&self, guest: Guest) -> Result<Guest> {
        let inserted = sqlx::query(
            r"
            INSERT INTO guests (id, display_name, contact, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (contact) DO NOTHING
            ",
        )
        .bind(guest.id.0)
        .bind(&guest.display_name)
        .bind(guest.contact.to_string())
        .bind(guest.created_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(guest);
        }

        match self.find_guest_by_contact(&guest.contact).await? {
            Some(existing) => Ok(existing),
            None => Err(PromoError::store(format!(
                "guest with contact {} vanished after conflict",
                guest.contact
            ))),
        }
    }

    async fn rename_guest_if_unbooked(&self, id: GuestId, display_name: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // FOR UPDATE 與插入預約時外鍵檢查的 KEY SHARE 鎖互斥；
        // 下一個語句取新的 snapshot，看得到已提交的預約
        let locked = sqlx::query("SELECT id FROM guests WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE guests SET display_name = $2 \
             WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM reservations WHERE guest_id = $1)",
        )
        .bind(id.0)
        .bind(display_name)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected() == 1)
    }
}

impl ReservationStore for PgStore {
    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>> {
        self.reservations_between(date, date).await
    }

    async fn reservations_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE slot_date BETWEEN $1 AND $2 ORDER BY slot_date, start_time"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reservation_from_row).collect()
    }

    async fn reservations_for_guest(&self, guest_id: GuestId) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE guest_id = $1 ORDER BY slot_date, start_time"
        ))
        .bind(guest_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reservation_from_row).collect()
    }

    async fn insert_reservation_if_free(&self, reservation: &Reservation) -> Result<bool> {
        let result = sqlx::query(&format!(
            "INSERT INTO reservations ({RESERVATION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(reservation.id.0)
        .bind(reservation.guest_id.0)
        .bind(reservation.date)
        .bind(reservation.start)
        .bind(reservation.end)
        .bind(&reservation.service_label)
        .bind(reservation.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(EXCLUSION_VIOLATION) =>
            {
                tracing::debug!(
                    "Overlap on {} for {}, insert refused",
                    reservation.date,
                    reservation.block()
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
