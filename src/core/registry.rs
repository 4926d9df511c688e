use crate::core::{ClaimRef, ClaimResult, Clock, GuestId, PromoCode, PromoCodeStore, Result};
use chrono::Duration;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    Claimed(ClaimRef),
    /// 已兌換時帶綁定的訪客；別人的 claim 尚未過期時為 `None`
    AlreadyRedeemed(Option<GuestId>),
    NotFound,
}

#[derive(Debug, Deserialize)]
struct CodeRow {
    code: String,
}

/// 優惠碼查詢與原子性 claim。
pub struct PromoCodeRegistry<S: PromoCodeStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    claim_ttl: Duration,
}

impl<S: PromoCodeStore> PromoCodeRegistry<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, claim_ttl: Duration) -> Self {
        Self {
            store,
            clock,
            claim_ttl,
        }
    }

    pub async fn lookup(&self, code: &str) -> Result<Option<PromoCode>> {
        self.store.find_code(code.trim()).await
    }

    pub async fn claim(&self, code: &str) -> Result<Claim> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(Claim::NotFound);
        }

        let claim = ClaimRef::new(code);
        let now = self.clock.now();
        let result = self
            .store
            .claim_code(&claim, now, now - self.claim_ttl)
            .await?;

        Ok(match result {
            ClaimResult::Claimed => {
                tracing::debug!("🔒 Code {} claimed", code);
                Claim::Claimed(claim)
            }
            ClaimResult::AlreadyRedeemed(guest_id) => Claim::AlreadyRedeemed(Some(guest_id)),
            ClaimResult::Pending => Claim::AlreadyRedeemed(None),
            ClaimResult::NotFound => Claim::NotFound,
        })
    }

    pub async fn bind(&self, claim: &ClaimRef, guest_id: GuestId) -> Result<bool> {
        self.store.bind_code(claim, guest_id).await
    }

    /// 回傳新加入的碼數量
    pub async fn seed<I, T>(&self, codes: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut added = 0;
        for code in codes {
            let code = code.as_ref().trim();
            if code.is_empty() {
                continue;
            }
            if self.store.insert_code(code).await? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// 從 CSV 匯入優惠碼，需要 `code` 欄位
    pub async fn import_csv<R: Read>(&self, reader: R) -> Result<usize> {
        let codes = {
            let mut csv_reader =
                csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
            let mut codes = Vec::new();
            for row in csv_reader.deserialize::<CodeRow>() {
                codes.push(row?.code);
            }
            codes
        };

        let added = self.seed(&codes).await?;
        tracing::info!("🎟️ Imported {} new promo codes ({} rows)", added, codes.len());
        Ok(added)
    }

    pub async fn import_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let file = std::fs::File::open(path)?;
        self.import_csv(file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FixedClock, MemoryStore};
    use chrono::NaiveDate;

    fn registry() -> (PromoCodeRegistry<MemoryStore>, Arc<FixedClock>) {
        let now = NaiveDate::from_ymd_opt(2025, 12, 20)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let registry = PromoCodeRegistry::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Duration::minutes(10),
        );
        (registry, clock)
    }

    #[tokio::test]
    async fn test_claim_unknown_code() {
        let (registry, _) = registry();
        assert_eq!(registry.claim("NOPE").await.unwrap(), Claim::NotFound);
        assert_eq!(registry.claim("   ").await.unwrap(), Claim::NotFound);
    }

    #[tokio::test]
    async fn test_claim_then_bind() {
        let (registry, _) = registry();
        registry.seed(["SPA-001"]).await.unwrap();

        let Claim::Claimed(claim) = registry.claim(" SPA-001 ").await.unwrap() else {
            panic!("expected a fresh claim");
        };
        assert_eq!(registry.claim("SPA-001").await.unwrap(), Claim::AlreadyRedeemed(None));

        let guest_id = GuestId::new();
        assert!(registry.bind(&claim, guest_id).await.unwrap());
        assert_eq!(
            registry.claim("SPA-001").await.unwrap(),
            Claim::AlreadyRedeemed(Some(guest_id))
        );
        let promo = registry.lookup("SPA-001").await.unwrap().unwrap();
        assert!(promo.redeemed());
    }

    #[tokio::test]
    async fn test_abandoned_claim_expires() {
        let (registry, clock) = registry();
        registry.seed(["SPA-002"]).await.unwrap();

        let Claim::Claimed(abandoned) = registry.claim("SPA-002").await.unwrap() else {
            panic!("expected a fresh claim");
        };
        clock.advance(Duration::minutes(11));

        let Claim::Claimed(fresh) = registry.claim("SPA-002").await.unwrap() else {
            panic!("stale claim should be reclaimable");
        };
        assert!(!registry.bind(&abandoned, GuestId::new()).await.unwrap());
        assert!(registry.bind(&fresh, GuestId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_import_csv_skips_blank_and_duplicate_codes() {
        let (registry, _) = registry();
        let data = "code\nSPA-001\n  SPA-002  \n   \nSPA-001\n";

        let added = registry.import_csv(data.as_bytes()).await.unwrap();
        assert_eq!(added, 2);
        assert!(registry.lookup("SPA-002").await.unwrap().is_some());
    }
}
