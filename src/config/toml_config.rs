use crate::core::{CampaignSettings, ContactAddress, MessageTemplates, PromotionWindow};
use crate::utils::error::{PromoError, Result};
use crate::utils::validation::{
    parse_date, parse_time, validate_file_extension, validate_non_empty_string,
    validate_ordered, validate_positive_number, validate_required_field, validate_url, Validate,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub campaign: CampaignSection,
    pub promotion: PromotionConfig,
    pub storage: Option<StorageConfig>,
    pub notifications: Option<NotificationsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSection {
    pub name: String,
    pub grand_prize_codes: Option<Vec<String>>,
    pub claim_ttl_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    pub start_date: String,
    pub end_date: String,
    pub daily_open: String,
    pub daily_close: String,
    pub block_minutes: u64,
    pub min_lead_time_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: Option<String>,
    pub database_url: Option<String>,
    pub codes_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub channels: Option<Vec<String>>,
    pub owner_contact: Option<String>,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
    pub templates: Option<TemplatesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: Option<u16>,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    pub promo_redeemed_guest: Option<String>,
    pub promo_redeemed_owner: Option<String>,
    pub grand_prize_guest: Option<String>,
    pub grand_prize_owner: Option<String>,
    pub reservation_guest: Option<String>,
    pub reservation_owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    Telegram,
    Email,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

const DEFAULT_CLAIM_TTL_MINUTES: u64 = 10;

impl CampaignConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PromoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PromoError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${TELEGRAM_BOT_TOKEN})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PromoError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("campaign.name", &self.campaign.name)?;
        if let Some(ttl) = self.campaign.claim_ttl_minutes {
            validate_positive_number("campaign.claim_ttl_minutes", ttl, 1)?;
        }

        // 活動期間與營業時間
        self.promotion_window()?;

        if self.storage_backend()? == StorageBackend::Postgres {
            let storage = validate_required_field("storage", &self.storage)?;
            let url = validate_required_field("storage.database_url", &storage.database_url)?;
            validate_url("storage.database_url", url)?;
        }
        if let Some(codes_file) = self.codes_file() {
            validate_file_extension("storage.codes_file", codes_file, &["csv"])?;
        }

        for channel in self.channels()? {
            match channel {
                NotificationChannel::Telegram => {
                    let telegram_config = self.telegram();
                    let telegram =
                        validate_required_field("notifications.telegram", &telegram_config)?;
                    validate_non_empty_string("notifications.telegram.bot_token", &telegram.bot_token)?;
                    if let Some(api_base) = &telegram.api_base {
                        validate_url("notifications.telegram.api_base", api_base)?;
                    }
                }
                NotificationChannel::Email => {
                    let email_config = self.email();
                    let email = validate_required_field("notifications.email", &email_config)?;
                    validate_non_empty_string("notifications.email.smtp_server", &email.smtp_server)?;
                    ContactAddress::parse(&email.from_email)?;
                }
                NotificationChannel::Log => {}
            }
        }

        self.owner_contact()?;
        self.log_format()?;
        Ok(())
    }

    pub fn promotion_window(&self) -> Result<PromotionWindow> {
        let p = &self.promotion;
        let start_date = parse_date("promotion.start_date", &p.start_date)?;
        let end_date = parse_date("promotion.end_date", &p.end_date)?;
        validate_ordered("promotion.start_date", start_date, end_date, true)?;

        let daily_open = parse_time("promotion.daily_open", &p.daily_open)?;
        let daily_close = parse_time("promotion.daily_close", &p.daily_close)?;
        validate_ordered("promotion.daily_open", daily_open, daily_close, false)?;

        validate_positive_number("promotion.block_minutes", p.block_minutes, 1)?;
        // 超過一天的長度下面一定會被拒絕
        let block_duration = Duration::minutes(p.block_minutes.min(24 * 60) as i64);
        let (first_block_end, wrapped_secs) = daily_open.overflowing_add_signed(block_duration);
        if wrapped_secs != 0 || first_block_end > daily_close {
            return Err(PromoError::InvalidConfigValueError {
                field: "promotion.block_minutes".to_string(),
                value: p.block_minutes.to_string(),
                reason: "No block fits between daily_open and daily_close".to_string(),
            });
        }

        let min_lead_time = p
            .min_lead_time_hours
            .map(|hours| Duration::hours(hours.min(24 * 365) as i64));

        Ok(PromotionWindow {
            start_date,
            end_date,
            daily_open,
            daily_close,
            block_duration,
            min_lead_time,
        })
    }

    pub fn claim_ttl(&self) -> Duration {
        let minutes = self
            .campaign
            .claim_ttl_minutes
            .unwrap_or(DEFAULT_CLAIM_TTL_MINUTES)
            .min(60 * 24 * 30);
        Duration::minutes(minutes as i64)
    }

    pub fn grand_prize_codes(&self) -> Vec<String> {
        self.campaign
            .grand_prize_codes
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect()
    }

    pub fn storage_backend(&self) -> Result<StorageBackend> {
        let backend = self
            .storage
            .as_ref()
            .and_then(|s| s.backend.as_deref())
            .unwrap_or("memory");
        match backend {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            other => Err(PromoError::InvalidConfigValueError {
                field: "storage.backend".to_string(),
                value: other.to_string(),
                reason: "Unsupported backend. Valid backends: memory, postgres".to_string(),
            }),
        }
    }

    pub fn database_url(&self) -> Option<&str> {
        self.storage.as_ref().and_then(|s| s.database_url.as_deref())
    }

    pub fn codes_file(&self) -> Option<&str> {
        self.storage.as_ref().and_then(|s| s.codes_file.as_deref())
    }

    /// 沒設定時只寫日誌
    pub fn channels(&self) -> Result<Vec<NotificationChannel>> {
        let configured = self
            .notifications
            .as_ref()
            .and_then(|n| n.channels.clone())
            .unwrap_or_else(|| vec!["log".to_string()]);

        configured
            .iter()
            .map(|name| match name.as_str() {
                "telegram" => Ok(NotificationChannel::Telegram),
                "email" => Ok(NotificationChannel::Email),
                "log" => Ok(NotificationChannel::Log),
                other => Err(PromoError::InvalidConfigValueError {
                    field: "notifications.channels".to_string(),
                    value: other.to_string(),
                    reason: "Unsupported channel. Valid channels: telegram, email, log".to_string(),
                }),
            })
            .collect()
    }

    pub fn telegram(&self) -> Option<TelegramConfig> {
        self.notifications.as_ref().and_then(|n| n.telegram.clone())
    }

    pub fn email(&self) -> Option<EmailConfig> {
        self.notifications.as_ref().and_then(|n| n.email.clone())
    }

    pub fn owner_contact(&self) -> Result<Option<ContactAddress>> {
        match self
            .notifications
            .as_ref()
            .and_then(|n| n.owner_contact.as_deref())
        {
            Some(raw) if !raw.trim().is_empty() => Ok(Some(ContactAddress::parse(raw)?)),
            _ => Ok(None),
        }
    }

    pub fn templates(&self) -> MessageTemplates {
        let overrides = self
            .notifications
            .as_ref()
            .and_then(|n| n.templates.clone())
            .unwrap_or_default();
        let defaults = MessageTemplates::default();

        MessageTemplates {
            promo_redeemed_guest: overrides
                .promo_redeemed_guest
                .unwrap_or(defaults.promo_redeemed_guest),
            promo_redeemed_owner: overrides
                .promo_redeemed_owner
                .unwrap_or(defaults.promo_redeemed_owner),
            grand_prize_guest: overrides.grand_prize_guest.unwrap_or(defaults.grand_prize_guest),
            grand_prize_owner: overrides.grand_prize_owner.unwrap_or(defaults.grand_prize_owner),
            reservation_guest: overrides.reservation_guest.unwrap_or(defaults.reservation_guest),
            reservation_owner: overrides.reservation_owner.unwrap_or(defaults.reservation_owner),
        }
    }

    pub fn log_format(&self) -> Result<LogFormat> {
        match self.logging.as_ref().and_then(|l| l.format.as_deref()) {
            None | Some("compact") => Ok(LogFormat::Compact),
            Some("json") => Ok(LogFormat::Json),
            Some(other) => Err(PromoError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: other.to_string(),
                reason: "Valid formats: compact, json".to_string(),
            }),
        }
    }

    /// 組成核心服務需要的設定
    pub fn settings(&self) -> Result<CampaignSettings> {
        Ok(CampaignSettings {
            window: self.promotion_window()?,
            claim_ttl: self.claim_ttl(),
            grand_prize_codes: self.grand_prize_codes(),
            templates: self.templates(),
            owner_contact: self.owner_contact()?,
        })
    }
}

impl Validate for CampaignConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
