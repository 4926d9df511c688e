use thiserror::Error;

/// 基礎設施與配置錯誤。
///
/// 業務結果 (無效優惠碼、時段衝突...) 不走這裡，見 `domain::outcome`。
#[derive(Error, Debug)]
pub enum PromoError {
    #[error("Store error: {message}")]
    StoreError { message: String },

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Notification via {channel} failed: {message}")]
    NotificationError { channel: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid contact address '{value}'")]
    InvalidContact { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Storage,
    Network,
    Notification,
    Data,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PromoError {
    pub fn store(message: impl Into<String>) -> Self {
        PromoError::StoreError {
            message: message.into(),
        }
    }

    pub fn notification(channel: impl Into<String>, message: impl Into<String>) -> Self {
        PromoError::NotificationError {
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PromoError::StoreError { .. } => ErrorCategory::Storage,
            #[cfg(feature = "postgres")]
            PromoError::DatabaseError(_) => ErrorCategory::Storage,
            PromoError::HttpError(_) => ErrorCategory::Network,
            PromoError::NotificationError { .. } => ErrorCategory::Notification,
            PromoError::CsvError(_)
            | PromoError::IoError(_)
            | PromoError::SerializationError(_)
            | PromoError::InvalidContact { .. } => ErrorCategory::Data,
            PromoError::ConfigValidationError { .. }
            | PromoError::InvalidConfigValueError { .. }
            | PromoError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 通知失敗不會回滾已提交的兌換或預約
            ErrorCategory::Notification => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Storage => "Check that the database is reachable and migrated",
            ErrorCategory::Network => "Check network connectivity and retry",
            ErrorCategory::Notification => {
                "The booking is saved; verify bot token / SMTP credentials for future messages"
            }
            ErrorCategory::Data => "Check the input file or contact address format",
            ErrorCategory::Configuration => "Fix the campaign configuration file and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PromoError::MissingConfigError { field } => {
                format!("Configuration is missing '{}'", field)
            }
            PromoError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
            PromoError::InvalidContact { value } => {
                format!("'{}' is neither an e-mail address nor a Telegram chat id", value)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PromoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_failures_are_low_severity() {
        let err = PromoError::notification("telegram", "chat not found");
        assert_eq!(err.category(), ErrorCategory::Notification);
        assert_eq!(err.severity(), ErrorSeverity::Low);
    }

    #[test]
    fn test_store_failures_are_critical() {
        let err = PromoError::store("connection refused");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_user_friendly_message_for_missing_field() {
        let err = PromoError::MissingConfigError {
            field: "storage.database_url".to_string(),
        };
        assert_eq!(
            err.user_friendly_message(),
            "Configuration is missing 'storage.database_url'"
        );
    }
}
