use crate::utils::error::{PromoError, Result};
use chrono::{NaiveDate, NaiveTime};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" | "postgres" | "postgresql" => Ok(()),
            scheme => Err(PromoError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    match std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(extension) if allowed_extensions.contains(&extension) => Ok(()),
        Some(extension) => Err(PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                extension,
                allowed_extensions.join(", ")
            ),
        }),
        None => Err(PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: file.to_string(),
            reason: "File has no extension or invalid filename".to_string(),
        }),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| PromoError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 解析 `YYYY-MM-DD`
pub fn parse_date(field_name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Expected a YYYY-MM-DD date: {}", e),
        }
    })
}

/// 解析 `HH:MM`，也接受 `HH:MM:SS`
pub fn parse_time(field_name: &str, value: &str) -> Result<NaiveTime> {
    let value_trimmed = value.trim();
    NaiveTime::parse_from_str(value_trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value_trimmed, "%H:%M:%S"))
        .map_err(|e| PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Expected an HH:MM time: {}", e),
        })
}

pub fn validate_ordered<T: PartialOrd + std::fmt::Display>(
    field_name: &str,
    lower: T,
    upper: T,
    allow_equal: bool,
) -> Result<()> {
    let ordered = if allow_equal { lower <= upper } else { lower < upper };
    if !ordered {
        return Err(PromoError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("{} .. {}", lower, upper),
            reason: "Range start must come before its end".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("telegram.api_base", "https://api.telegram.org").is_ok());
        assert!(validate_url("storage.database_url", "postgres://localhost/promo").is_ok());
        assert!(validate_url("telegram.api_base", "").is_err());
        assert!(validate_url("telegram.api_base", "invalid-url").is_err());
        assert!(validate_url("telegram.api_base", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("promotion.block_minutes", 120, 1).is_ok());
        assert!(validate_positive_number("promotion.block_minutes", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("storage.codes_file", "codes.csv", &["csv"]).is_ok());
        assert!(validate_file_extension("storage.codes_file", "codes.txt", &["csv"]).is_err());
        assert!(validate_file_extension("storage.codes_file", "codes", &["csv"]).is_err());
    }

    #[test]
    fn test_parse_time_accepts_minutes_and_seconds() {
        assert_eq!(
            parse_time("promotion.daily_open", "11:00").unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("promotion.daily_close", "23:59:00").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
        assert!(parse_time("promotion.daily_open", "25:00").is_err());
    }

    #[test]
    fn test_validate_ordered() {
        let a = parse_date("d", "2025-12-20").unwrap();
        let b = parse_date("d", "2026-01-06").unwrap();
        assert!(validate_ordered("promotion", a, b, true).is_ok());
        assert!(validate_ordered("promotion", a, a, true).is_ok());
        assert!(validate_ordered("promotion", a, a, false).is_err());
        assert!(validate_ordered("promotion", b, a, true).is_err());
    }
}
