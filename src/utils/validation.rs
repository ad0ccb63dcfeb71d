use crate::utils::error::{BindingError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BindingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BindingError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BindingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BindingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BindingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BindingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BindingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Secret keys look like `sk_test_...`, `sk_live_...` or restricted `rk_...` keys.
/// An unresolved `${VAR}` placeholder is reported as missing rather than malformed.
pub fn validate_secret_key(field_name: &str, key: &str) -> Result<()> {
    if key.trim().is_empty() || (key.starts_with("${") && key.ends_with('}')) {
        return Err(BindingError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    if !(key.starts_with("sk_") || key.starts_with("rk_")) {
        return Err(BindingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: "<redacted>".to_string(),
            reason: "Secret key must start with 'sk_' or 'rk_'".to_string(),
        });
    }

    Ok(())
}

/// Local sanity check before a reference is sent to the processor. References are
/// interpolated into request paths, so anything outside `[A-Za-z0-9_]` is refused.
pub fn validate_payment_method_reference(reference: &str) -> Result<()> {
    let well_formed = !reference.is_empty()
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !well_formed {
        return Err(BindingError::InvalidPaymentMethod {
            reference: reference.to_string(),
            message: "Malformed payment method reference".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("processor.api_base", "https://api.stripe.com").is_ok());
        assert!(validate_url("processor.api_base", "http://127.0.0.1:12111").is_ok());
        assert!(validate_url("processor.api_base", "").is_err());
        assert!(validate_url("processor.api_base", "invalid-url").is_err());
        assert!(validate_url("processor.api_base", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("processor.timeout_seconds", 10, 1, 300).is_ok());
        assert!(validate_range("processor.timeout_seconds", 0, 1, 300).is_err());
        assert!(validate_range("processor.timeout_seconds", 301, 1, 300).is_err());
    }

    #[test]
    fn test_validate_secret_key() {
        assert!(validate_secret_key("processor.secret_key", "sk_test_123").is_ok());
        assert!(validate_secret_key("processor.secret_key", "rk_live_abc").is_ok());
        assert!(matches!(
            validate_secret_key("processor.secret_key", "${STRIPE_SECRET}"),
            Err(BindingError::MissingConfigError { .. })
        ));
        assert!(matches!(
            validate_secret_key("processor.secret_key", "pk_test_123"),
            Err(BindingError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_validate_payment_method_reference() {
        assert!(validate_payment_method_reference("pm_card_visa").is_ok());
        assert!(validate_payment_method_reference("pm_1NXWPnLkdIwHu7ix").is_ok());
        assert!(validate_payment_method_reference("").is_err());
        assert!(validate_payment_method_reference("pm_card_visa/attach").is_err());
        assert!(validate_payment_method_reference("pm card").is_err());
    }
}
