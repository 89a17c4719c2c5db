//! Request field checks. Each returns the normalized value or a 400 naming the field.

use crate::error::ApiError;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ApiError::invalid_field(
            "name",
            format!("name must be at least {} characters", MIN_NAME_LEN),
        ));
    }
    Ok(name.to_string())
}

/// Lowercased, trimmed address with one `@` and a dotted domain.
pub fn email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
        }
        None => false,
    };
    if !valid {
        return Err(ApiError::invalid_field("email", "invalid email address"));
    }
    Ok(email)
}

pub fn password(raw: &str) -> Result<(), ApiError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_field(
            "password",
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Trimmed, non-empty text.
pub fn required(field: &'static str, raw: &str) -> Result<String, ApiError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ApiError::invalid_field(field, format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

/// Profile edit semantics: absent leaves the field, blank clears it.
pub fn optional(raw: Option<&str>) -> Option<Option<String>> {
    raw.map(|value| {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Like [`optional`], but a non-blank value must be an absolute http(s) URL.
pub fn optional_url(field: &'static str, raw: Option<&str>) -> Result<Option<Option<String>>, ApiError> {
    match optional(raw) {
        Some(Some(value)) => {
            http_url(field, &value)?;
            Ok(Some(Some(value)))
        }
        other => Ok(other),
    }
}

pub fn http_url(field: &'static str, raw: &str) -> Result<(), ApiError> {
    let parsed = url::Url::parse(raw)
        .map_err(|_| ApiError::invalid_field(field, format!("{} must be a valid URL", field)))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ApiError::invalid_field(
            field,
            format!("{} must be an http or https URL", field),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ApiError) -> Option<&'static str> {
        match err {
            ApiError::Validation { field, .. } => field,
            _ => None,
        }
    }

    #[test]
    fn names_and_passwords_have_minimum_lengths() {
        assert_eq!(name("  Al ").unwrap(), "Al");
        assert_eq!(field_of(name(" A ").unwrap_err()), Some("name"));
        assert!(password("secret").is_ok());
        assert_eq!(field_of(password("12345").unwrap_err()), Some("password"));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "@example.com", "ada@example", "ada@@example.com", "a da@example.com", "ada@.com"] {
            assert!(email(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn optional_fields_clear_on_blank() {
        assert_eq!(optional(None), None);
        assert_eq!(optional(Some("   ")), Some(None));
        assert_eq!(optional(Some(" Boston ")), Some(Some("Boston".into())));
    }

    #[test]
    fn social_links_must_be_web_urls() {
        assert!(optional_url("twitter", Some("https://twitter.com/ada")).is_ok());
        assert_eq!(optional_url("twitter", Some("")).unwrap(), Some(None));
        assert_eq!(field_of(optional_url("twitter", Some("twitter.com/ada")).unwrap_err()), Some("twitter"));
        assert!(optional_url("linkedin", Some("javascript:alert(1)")).is_err());
        assert!(optional_url("website", Some("ftp://example.com")).is_err());
    }
}
