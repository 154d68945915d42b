//! Validation functions for configuration values.

use validator::ValidationError;

/// Empty disables notifications, anything else must be an http(s) URL.
pub fn validate_webhook_url<S: AsRef<str>>(url: S) -> Result<(), ValidationError> {
    let url = url.as_ref();
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::new("InvalidWebhookUrl")
            .with_message(format!("webhook url {url:?} must be empty or http(s)").into()))
    }
}
