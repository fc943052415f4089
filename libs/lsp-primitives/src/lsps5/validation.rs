//! Checks a client runs before registering a webhook.
use url::Url;

pub const MAX_APP_NAME_LENGTH: usize = 64;
pub const MAX_WEBHOOK_URL_LENGTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Lsps5ValidationError {
    #[error("The app name is empty")]
    EmptyAppName,
    #[error("The app name is {0} bytes but at most {max} are allowed", max = MAX_APP_NAME_LENGTH)]
    AppNameTooLong(usize),
    #[error(
        "The webhook url is {0} characters but at most {max} are allowed",
        max = MAX_WEBHOOK_URL_LENGTH
    )]
    UrlTooLong(usize),
    #[error("Failed to parse webhook url: {0}")]
    InvalidUrl(String),
    #[error("Unsupported scheme '{0}', use http or https")]
    UnsupportedScheme(String),
    #[error("The webhook url has no host")]
    MissingHost,
}

pub fn validate_app_name(app_name: &str) -> Result<(), Lsps5ValidationError> {
    if app_name.is_empty() {
        return Err(Lsps5ValidationError::EmptyAppName);
    }
    if app_name.len() > MAX_APP_NAME_LENGTH {
        return Err(Lsps5ValidationError::AppNameTooLong(app_name.len()));
    }
    Ok(())
}

/// The webhook must be an absolute `http` or `https` url with a host
pub fn validate_webhook_url(webhook: &str) -> Result<Url, Lsps5ValidationError> {
    let length = webhook.chars().count();
    if length > MAX_WEBHOOK_URL_LENGTH {
        return Err(Lsps5ValidationError::UrlTooLong(length));
    }

    let url = Url::parse(webhook).map_err(|e| Lsps5ValidationError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(Lsps5ValidationError::UnsupportedScheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(Lsps5ValidationError::MissingHost),
    }
}
