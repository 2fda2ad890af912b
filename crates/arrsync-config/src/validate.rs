//! Parsers for individual configuration values.

use arrsync_telemetry::LogFormat;
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::NotificationService;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Parse a TCP port in `1..=65535`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-numeric or out-of-range input.
pub fn parse_port(field: &'static str, raw: &str) -> ConfigResult<u16> {
    let port = raw
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(field, raw, "must be an integer between 1 and 65535"))?;
    if port == 0 {
        return Err(ConfigError::invalid(
            field,
            raw,
            "must be an integer between 1 and 65535",
        ));
    }
    Ok(port)
}

/// Parse a permission mode written as octal digits (`755`, `0644`).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value has more than four
/// digits or contains a non-octal digit.
pub fn parse_octal_mode(field: &'static str, raw: &str) -> ConfigResult<u32> {
    if raw.is_empty() || raw.len() > 4 || !raw.bytes().all(|byte| (b'0'..=b'7').contains(&byte)) {
        return Err(ConfigError::invalid(field, raw, "must be up to four octal digits"));
    }
    u32::from_str_radix(raw, 8)
        .map_err(|_| ConfigError::invalid(field, raw, "must be up to four octal digits"))
}

/// Normalise a log level name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for names outside `trace..error`.
pub fn parse_level(field: &'static str, raw: &str) -> ConfigResult<String> {
    let level = raw.to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(ConfigError::invalid(
            field,
            raw,
            "must be one of trace, debug, info, warn, error",
        ))
    }
}

/// Parse an explicit log output format.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] unless the value is `json` or `pretty`.
pub fn parse_log_format(field: &'static str, raw: &str) -> ConfigResult<LogFormat> {
    if raw.eq_ignore_ascii_case("json") {
        Ok(LogFormat::Json)
    } else if raw.eq_ignore_ascii_case("pretty") {
        Ok(LogFormat::Pretty)
    } else {
        Err(ConfigError::invalid(field, raw, "must be json or pretty"))
    }
}

/// Parse the notification backend name.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for unknown backends.
pub fn parse_notification_service(
    field: &'static str,
    raw: &str,
) -> ConfigResult<NotificationService> {
    match raw.to_ascii_lowercase().as_str() {
        "discord" => Ok(NotificationService::Discord),
        "apprise" => Ok(NotificationService::Apprise),
        _ => Err(ConfigError::invalid(field, raw, "must be discord or apprise")),
    }
}

/// Parse an absolute `http`/`https` URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] when parsing fails and
/// [`ConfigError::InvalidField`] for other schemes.
pub fn parse_http_url(field: &'static str, raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::invalid(field, raw, "must use http or https")),
    }
}
