use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.torn.com";

/// Shape of the daemon's log lines (`CW_LOG_FORMAT`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` falls back to text.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

pub struct Config {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub sync_url: Option<String>,
    pub sync_auth: Option<String>,
    pub data_file: PathBuf,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let api_base_url =
            std::env::var("CW_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        let data_file = std::env::var("CW_DATA_FILE")
            .unwrap_or_else(|_| "./data/chainwatch.json".into())
            .into();
        let timeout_ms: u64 = std::env::var("CW_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "15000".into())
            .parse()
            .unwrap_or(15000);
        Self {
            api_base_url,
            api_key: non_empty_var("CW_API_KEY"),
            sync_url: non_empty_var("CW_SYNC_URL"),
            sync_auth: non_empty_var("CW_SYNC_AUTH"),
            data_file,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format: non_empty_var("CW_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }
}
