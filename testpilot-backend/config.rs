use std::time::Duration;

pub const DEFAULT_BROWSER_USE_BASE_URL: &str = "https://api.browser-use.com/api/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Server configuration loaded from environment variables.
///
/// Provider keys are optional: a missing key disables that provider's
/// endpoints (they answer 503) instead of failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub sentry_dsn: Option<String>,
    pub environment: String,
    pub log_level: Option<String>,
    pub log_file: String,
    pub cors_origins: Vec<String>,
    pub gemini: GeminiSettings,
    pub browser_use: BrowserUseSettings,
    pub convex_url: Option<String>,
    pub health_check_timeout: Duration,
    pub stream_update_interval: Duration,
    pub max_stream_messages: u64,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct BrowserUseSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Raw string values as they come from the environment.
#[derive(Debug, Default, Clone)]
pub struct RawConfig<'a> {
    pub host: Option<&'a str>,
    pub port: Option<&'a str>,
    pub sentry_dsn: Option<&'a str>,
    pub environment: Option<&'a str>,
    pub log_level: Option<&'a str>,
    pub log_file: Option<&'a str>,
    pub cors_origins: Option<&'a str>,
    pub gemini_api_key: Option<&'a str>,
    pub gemini_model: Option<&'a str>,
    pub gemini_base_url: Option<&'a str>,
    pub browser_use_api_key: Option<&'a str>,
    pub browser_use_base_url: Option<&'a str>,
    pub convex_url: Option<&'a str>,
    pub health_check_timeout: Option<&'a str>,
    pub stream_update_interval: Option<&'a str>,
    pub max_stream_messages: Option<&'a str>,
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

impl Config {
    pub fn from_env() -> Self {
        let vars: Vec<Option<String>> = [
            "HOST",
            "PORT",
            "SENTRY_DSN",
            "ENVIRONMENT",
            "LOG_LEVEL",
            "LOG_FILE",
            "CORS_ORIGINS",
            "GEMINI_API_KEY",
            "GEMINI_MODEL",
            "GEMINI_BASE_URL",
            "BROWSER_USE_API_KEY",
            "BROWSER_USE_BASE_URL",
            "CONVEX_URL",
            "HEALTH_CHECK_TIMEOUT",
            "STREAM_UPDATE_INTERVAL",
            "MAX_STREAM_MESSAGES",
        ]
        .iter()
        .map(|key| std::env::var(key).ok())
        .collect();

        Self::from_raw_values(RawConfig {
            host: vars[0].as_deref(),
            port: vars[1].as_deref(),
            sentry_dsn: vars[2].as_deref(),
            environment: vars[3].as_deref(),
            log_level: vars[4].as_deref(),
            log_file: vars[5].as_deref(),
            cors_origins: vars[6].as_deref(),
            gemini_api_key: vars[7].as_deref(),
            gemini_model: vars[8].as_deref(),
            gemini_base_url: vars[9].as_deref(),
            browser_use_api_key: vars[10].as_deref(),
            browser_use_base_url: vars[11].as_deref(),
            convex_url: vars[12].as_deref(),
            health_check_timeout: vars[13].as_deref(),
            stream_update_interval: vars[14].as_deref(),
            max_stream_messages: vars[15].as_deref(),
        })
    }

    /// Build a Config from raw string values (as they would come from env vars).
    /// Used directly in tests to avoid mutating process-global environment.
    pub fn from_raw_values(raw: RawConfig<'_>) -> Self {
        let port = raw.port.and_then(|v| v.trim().parse().ok()).unwrap_or(8000);
        let host = non_empty(raw.host).unwrap_or_else(|| "0.0.0.0".to_string());

        let cors_origins: Vec<String> = non_empty(raw.cors_origins)
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let secs = |v: Option<&str>, default: u64| {
            Duration::from_secs(v.and_then(|s| s.trim().parse().ok()).unwrap_or(default))
        };

        Config {
            host,
            port,
            sentry_dsn: non_empty(raw.sentry_dsn),
            environment: non_empty(raw.environment).unwrap_or_else(|| "local".to_string()),
            log_level: non_empty(raw.log_level).map(|l| l.to_lowercase()),
            log_file: non_empty(raw.log_file).unwrap_or_else(|| "testpilot.log".to_string()),
            cors_origins,
            gemini: GeminiSettings {
                api_key: non_empty(raw.gemini_api_key),
                model: non_empty(raw.gemini_model)
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: non_empty(raw.gemini_base_url)
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            },
            browser_use: BrowserUseSettings {
                api_key: non_empty(raw.browser_use_api_key),
                base_url: non_empty(raw.browser_use_base_url)
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_BROWSER_USE_BASE_URL.to_string()),
            },
            convex_url: non_empty(raw.convex_url).map(|u| u.trim_end_matches('/').to_string()),
            health_check_timeout: secs(raw.health_check_timeout, 10),
            stream_update_interval: secs(raw.stream_update_interval, 2),
            max_stream_messages: raw
                .max_stream_messages
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(20),
        }
    }

    pub fn is_gemini_enabled(&self) -> bool {
        self.gemini.api_key.is_some()
    }

    pub fn is_browser_use_enabled(&self) -> bool {
        self.browser_use.api_key.is_some()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
