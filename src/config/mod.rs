use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub site: SiteConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub payments: PaymentConfig,
    pub email: EmailConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub slow_query_threshold_ms: u64,
    pub max_list_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub auth_rate_limit_requests: u32,
    pub auth_rate_limit_window_secs: u64,
    pub webhook_rate_limit_requests: u32,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub refresh_window_hours: u64,
    /// Peers allowed to set X-Forwarded-For. Empty means the socket peer is always the client.
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(skip_serializing)]
    pub stripe_secret_key: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    #[serde(skip_serializing)]
    pub paystack_secret_key: Option<String>,
    pub paystack_api_base: String,
    pub default_provider: String,
    pub default_currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub from_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub max_metrics: usize,
    pub max_errors: usize,
    pub error_threshold_per_minute: usize,
    pub error_rate_threshold: f64,
    pub slow_response_ms: f64,
    pub retention_secs: i64,
    pub cleanup_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Site
        if let Ok(v) = env::var("SITE_NAME") {
            self.site.name = v;
        }
        if let Ok(v) = env::var("SITE_BASE_URL") {
            self.site.base_url = v.trim_end_matches('/').to_string();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }
        if let Ok(v) = env::var("DATABASE_MAX_LIST_LIMIT") {
            self.database.max_list_limit = v.parse().unwrap_or(self.database.max_list_limit);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_AUTH_RATE_LIMIT_REQUESTS") {
            self.api.auth_rate_limit_requests = v.parse().unwrap_or(self.api.auth_rate_limit_requests);
        }
        if let Ok(v) = env::var("API_AUTH_RATE_LIMIT_WINDOW_SECS") {
            self.api.auth_rate_limit_window_secs = v.parse().unwrap_or(self.api.auth_rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_WEBHOOK_RATE_LIMIT_REQUESTS") {
            self.api.webhook_rate_limit_requests = v.parse().unwrap_or(self.api.webhook_rate_limit_requests);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_WINDOW_HOURS") {
            self.security.refresh_window_hours = v.parse().unwrap_or(self.security.refresh_window_hours);
        }
        if let Ok(v) = env::var("SECURITY_TRUSTED_PROXIES") {
            self.security.trusted_proxies = parse_ip_list(&v);
        }

        // Payment overrides
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.payments.stripe_secret_key = non_empty(v);
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.payments.stripe_webhook_secret = non_empty(v);
        }
        if let Ok(v) = env::var("STRIPE_API_BASE") {
            self.payments.stripe_api_base = v;
        }
        if let Ok(v) = env::var("PAYSTACK_SECRET_KEY") {
            self.payments.paystack_secret_key = non_empty(v);
        }
        if let Ok(v) = env::var("PAYSTACK_API_BASE") {
            self.payments.paystack_api_base = v;
        }
        if let Ok(v) = env::var("PAYMENTS_DEFAULT_PROVIDER") {
            self.payments.default_provider = v;
        }
        if let Ok(v) = env::var("PAYMENTS_DEFAULT_CURRENCY") {
            self.payments.default_currency = v.to_ascii_uppercase();
        }
        if let Ok(v) = env::var("PAYMENTS_SUCCESS_URL") {
            self.payments.success_url = v;
        }
        if let Ok(v) = env::var("PAYMENTS_CANCEL_URL") {
            self.payments.cancel_url = v;
        }

        // Email overrides
        if let Ok(v) = env::var("EMAIL_API_URL") {
            self.email.api_url = v;
        }
        if let Ok(v) = env::var("EMAIL_API_KEY") {
            self.email.api_key = non_empty(v);
        }
        if let Ok(v) = env::var("EMAIL_FROM_ADDRESS") {
            self.email.from_address = v;
        }

        // Monitoring overrides
        if let Ok(v) = env::var("MONITORING_MAX_METRICS") {
            self.monitoring.max_metrics = v.parse().unwrap_or(self.monitoring.max_metrics);
        }
        if let Ok(v) = env::var("MONITORING_MAX_ERRORS") {
            self.monitoring.max_errors = v.parse().unwrap_or(self.monitoring.max_errors);
        }
        if let Ok(v) = env::var("MONITORING_ERROR_THRESHOLD_PER_MINUTE") {
            self.monitoring.error_threshold_per_minute = v.parse().unwrap_or(self.monitoring.error_threshold_per_minute);
        }
        if let Ok(v) = env::var("MONITORING_ERROR_RATE_THRESHOLD") {
            self.monitoring.error_rate_threshold = v.parse().unwrap_or(self.monitoring.error_rate_threshold);
        }
        if let Ok(v) = env::var("MONITORING_SLOW_RESPONSE_MS") {
            self.monitoring.slow_response_ms = v.parse().unwrap_or(self.monitoring.slow_response_ms);
        }
        if let Ok(v) = env::var("MONITORING_RETENTION_SECS") {
            self.monitoring.retention_secs = v.parse().unwrap_or(self.monitoring.retention_secs);
        }
        if let Ok(v) = env::var("MONITORING_CLEANUP_INTERVAL_SECS") {
            self.monitoring.cleanup_interval_secs = v.parse().unwrap_or(self.monitoring.cleanup_interval_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            site: SiteConfig {
                name: "Folio".to_string(),
                base_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                slow_query_threshold_ms: 100,
                max_list_limit: 100,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 60,
                auth_rate_limit_requests: 10,
                auth_rate_limit_window_secs: 60,
                webhook_rate_limit_requests: 300,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "folio-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                refresh_window_hours: 24 * 7,
                trusted_proxies: Vec::new(),
            },
            payments: PaymentConfig::defaults("http://localhost:3000"),
            email: EmailConfig {
                api_url: "https://api.resend.com/emails".to_string(),
                api_key: None,
                from_address: "Folio <no-reply@localhost>".to_string(),
            },
            monitoring: MonitoringConfig {
                max_metrics: 1000,
                max_errors: 100,
                error_threshold_per_minute: 50,
                error_rate_threshold: 0.25,
                slow_response_ms: 2000.0,
                retention_secs: 60 * 60,
                cleanup_interval_secs: 5 * 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            site: SiteConfig {
                name: "Folio (staging)".to_string(),
                base_url: "https://staging.example.com".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                slow_query_threshold_ms: 500,
                max_list_limit: 100,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 300,
                rate_limit_window_secs: 60,
                auth_rate_limit_requests: 10,
                auth_rate_limit_window_secs: 60,
                webhook_rate_limit_requests: 300,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                refresh_window_hours: 24 * 3,
                trusted_proxies: Vec::new(),
            },
            payments: PaymentConfig::defaults("https://staging.example.com"),
            email: EmailConfig {
                api_url: "https://api.resend.com/emails".to_string(),
                api_key: None,
                from_address: "Folio <no-reply@staging.example.com>".to_string(),
            },
            monitoring: MonitoringConfig {
                max_metrics: 1000,
                max_errors: 100,
                error_threshold_per_minute: 20,
                error_rate_threshold: 0.1,
                slow_response_ms: 1500.0,
                retention_secs: 60 * 60,
                cleanup_interval_secs: 5 * 60,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            site: SiteConfig {
                name: "Folio".to_string(),
                base_url: "https://app.example.com".to_string(),
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                slow_query_threshold_ms: 1000,
                max_list_limit: 50,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 120,
                rate_limit_window_secs: 60,
                auth_rate_limit_requests: 5,
                auth_rate_limit_window_secs: 60,
                webhook_rate_limit_requests: 600,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                refresh_window_hours: 24,
                trusted_proxies: Vec::new(),
            },
            payments: PaymentConfig::defaults("https://app.example.com"),
            email: EmailConfig {
                api_url: "https://api.resend.com/emails".to_string(),
                api_key: None,
                from_address: "Folio <no-reply@example.com>".to_string(),
            },
            monitoring: MonitoringConfig {
                max_metrics: 5000,
                max_errors: 500,
                error_threshold_per_minute: 10,
                error_rate_threshold: 0.05,
                slow_response_ms: 1000.0,
                retention_secs: 2 * 60 * 60,
                cleanup_interval_secs: 60,
            },
        }
    }
}

impl PaymentConfig {
    fn defaults(base_url: &str) -> Self {
        Self {
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            paystack_secret_key: None,
            paystack_api_base: "https://api.paystack.co".to_string(),
            default_provider: "stripe".to_string(),
            default_currency: "USD".to_string(),
            success_url: format!("{}/checkout/success", base_url),
            cancel_url: format!("{}/checkout/cancel", base_url),
        }
    }
}

/// Comma separated addresses; entries that do not parse are skipped with a warning
fn parse_ip_list(value: &str) -> Vec<IpAddr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!("Ignoring invalid trusted proxy address: {}", s);
                None
            }
        })
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
