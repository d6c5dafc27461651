use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_version: String,
}

/// Deployment environment. Dev-only routes are mounted in `Development`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub environment: Environment,
    /// Base URL of the storefront, used for links in outgoing email.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expires_in: String,
    pub admin_email: String,
    pub admin_password: String,
    pub cookie_secure: Option<bool>,
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"[redacted]")
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"[redacted]")
            .field("cookie_secure", &self.cookie_secure)
            .field("enable_hsts", &self.enable_hsts)
            .field("hsts_max_age", &self.hsts_max_age)
            .field("hsts_include_subdomains", &self.hsts_include_subdomains)
            .field("csp", &self.csp)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: usize,
    /// Key clients on `X-Forwarded-For`/`X-Real-IP`. Only enable behind a
    /// reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy: bool,
}

#[derive(Clone, Deserialize)]
pub struct EmailConfig {
    /// Empty disables outbound email.
    pub api_key: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub api_base: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &"[redacted]")
            .field("from", &self.from)
            .field("reply_to", &self.reply_to)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Empty disables the payment gateway.
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
    pub api_base: String,
}

impl fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[redacted]")
            .field("currency", &self.currency)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    pub shipping_cost: f64,
    /// Create orders as already paid. Meant for local development only.
    pub skip_payment: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub app: AppSection,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub email: EmailConfig,
    pub payments: PaymentsConfig,
    pub orders: OrdersConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.app.environment == Environment::Development
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }

    /// `/api/v1` style prefix all routes are mounted under.
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.server.api_version)
    }

    pub fn cookie_secure(&self) -> bool {
        self.security.cookie_secure.unwrap_or_else(|| self.is_production())
    }

    /// Parsed token lifetime. Falls back to seven days if the configured value
    /// is unparsable; `validate` rejects that case at startup.
    pub fn token_ttl(&self) -> Duration {
        parse_duration(&self.security.jwt_expires_in).unwrap_or(Duration::from_secs(7 * 24 * 3600))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => panic!("Failed to deserialize default config: {}", e),
            },
            Err(e) => panic!("Failed to parse default config: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: crestsports.toml (in CWD)
        .add_source(::config::File::with_name("crestsports").required(false));

    if let Ok(custom_path) = std::env::var("CRESTSPORTS_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(
        ::config::Environment::with_prefix("CRESTSPORTS")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cors.origins"),
    );

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Layers `overrides` on top of the embedded defaults and validates the result.
pub fn from_toml_str(overrides: &str) -> anyhow::Result<AppConfig> {
    let cfg = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        .add_source(::config::File::from_str(overrides, ::config::FileFormat::Toml))
        .build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    let version = cfg.server.api_version.trim();
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(anyhow::anyhow!("invalid server.api_version: {:?}", cfg.server.api_version));
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Security
    let sec = &cfg.security;
    if sec.jwt_secret.len() < 32 {
        return Err(anyhow::anyhow!("security.jwt_secret must be at least 32 characters"));
    }
    if parse_duration(&sec.jwt_expires_in).is_none() {
        return Err(anyhow::anyhow!("invalid security.jwt_expires_in: {:?}", sec.jwt_expires_in));
    }
    if !looks_like_email(&sec.admin_email) {
        return Err(anyhow::anyhow!("security.admin_email must be a valid email address"));
    }
    if sec.admin_password.len() < 8 {
        return Err(anyhow::anyhow!("security.admin_password must be at least 8 characters"));
    }

    if cfg.cors.origins.iter().any(|o| o.trim().is_empty() || o.trim() == "*") {
        return Err(anyhow::anyhow!("cors.origins must list explicit origins"));
    }

    // Rate limiting
    if cfg.rate_limit.window_ms < 1000 {
        return Err(anyhow::anyhow!("rate_limit.window_ms must be >= 1000"));
    }
    if cfg.rate_limit.max_requests == 0 {
        return Err(anyhow::anyhow!("rate_limit.max_requests must be > 0"));
    }

    if !cfg.email.api_key.is_empty() && !looks_like_email(&cfg.email.from) {
        return Err(anyhow::anyhow!("email.from must be a valid email address"));
    }
    if cfg.payments.key_id.is_empty() != cfg.payments.key_secret.is_empty() {
        return Err(anyhow::anyhow!("payments.key_id and payments.key_secret must be set together"));
    }
    if !cfg.orders.shipping_cost.is_finite() || cfg.orders.shipping_cost < 0.0 {
        return Err(anyhow::anyhow!("orders.shipping_cost must be a non-negative number"));
    }
    if cfg.orders.skip_payment && cfg.is_production() {
        return Err(anyhow::anyhow!("orders.skip_payment is not allowed in production"));
    }

    Ok(())
}

/// Parses lifetimes like `7d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        "w" => 7 * 86_400,
        _ => return None,
    };
    let secs = value.checked_mul(multiplier)?;
    if secs == 0 {
        return None;
    }
    Some(Duration::from_secs(secs))
}

fn looks_like_email(s: &str) -> bool {
    crate::error::validation::is_valid_email(s)
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path == ":memory:" {
            return Ok(());
        }
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
