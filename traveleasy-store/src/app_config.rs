use serde::Deserialize;
use std::env;
use traveleasy_core::credentials::DEFAULT_HASH_COST;
use traveleasy_core::pricing::DEFAULT_RATE_PER_KM;
use traveleasy_shared::Masked;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// No database section means the in-memory store.
    pub database: Option<DatabaseConfig>,
    /// No redis section means per-process rate limiting.
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    /// No mail section means verification codes are only logged.
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_rate_per_km")]
    pub rate_per_km: f64,
    #[serde(default = "default_verify_attempts")]
    pub verify_attempt_limit: i64,
    #[serde(default = "default_verify_window")]
    pub verify_window_seconds: i64,
    #[serde(default = "default_login_attempts")]
    pub login_attempt_limit: i64,
    #[serde(default = "default_login_window")]
    pub login_window_seconds: i64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            rate_per_km: default_rate_per_km(),
            verify_attempt_limit: default_verify_attempts(),
            verify_window_seconds: default_verify_window(),
            login_attempt_limit: default_login_attempts(),
            login_window_seconds: default_login_window(),
        }
    }
}

fn default_rate_per_km() -> f64 { DEFAULT_RATE_PER_KM }
fn default_verify_attempts() -> i64 { 5 }
fn default_verify_window() -> i64 { 900 }
fn default_login_attempts() -> i64 { 10 }
fn default_login_window() -> i64 { 300 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Masked<String>,
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_seconds: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_jwt_expiration() -> u64 { 7 * 24 * 60 * 60 }
fn default_bcrypt_cost() -> u32 { DEFAULT_HASH_COST }

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Masked<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Masked<String>,
    /// Falls back to `username`.
    pub from_email: Option<String>,
}

impl MailConfig {
    pub fn sender(&self) -> &str {
        self.from_email.as_deref().unwrap_or(&self.username)
    }
}

/// Shipped in `config/default.toml`; only acceptable in development.
pub const DEV_JWT_SECRET: &str = "dev-only-change-me";

/// `TRAVELEASY_AUTH__JWT_SECRET=...` sets `auth.jwt_secret`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("TRAVELEASY")
        .prefix_separator("_")
        .separator("__")
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment specific overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        let cfg: Config = s.try_deserialize()?;
        cfg.check_secret(&run_mode)?;
        Ok(cfg)
    }

    /// Refuses the development JWT secret outside development.
    pub fn check_secret(&self, run_mode: &str) -> Result<(), config::ConfigError> {
        if run_mode != "development" && self.auth.jwt_secret.expose() == DEV_JWT_SECRET {
            return Err(config::ConfigError::Message(format!(
                "auth.jwt_secret still has the development value in {} mode; set TRAVELEASY_AUTH__JWT_SECRET",
                run_mode
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 3000

                [auth]
                jwt_secret = "dev-secret"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.database.is_none());
        assert!(cfg.mail.is_none());
        assert_eq!(cfg.auth.jwt_expiration_seconds, 604_800);
        assert_eq!(cfg.auth.bcrypt_cost, 10);
        assert_eq!(cfg.business_rules.rate_per_km, 26.0);
        assert_eq!(cfg.business_rules.verify_attempt_limit, 5);
    }

    fn with_env(vars: &[(&str, &str)]) -> Config {
        let overrides = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        config::Config::builder()
            .add_source(config::File::from_str(
                &format!("[server]\nport = 3000\n\n[auth]\njwt_secret = \"{}\"\n", DEV_JWT_SECRET),
                config::FileFormat::Toml,
            ))
            .add_source(environment().source(Some(overrides)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        let cfg = with_env(&[
            ("TRAVELEASY_AUTH__JWT_SECRET", "from-env"),
            ("TRAVELEASY_SERVER__PORT", "4321"),
        ]);
        assert_eq!(cfg.auth.jwt_secret.expose(), "from-env");
        assert_eq!(cfg.server.port, 4321);
    }

    #[test]
    fn test_dev_secret_rejected_outside_development() {
        let cfg = with_env(&[]);
        assert!(cfg.check_secret("development").is_ok());
        assert!(cfg.check_secret("production").is_err());

        let cfg = with_env(&[("TRAVELEASY_AUTH__JWT_SECRET", "a-real-secret")]);
        assert!(cfg.check_secret("production").is_ok());
    }

    #[test]
    fn test_mail_sender_falls_back_to_username() {
        let mail = MailConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "noreply@example.com".into(),
            password: Masked("pw".into()),
            from_email: None,
        };
        assert_eq!(mail.sender(), "noreply@example.com");
        assert_eq!(format!("{:?}", mail.password), "********");
    }
}
