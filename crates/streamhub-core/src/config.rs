//! Configuration module
//!
//! Environment-driven configuration for the API: server, database, token
//! signing, object storage, the transcoding service, the payment gateway and
//! the notification channels. `.env` files are honoured through `dotenvy`.

use std::env;

// Common constants
const SERVER_PORT: u16 = 5000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_DAYS: i64 = 7;
const RATE_LIMIT_MAX_REQUESTS: u32 = 100;
const RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;
const MIN_PRODUCTION_SECRET_LEN: usize = 32;
const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Base configuration: HTTP server, database and request admission.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_days: i64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
    pub trusted_proxy_count: usize,
}

/// Object storage and transcoding settings.
#[derive(Clone, Debug, Default)]
pub struct MediaConfig {
    pub aws_region: Option<String>,
    pub s3_bucket: String,
    /// Public base URL of the bucket, used to build playlist and thumbnail URLs.
    pub s3_bucket_url: String,
    /// Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub s3_endpoint: Option<String>,
    pub mediaconvert_endpoint: Option<String>,
    pub mediaconvert_role: String,
    pub mediaconvert_queue: Option<String>,
}

/// Stripe settings.
#[derive(Clone, Debug, Default)]
pub struct PaymentConfig {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub currency: String,
}

/// Email, SMS and OAuth settings.
#[derive(Clone, Debug, Default)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_tls: bool,
    pub sms_api_url: Option<String>,
    pub sms_api_key: Option<String>,
    pub sms_sender: Option<String>,
    pub google_client_ids: Vec<String>,
    pub apple_client_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct StreamHubConfig {
    pub base: BaseConfig,
    pub media: MediaConfig,
    pub payment: PaymentConfig,
    pub notification: NotificationConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<StreamHubConfig>);

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn csv(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_expiry_days: parse_or("JWT_EXPIRY_DAYS", JWT_EXPIRY_DAYS),
            rate_limit_max_requests: parse_or("RATE_LIMIT_MAX_REQUESTS", RATE_LIMIT_MAX_REQUESTS),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW_SECS", RATE_LIMIT_WINDOW_SECS),
            trusted_proxy_count: parse_or("TRUSTED_PROXY_COUNT", 0),
        };

        let media = MediaConfig {
            aws_region: non_empty("AWS_REGION"),
            s3_bucket: env::var("AWS_S3_BUCKET").unwrap_or_default(),
            s3_bucket_url: env::var("AWS_S3_BUCKET_URL")
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            mediaconvert_endpoint: non_empty("AWS_MEDIACONVERT_ENDPOINT"),
            mediaconvert_role: env::var("AWS_MEDIACONVERT_ROLE").unwrap_or_default(),
            mediaconvert_queue: non_empty("AWS_MEDIACONVERT_QUEUE"),
        };

        let payment = PaymentConfig {
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| STRIPE_API_BASE.to_string()),
            currency: env::var("PAYMENT_CURRENCY")
                .unwrap_or_else(|_| "usd".to_string())
                .to_lowercase(),
        };

        let notification = NotificationConfig {
            smtp_host: non_empty("SMTP_HOST"),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&p| p > 0),
            smtp_user: non_empty("SMTP_USER"),
            smtp_password: non_empty("SMTP_PASSWORD"),
            smtp_from: non_empty("SMTP_FROM"),
            smtp_tls: parse_or("SMTP_TLS", true),
            sms_api_url: non_empty("SMS_API_URL"),
            sms_api_key: non_empty("SMS_API_KEY"),
            sms_sender: non_empty("SMS_SENDER"),
            google_client_ids: csv("GOOGLE_CLIENT_IDS"),
            apple_client_ids: csv("APPLE_CLIENT_IDS"),
        };

        Ok(Config(Box::new(StreamHubConfig {
            base,
            media,
            payment,
            notification,
        })))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        matches!(
            self.0.base.environment.to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let base = &self.0.base;
        if base.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL cannot be empty");
        }
        if base.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET cannot be empty");
        }
        if base.rate_limit_max_requests == 0 || base.rate_limit_window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_MAX_REQUESTS and RATE_LIMIT_WINDOW_SECS must be positive");
        }
        if self.is_production() {
            if base.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
                anyhow::bail!(
                    "JWT_SECRET must be at least {} characters in production",
                    MIN_PRODUCTION_SECRET_LEN
                );
            }
            if base.cors_origins.iter().any(|o| o == "*") {
                anyhow::bail!(
                    "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
                );
            }
            if self.0.media.s3_bucket.is_empty() || self.0.media.s3_bucket_url.is_empty() {
                anyhow::bail!("AWS_S3_BUCKET and AWS_S3_BUCKET_URL must be set in production");
            }
            if self.0.payment.stripe_webhook_secret.is_empty() {
                anyhow::bail!("STRIPE_WEBHOOK_SECRET must be set in production");
            }
        }
        Ok(())
    }

    pub fn base(&self) -> &BaseConfig {
        &self.0.base
    }

    pub fn media(&self) -> &MediaConfig {
        &self.0.media
    }

    pub fn payment(&self) -> &PaymentConfig {
        &self.0.payment
    }

    pub fn notification(&self) -> &NotificationConfig {
        &self.0.notification
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.0.base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.0.base.environment
    }

    pub fn database_url(&self) -> &str {
        &self.0.base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.0.base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.0.base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.0.base.jwt_secret
    }

    pub fn jwt_expiry_days(&self) -> i64 {
        self.0.base.jwt_expiry_days
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.0.base.cors_origins
    }

    pub fn rate_limit_max_requests(&self) -> u32 {
        self.0.base.rate_limit_max_requests
    }

    pub fn rate_limit_window_secs(&self) -> u64 {
        self.0.base.rate_limit_window_secs
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.0.base.trusted_proxy_count
    }

    pub fn s3_bucket(&self) -> &str {
        &self.0.media.s3_bucket
    }

    pub fn s3_bucket_url(&self) -> &str {
        &self.0.media.s3_bucket_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(environment: &str, secret: &str, cors: &[&str]) -> Config {
        Config(Box::new(StreamHubConfig {
            base: BaseConfig {
                server_port: 5000,
                environment: environment.to_string(),
                cors_origins: cors.iter().map(|s| s.to_string()).collect(),
                database_url: "postgres://localhost/streamhub".to_string(),
                db_max_connections: 5,
                db_timeout_seconds: 5,
                jwt_secret: secret.to_string(),
                jwt_expiry_days: 7,
                rate_limit_max_requests: 100,
                rate_limit_window_secs: 900,
                trusted_proxy_count: 0,
            },
            media: MediaConfig {
                s3_bucket: "media".to_string(),
                s3_bucket_url: "https://media.example.com".to_string(),
                ..Default::default()
            },
            payment: PaymentConfig {
                stripe_webhook_secret: "whsec_test".to_string(),
                ..Default::default()
            },
            notification: NotificationConfig::default(),
        }))
    }

    #[test]
    fn development_accepts_wildcard_cors_and_short_secret() {
        let config = config_with("development", "short", &["*"]);
        assert!(config.validate().is_ok());
        assert!(!config.is_production());
    }

    #[test]
    fn production_rejects_short_secret() {
        let config = config_with("production", "short", &["https://app.example.com"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn production_rejects_wildcard_cors() {
        let secret = "x".repeat(40);
        let config = config_with("prod", &secret, &["*"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("CORS_ORIGINS"));
    }

    #[test]
    fn production_with_explicit_settings_is_valid() {
        let secret = "x".repeat(40);
        let config = config_with("production", &secret, &["https://app.example.com"]);
        assert!(config.validate().is_ok());
    }
}
