//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use anyhow::Context;
use b2_pipeline::{Credentials, DEFAULT_AUTH_BASE_URL};
use tracing::Level;

/// Bucket used in development when `B2_BUCKET_NAME` is unset
const DEVELOPMENT_BUCKET: &str = "uploads";

/// Default server-side deadline for a request, upload included
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default cap on request bodies (50 MiB)
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment
    Development {
        /// Optional B2-compatible authorization host
        b2_api_url_override: Option<String>,
    },
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => {
                let b2_api_url_override = env::var("B2_API_URL")
                    .ok()
                    .filter(|url| !url.trim().is_empty());

                Self::Development {
                    b2_api_url_override,
                }
            }
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// B2 credentials and target bucket
    ///
    /// # Errors
    ///
    /// Returns an error if the key ID or key is unset, or if the bucket name is unset
    /// outside development
    pub fn b2_credentials(&self) -> anyhow::Result<Credentials> {
        let key_id = env::var("B2_APPLICATION_KEY_ID")
            .context("B2_APPLICATION_KEY_ID environment variable is not set")?;
        let key = env::var("B2_APPLICATION_KEY")
            .context("B2_APPLICATION_KEY environment variable is not set")?;

        let bucket_name = match self {
            Self::Production | Self::Staging => env::var("B2_BUCKET_NAME")
                .context("B2_BUCKET_NAME environment variable is not set")?,
            Self::Development { .. } => {
                env::var("B2_BUCKET_NAME").unwrap_or_else(|_| DEVELOPMENT_BUCKET.to_string())
            }
        };

        Ok(Credentials::new(key_id, key, bucket_name))
    }

    /// Host used for account authorization
    #[must_use]
    pub fn b2_auth_base_url(&self) -> &str {
        match self {
            Self::Production | Self::Staging => DEFAULT_AUTH_BASE_URL,
            Self::Development {
                b2_api_url_override,
            } => b2_api_url_override
                .as_deref()
                .unwrap_or(DEFAULT_AUTH_BASE_URL),
        }
    }

    /// Port the server listens on
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but not a valid port number
    #[allow(clippy::unused_self)]
    pub fn port(&self) -> anyhow::Result<u16> {
        env::var("PORT").map_or(Ok(8001), |p| {
            p.parse().with_context(|| format!("Invalid PORT: {p}"))
        })
    }

    /// Deadline imposed on every request
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn request_timeout(&self) -> Duration {
        let secs = env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Largest accepted request body in bytes
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn max_upload_bytes(&self) -> usize {
        env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }

    /// Whether permissive cross-origin headers are added
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn cors_enabled(&self) -> bool {
        env::var("CORS_ENABLED")
            .ok()
            .and_then(|val| val.trim().parse::<bool>().ok())
            .unwrap_or(true)
    }

    /// Whether logs are emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Default log level when `RUST_LOG` is unset
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development { .. } => Level::DEBUG,
            })
    }
}
