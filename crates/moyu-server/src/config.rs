use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;

use moyu_api::payment::SNAP_SANDBOX_URL;

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

/// Ten years.
const MAX_TOKEN_TTL_HOURS: i64 = 10 * 365 * 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: TimeDelta,
    pub upload_dir: PathBuf,
    pub payment_server_key: Option<String>,
    pub payment_snap_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = match var("MOYU_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        let jwt_secret = match var("MOYU_JWT_SECRET") {
            Some(secret) => secret,
            None if environment == Environment::Development => DEV_SECRET.to_string(),
            None => bail!("MOYU_JWT_SECRET must be set in production"),
        };
        if environment == Environment::Production && PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MOYU_JWT_SECRET is still a placeholder");
        }

        let port = var("MOYU_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("MOYU_PORT must be a port number")?;

        let token_ttl_hours = var("MOYU_TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "720".into())
            .parse::<i64>()
            .context("MOYU_TOKEN_TTL_HOURS must be a number of hours")?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            bail!(
                "MOYU_TOKEN_TTL_HOURS must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            );
        }
        let token_ttl = TimeDelta::try_hours(token_ttl_hours)
            .context("MOYU_TOKEN_TTL_HOURS is out of range")?;

        let payment_server_key = var("MIDTRANS_SERVER_KEY");
        if environment == Environment::Production && payment_server_key.is_none() {
            bail!("MIDTRANS_SERVER_KEY must be set in production");
        }

        Ok(Self {
            environment,
            host: var("MOYU_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("MOYU_DB_PATH").unwrap_or_else(|| "moyu.db".into()).into(),
            jwt_secret,
            token_ttl,
            upload_dir: var("MOYU_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into()).into(),
            payment_server_key,
            payment_snap_url: var("MIDTRANS_SNAP_URL").unwrap_or_else(|| SNAP_SANDBOX_URL.into()),
        })
    }
}
