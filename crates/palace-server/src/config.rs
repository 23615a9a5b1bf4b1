use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use palace_notify::smtp::SmtpConfig;

/// Placeholder session secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

const DEFAULT_BRAND: &str = "The African Palace";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub base_url: String,
    pub production: bool,
    pub static_dir: Option<PathBuf>,
    pub brand_name: String,
    /// `None` when host or sender is missing; mail is logged instead.
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("PALACE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PALACE_JWT_SECRET is unset or still a placeholder");
        }

        let host = get("PALACE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("PALACE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("PALACE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let base_url = get("PALACE_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();

        let brand_name = get("PALACE_BRAND_NAME").unwrap_or_else(|| DEFAULT_BRAND.into());

        let smtp = match (get("PALACE_SMTP_HOST"), get("PALACE_SMTP_FROM")) {
            (Some(host), Some(from_address)) => Some(SmtpConfig {
                host,
                port: get("PALACE_SMTP_PORT")
                    .map(|p| p.parse::<u16>())
                    .transpose()
                    .context("PALACE_SMTP_PORT must be a port number")?
                    .unwrap_or(587),
                username: get("PALACE_SMTP_USERNAME"),
                password: get("PALACE_SMTP_PASSWORD"),
                from_address,
                from_name: brand_name.clone(),
                tls: get("PALACE_SMTP_TLS")
                    .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no"))
                    .unwrap_or(true),
            }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            db_path: get("PALACE_DB_PATH").unwrap_or_else(|| "palace.db".into()).into(),
            addr,
            base_url,
            production: get("PALACE_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production")),
            static_dir: get("PALACE_STATIC_DIR").map(PathBuf::from),
            brand_name,
            smtp,
        })
    }
}
