use std::path::PathBuf;

use anyhow::{Context, Result};

/// Secret used when `QUILL_SECRET_KEY` is unset. Fine for local runs only.
pub const DEV_SECRET: &str = "dev-secret-change-me";

/// Ten years; keeps session expiry arithmetic well inside chrono's range.
pub const MAX_SESSION_TTL_HOURS: i64 = 87_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub secret_key: String,
    pub session_ttl_hours: i64,
    pub session_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = get("QUILL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("QUILL_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("QUILL_PORT must be a port number")?;
        let db_path: PathBuf = get("QUILL_DB_PATH").unwrap_or_else(|| "blog.db".into()).into();
        let secret_key = get("QUILL_SECRET_KEY")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEV_SECRET.into());
        let session_ttl_hours: i64 = get("QUILL_SESSION_TTL_HOURS")
            .unwrap_or_else(|| "720".into()) // 30 days
            .parse()
            .context("QUILL_SESSION_TTL_HOURS must be an integer")?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            anyhow::bail!("QUILL_SESSION_TTL_HOURS must be between 1 and {}", MAX_SESSION_TTL_HOURS);
        }
        let session_sweep_secs: u64 = get("QUILL_SESSION_SWEEP_SECS")
            .unwrap_or_else(|| "3600".into())
            .parse()
            .context("QUILL_SESSION_SWEEP_SECS must be an integer")?;

        Ok(Self {
            host,
            port,
            db_path,
            secret_key,
            session_ttl_hours,
            session_sweep_secs: session_sweep_secs.max(1),
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.port, 3000);
        assert_eq!(c.db_path, PathBuf::from("blog.db"));
        assert_eq!(c.session_ttl_hours, 720);
        assert_eq!(c.session_sweep_secs, 3600);
        assert!(c.uses_dev_secret());
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("QUILL_PORT", "8080"),
            ("QUILL_DB_PATH", "/tmp/q.db"),
            ("QUILL_SECRET_KEY", "s3cret"),
            ("QUILL_SESSION_TTL_HOURS", "2"),
        ])
        .unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.db_path, PathBuf::from("/tmp/q.db"));
        assert!(!c.uses_dev_secret());
        assert_eq!(c.session_ttl_hours, 2);
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(config(&[("QUILL_PORT", "http")]).is_err());
        assert!(config(&[("QUILL_SESSION_TTL_HOURS", "0")]).is_err());
        assert!(config(&[("QUILL_SESSION_TTL_HOURS", "87601")]).is_err());
        assert!(config(&[("QUILL_SESSION_TTL_HOURS", "9223372036854775807")]).is_err());
        assert!(config(&[("QUILL_SESSION_TTL_HOURS", "87600")]).is_ok());
        assert!(config(&[("QUILL_SESSION_SWEEP_SECS", "-5")]).is_err());
    }
}
