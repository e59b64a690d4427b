//! Process configuration (Section 6, "Configuration (environment)").
//!
//! Read once at startup from `std::env`; read-only for the rest of the
//! process lifetime (Section 5, "Configuration is read-only after process
//! start"). `MONGO_URI` and the TLS file paths are accepted and carried for
//! operational parity with the configuration surface named in Section 6 but
//! are not wired to anything: this repository uses SQLite for persistence
//! (see `relay-db`) and expects a reverse proxy to terminate TLS.

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub app_host: String,
    pub app_port: u16,
    /// Accepted for configuration-surface parity; unused (persistence is
    /// SQLite via `relay-db`, not Mongo).
    pub mongo_uri: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: Option<u16>,
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    pub jwt_expires_in: String,
    pub jwt_refresh_expires_in: String,
    pub auth_salt: String,
    pub chat_per_page: u32,
    pub chat_history: u32,
    pub chat_max_pins: usize,
    /// Accepted for configuration-surface parity; unused (see module doc).
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl DaemonConfig {
    /// Loads configuration from the process environment, falling back to
    /// the defaults named in Section 6 for everything but the secrets.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(DaemonConfig {
            app_host: env_or("APP_HOST", "0.0.0.0"),
            app_port: env_or("APP_PORT", "8080").parse()?,
            mongo_uri: std::env::var("MONGO_URI").ok(),
            redis_host: std::env::var("REDIS_HOST").ok(),
            redis_port: std::env::var("REDIS_PORT").ok().map(|v| v.parse()).transpose()?,
            redis_uri: std::env::var("REDIS_URI").ok(),
            jwt_secret: require_env("JWT_SECRET")?,
            jwt_expires_in: env_or("JWT_EXPIRES_IN", "15m"),
            jwt_refresh_expires_in: env_or("JWT_REFRESH_EXPIRES_IN", "7d"),
            auth_salt: require_env("AUTH_SALT")?,
            chat_per_page: env_or("CHAT_PER_PAGE", "10").parse()?,
            chat_history: env_or("CHAT_HISTORY", "20").parse()?,
            chat_max_pins: env_or("CHAT_MAX_PINS", "5").parse()?,
            tls_cert_path: std::env::var("TLS_CERT_PATH").ok(),
            tls_key_path: std::env::var("TLS_KEY_PATH").ok(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }

    /// Where the SQLite file lives. Not itself a Section 6 variable — the
    /// closest analog there is `MONGO_URI`, which this repository doesn't
    /// use; `RELAY_DB_PATH` is this repository's own addition.
    pub fn db_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(env_or("RELAY_DB_PATH", "relay.db"))
    }

    /// `jwt_expires_in` as a number of seconds, for signing the cookie
    /// issued on `PUT /user/add`.
    pub fn jwt_expires_in_secs(&self) -> anyhow::Result<i64> {
        parse_duration_secs(&self.jwt_expires_in)
    }
}

/// Parses a short duration string like `"15m"`, `"7d"`, `"30s"`, `"2h"` into
/// seconds. Section 6 names `JWT_EXPIRES_IN`/`JWT_REFRESH_EXPIRES_IN` with
/// this shape but doesn't pin a format; this matches the common
/// `jsonwebtoken`-adjacent convention of a trailing unit letter.
fn parse_duration_secs(s: &str) -> anyhow::Result<i64> {
    let s = s.trim();
    let (number, unit) = s.split_at(s.len() - 1);
    let n: i64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration `{s}`"))?;
    let secs = match unit {
        "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        "d" => n * 86400,
        other => anyhow::bail!("unknown duration unit `{other}` in `{s}`"),
    };
    Ok(secs)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("missing required environment variable `{key}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_required_env<T>(f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("JWT_SECRET", "test-secret");
        std::env::set_var("AUTH_SALT", "test-salt");
        let result = f();
        std::env::remove_var("JWT_SECRET");
        std::env::remove_var("AUTH_SALT");
        result
    }

    #[test]
    fn defaults_match_section_6() {
        with_required_env(|| {
            let config = DaemonConfig::from_env().expect("load");
            assert_eq!(config.chat_per_page, 10);
            assert_eq!(config.chat_history, 20);
            assert_eq!(config.chat_max_pins, 5);
            assert_eq!(config.app_port, 8080);
        });
    }

    #[test]
    fn parses_minute_and_day_durations() {
        assert_eq!(parse_duration_secs("15m").unwrap(), 900);
        assert_eq!(parse_duration_secs("7d").unwrap(), 604_800);
    }

    #[test]
    fn missing_jwt_secret_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("JWT_SECRET");
        std::env::set_var("AUTH_SALT", "test-salt");
        let result = DaemonConfig::from_env();
        std::env::remove_var("AUTH_SALT");
        assert!(result.is_err());
    }
}
