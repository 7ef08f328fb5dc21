const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_ADMIN_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string. Unset means the in-memory store.
    pub database_url: Option<String>,
    /// Shared administrator secret (`X-Admin-Key` / `Authorization: Bearer`).
    pub admin_key: String,
    /// Kiosk page the distributable URL points at; `?token=` is appended.
    pub public_url: String,
    /// Seconds between store refreshes. 0 = disabled.
    /// Set via CHECKIN_REFRESH_SECS. Default: 5.
    pub refresh_interval_secs: u64,
    /// How long submission idempotency keys are remembered.
    pub idempotency_ttl_secs: u64,
    pub kiosk_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            admin_key: PLACEHOLDER_ADMIN_KEY.into(),
            public_url: "http://localhost:8080/kiosk".into(),
            refresh_interval_secs: 5,
            idempotency_ttl_secs: 600,
            kiosk_origin: "http://localhost:3000".into(),
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the config from any key lookup (the process environment in `load`).
pub fn from_lookup<F>(get: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let admin_key = get("CHECKIN_ADMIN_KEY").unwrap_or_else(|| PLACEHOLDER_ADMIN_KEY.into());
    if admin_key == PLACEHOLDER_ADMIN_KEY {
        let env_mode = get("CHECKIN_ENV")
            .or_else(|| get("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "CHECKIN_ADMIN_KEY is still the insecure placeholder. \
                 Set a proper admin key before running in production."
            );
        }
        tracing::warn!("CHECKIN_ADMIN_KEY is not set, using insecure placeholder");
    }

    Ok(Config {
        port: get("CHECKIN_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port),
        database_url: get("DATABASE_URL").filter(|v| !v.trim().is_empty()),
        admin_key,
        public_url: get("CHECKIN_PUBLIC_URL").unwrap_or(defaults.public_url),
        refresh_interval_secs: get("CHECKIN_REFRESH_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.refresh_interval_secs),
        idempotency_ttl_secs: get("CHECKIN_IDEMPOTENCY_TTL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.idempotency_ttl_secs),
        kiosk_origin: get("KIOSK_ORIGIN").unwrap_or(defaults.kiosk_origin),
    })
}
