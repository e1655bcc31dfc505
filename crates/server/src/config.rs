use sk_auth::Google;
use sk_auth::Providers;

/// Process configuration. Every flag can also come from its environment variable.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "skullking", about = "Skull King scorekeeping API server")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: String,
    /// PostgreSQL connection string.
    #[arg(long, env = "DB_URL", hide_env_values = true)]
    pub db_url: String,
    /// Idle database connections to keep.
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = sk_core::POOL_SIZE)]
    pub pool: usize,
    /// Key for signing session cookies.
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: String,
    /// `production` enables secure cookies.
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub app_env: String,
    /// Public URL of this API, used for OAuth callbacks.
    #[arg(long, env = "APP_BASE_URL", default_value = "http://localhost:8080")]
    pub app_base_url: String,
    /// Public URL of the web frontend.
    #[arg(long, env = "FRONTEND_BASE_URL", default_value = "http://localhost:5173")]
    pub frontend_base_url: String,
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,
    /// Sustained requests per second per client.
    #[arg(long, env = "RATE_LIMIT", default_value_t = sk_core::RATE_LIMIT)]
    pub rate: f64,
    /// Requests a client may burst above the sustained rate.
    #[arg(long, env = "RATE_BURST", default_value_t = sk_core::RATE_BURST)]
    pub burst: u32,
    #[arg(long, env = "WORKERS", default_value_t = 4)]
    pub workers: usize,
}

impl Config {
    pub fn secure(&self) -> bool {
        self.app_env == "production"
    }
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.session_secret.is_empty(), "SESSION_SECRET must not be empty");
        anyhow::ensure!(self.rate > 0.0, "RATE_LIMIT must be positive");
        anyhow::ensure!(self.burst > 0, "RATE_BURST must be positive");
        Ok(())
    }
    /// OAuth providers with complete credentials.
    pub fn providers(&self) -> anyhow::Result<Providers> {
        let mut providers = Providers::default();
        match (&self.google_client_id, &self.google_client_secret) {
            (Some(id), Some(secret)) => {
                providers = providers.with(Google::new(id.clone(), secret.clone(), &self.app_base_url));
            }
            (None, None) => {}
            _ => anyhow::bail!("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set together"),
        }
        if providers.is_empty() {
            log::warn!("no oauth providers configured; sign-in is unavailable");
        }
        Ok(providers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Config {
        let args = ["skullking", "--db-url", "postgres://localhost/sk", "--session-secret", "s3cret"];
        Config::try_parse_from(args.iter().chain(extra)).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.pool, sk_core::POOL_SIZE);
        assert_eq!(config.burst, sk_core::RATE_BURST);
        assert!(config.validate().is_ok());
    }
    #[test]
    fn production_is_secure() {
        assert!(parse(&["--app-env", "production"]).secure());
        assert!(!parse(&["--app-env", "development"]).secure());
    }
    #[test]
    fn google_needs_both_credentials() {
        assert!(parse(&["--google-client-id", "id"]).providers().is_err());
        let both = parse(&["--google-client-id", "id", "--google-client-secret", "secret"]);
        let providers = both.providers().unwrap();
        assert_eq!(providers.names().collect::<Vec<_>>(), ["google"]);
    }
    #[test]
    fn empty_secret_is_rejected() {
        let config = Config::try_parse_from(["skullking", "--db-url", "x", "--session-secret", ""]).unwrap();
        assert!(config.validate().is_err());
    }
}
