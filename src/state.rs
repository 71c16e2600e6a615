use std::env;

use tokio::time::Instant;

use crate::{
  prelude::*,
  sv::{self, Principal},
};

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub port: u16,
  /// Period of the overdue-subscription sweep
  pub sweep_interval: Duration,
  /// How long a resolved token is trusted without hitting the database
  pub token_ttl: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: String::from("sqlite:academy.db?mode=rwc"),
      port: 3000,
      sweep_interval: Duration::from_secs(10 * 60),
      token_ttl: Duration::from_secs(5 * 60),
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_vars(|key| env::var(key).ok())
  }

  pub fn from_vars(
    var: impl Fn(&str) -> Option<String>,
  ) -> anyhow::Result<Self> {
    let mut config = Self::default();

    if let Some(url) = var("DATABASE_URL") {
      config.database_url = url;
    }
    if let Some(port) = var("PORT") {
      config.port = port.parse().context("PORT must be a port number")?;
    }
    if let Some(every) = var("SWEEP_INTERVAL") {
      config.sweep_interval = humantime::parse_duration(&every)
        .context("SWEEP_INTERVAL must look like `10m`")?;
    }
    if let Some(ttl) = var("TOKEN_CACHE_TTL") {
      config.token_ttl = humantime::parse_duration(&ttl)
        .context("TOKEN_CACHE_TTL must look like `5m`")?;
    }

    Ok(config)
  }
}

#[derive(Debug, Clone)]
struct Cached {
  principal: Principal,
  resolved_at: Instant,
}

pub struct Services<'a> {
  pub user: sv::User<'a>,
  pub catalog: sv::Catalog<'a>,
  pub grants: sv::Grants<'a>,
  pub quota: sv::Quota<'a>,
  pub usage_log: sv::UsageLog<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub config: Config,
  principals: DashMap<String, Cached>,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
      .await
      .context("Failed to connect to database")?;

    info!("Running migrations...");
    migration::Migrator::up(&db, None)
      .await
      .context("Failed to run migrations")?;

    Ok(Self::with_db(db, config))
  }

  pub fn with_db(db: DatabaseConnection, config: Config) -> Self {
    Self { db, config, principals: DashMap::new() }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      user: sv::User::new(&self.db),
      catalog: sv::Catalog::new(&self.db),
      grants: sv::Grants::new(&self.db),
      quota: sv::Quota::new(&self.db),
      usage_log: sv::UsageLog::new(&self.db),
    }
  }

  /// Bearer token to principal, served from cache while fresh.
  pub async fn resolve(&self, token: &str) -> Result<Principal> {
    if let Some(cached) = self.principals.get(token)
      && cached.resolved_at.elapsed() < self.config.token_ttl
    {
      return Ok(cached.principal.clone());
    }

    let principal = self.sv().user.resolve(token).await?;
    self.principals.insert(
      token.to_string(),
      Cached { principal: principal.clone(), resolved_at: Instant::now() },
    );
    Ok(principal)
  }

  pub fn gc_principals(&self) {
    let ttl = self.config.token_ttl;
    self.principals.retain(|_, cached| cached.resolved_at.elapsed() < ttl);
  }

  #[cfg(test)]
  pub fn cached_principals(&self) -> usize {
    self.principals.len()
  }
}
