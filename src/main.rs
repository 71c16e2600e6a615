//! Academy entitlement & quota engine
//!
//! - SeaORM over SQLite for grants, subscriptions and the usage log
//! - Axum for the HTTP API, rate limited per peer
//! - A background sweep expiring overdue subscriptions

mod entity;
mod error;
mod plugins;
mod policy;
mod prelude;
mod state;
mod sv;
#[cfg(test)]
mod testing;
mod utils;

use std::sync::Arc;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  plugins::{App, server::Server, sweep::Sweep},
  prelude::*,
  state::{AppState, Config},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "academy_quota=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  info!("Starting academy quota engine v{}", env!("CARGO_PKG_VERSION"));

  let config = Config::from_env()?;
  let app = Arc::new(AppState::new(config).await?);

  App::new().register(Server).register(Sweep).run(app).await;

  tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
  info!("Shutting down");
  Ok(())
}
