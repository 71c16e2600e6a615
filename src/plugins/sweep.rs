//! Background upkeep: expires overdue subscriptions ahead of their next read
//! and forgets stale bearer tokens.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{plugins::Plugin, prelude::*, state::AppState};

pub struct Sweep;

impl Sweep {
  async fn tick(app: &AppState) {
    match app.sv().quota.expire_overdue().await {
      Ok(0) => debug!("Sweep: nothing overdue"),
      Ok(n) => info!("Sweep: expired {n} overdue subscription(s)"),
      Err(err) => error!("Sweep failed: {err}"),
    }
    app.gc_principals();
  }
}

#[async_trait]
impl Plugin for Sweep {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let mut interval = time::interval(app.config.sweep_interval);
    loop {
      interval.tick().await;
      Self::tick(&app).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entity::Status, state::Config, sv::Plan, testing};

  #[tokio::test]
  async fn tick_expires_overdue() {
    let db = testing::db().await;
    testing::academy(&db).await;

    let quota = crate::sv::Quota::new(&db).with_clock(Clock::Fixed(
      Utc::now().naive_utc() - TimeDelta::days(40),
    ));
    let sub = quota.open("d1", &Plan::new("basic"), 30).await.unwrap();

    let app = AppState::with_db(db, Config::default());
    Sweep::tick(&app).await;

    let usage = app.sv().quota.usage("d1").await;
    assert!(matches!(usage, Err(Error::NoSubscription)));

    let row = crate::entity::subscription::Entity::find_by_id(sub.id)
      .one(&app.db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(row.status, Status::Expired);
  }
}
