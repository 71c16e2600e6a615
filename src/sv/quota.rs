//! Quota ledger: metered usage against a subscription's limits

use std::str::FromStr;

use sea_orm::{Condition, Iterable, sea_query::Expr};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  entity::{Metered, Status, UsageAction, subscription},
  policy::{Limit, UNLIMITED},
  prelude::*,
  sv,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Check,
  Increment,
  Decrement,
}

impl FromStr for Action {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "check" => Ok(Self::Check),
      "increment" | "use" | "create" => Ok(Self::Increment),
      "decrement" | "delete" => Ok(Self::Decrement),
      other => Err(Error::InvalidRequest(format!("unknown action `{other}`"))),
    }
  }
}

/// Outcome of a [`Quota::meter`] call, also used for usage snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metering {
  #[serde(rename = "type")]
  pub ty: Metered,
  pub action: Action,
  pub allowed: bool,
  pub current: i32,
  pub limit: i32,
  pub unlimited: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub remaining: Option<i32>,
}

impl Metering {
  fn new(
    ty: Metered,
    action: Action,
    current: i32,
    limit: Limit,
    allowed: bool,
  ) -> Self {
    Self {
      ty,
      action,
      allowed,
      current,
      limit: limit.raw(),
      unlimited: limit == Limit::Unlimited,
      remaining: limit.remaining(current),
    }
  }

  fn snapshot(sub: &subscription::Model, ty: Metered) -> Self {
    let (current, max) = sub.counter(ty);
    let limit = Limit::from(max);
    Self::new(ty, Action::Check, current, limit, limit.allows(current))
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
  pub subscription_id: String,
  pub plan: String,
  pub status: Status,
  pub end_date: DateTime,
  pub counters: Vec<Metering>,
}

/// Limits a billing plan grants. Dimensions left out get a limit of zero.
#[derive(Debug, Clone, Default)]
pub struct Plan {
  pub name: String,
  pub limits: HashMap<Metered, i32>,
}

impl Plan {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), limits: HashMap::new() }
  }

  pub fn limit(mut self, ty: Metered, max: i32) -> Self {
    self.limits.insert(ty, max);
    self
  }

  #[cfg(test)]
  pub fn unlimited(self, ty: Metered) -> Self {
    self.limit(ty, UNLIMITED)
  }

  fn max(&self, ty: Metered) -> i32 {
    self.limits.get(&ty).copied().unwrap_or(0)
  }

  /// Limits are either `-1` or non-negative.
  fn validate(&self) -> Result<()> {
    match self.limits.iter().find(|&(_, &max)| max < UNLIMITED) {
      Some((ty, max)) => {
        Err(Error::InvalidRequest(format!("invalid {ty} limit `{max}`")))
      }
      None => Ok(()),
    }
  }
}

pub struct Quota<'a> {
  db: &'a DatabaseConnection,
  clock: Clock,
}

impl<'a> Quota<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db, clock: Clock::System }
  }

  #[cfg(test)]
  pub fn with_clock(self, clock: Clock) -> Self {
    Self { clock, ..self }
  }

  /// Checks or moves one counter of the owner's active subscription. Every
  /// accepted increment/decrement mutates once and logs once.
  pub async fn meter(
    &self,
    owner_id: &str,
    ty: Metered,
    action: Action,
    metadata: Option<&json::Value>,
  ) -> Result<Metering> {
    let metering =
      utils::retry(move || self.meter_once(owner_id, ty, action, metadata))
        .await;

    match &metering {
      Ok(m) => debug!(
        "Metered {ty} {action:?} for {owner_id}: {}/{}",
        m.current, m.limit
      ),
      Err(Error::LimitExceeded { current, max, .. }) => {
        info!("{owner_id} hit {ty} limit ({current}/{max})")
      }
      Err(_) => {}
    }
    metering
  }

  async fn meter_once(
    &self,
    owner_id: &str,
    ty: Metered,
    action: Action,
    metadata: Option<&json::Value>,
  ) -> Result<Metering> {
    let now = self.clock.now();
    let (txn, sub) = self.active(owner_id, now).await?;

    let (current, max) = sub.counter(ty);
    let limit = Limit::from(max);

    match action {
      Action::Check => {
        txn.commit().await?;
        Ok(Metering::snapshot(&sub, ty))
      }
      Action::Increment => {
        if !limit.allows(current) {
          return Err(Error::LimitExceeded { current, max, ty });
        }
        if !Self::bump(&txn, &sub.id, ty, now).await? {
          let (current, max) = Self::reload(&txn, &sub.id).await?.counter(ty);
          return Err(Error::LimitExceeded { current, max, ty });
        }

        sv::UsageLog::append(&txn, &sub, ty, UsageAction::Use, metadata, now)
          .await?;

        let (current, _) = Self::reload(&txn, &sub.id).await?.counter(ty);
        txn.commit().await?;
        Ok(Metering::new(ty, action, current, limit, true))
      }
      Action::Decrement => {
        Self::drain(&txn, &sub.id, ty, now).await?;

        sv::UsageLog::append(
          &txn,
          &sub,
          ty,
          UsageAction::Delete,
          metadata,
          now,
        )
        .await?;

        let (current, _) = Self::reload(&txn, &sub.id).await?.counter(ty);
        txn.commit().await?;
        Ok(Metering::new(ty, action, current, limit, true))
      }
    }
  }

  /// Every counter of the owner's active subscription.
  pub async fn usage(&self, owner_id: &str) -> Result<Usage> {
    let now = self.clock.now();
    let (txn, sub) =
      utils::retry(move || self.active(owner_id, now)).await?;
    txn.commit().await?;

    Ok(Usage {
      counters: Metered::iter()
        .map(|ty| Metering::snapshot(&sub, ty))
        .collect(),
      subscription_id: sub.id,
      plan: sub.plan,
      status: sub.status,
      end_date: sub.end_date,
    })
  }

  /// Starts a fresh subscription for `owner_id`, expiring whichever one was
  /// active before. Counters start at zero.
  pub async fn open(
    &self,
    owner_id: &str,
    plan: &Plan,
    days: i64,
  ) -> Result<subscription::Model> {
    sv::User::new(self.db).principal(owner_id).await?;

    let now = self.clock.now();
    let end_date = TimeDelta::try_days(days)
      .filter(|_| days > 0)
      .and_then(|term| now.checked_add_signed(term))
      .ok_or_else(|| Error::InvalidRequest(format!("invalid days `{days}`")))?;
    plan.validate()?;

    let txn = self.db.begin().await?;

    let replaced = subscription::Entity::update_many()
      .col_expr(subscription::Column::Status, Expr::value(Status::Expired))
      .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
      .filter(subscription::Column::OwnerId.eq(owner_id))
      .filter(subscription::Column::Status.eq(Status::Active))
      .exec(&txn)
      .await?
      .rows_affected;

    let mut row = subscription::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      owner_id: Set(owner_id.to_string()),
      plan: Set(plan.name.clone()),
      status: Set(Status::Active),
      start_date: Set(now),
      end_date: Set(end_date),
      created_at: Set(now),
      updated_at: Set(now),
      ..Default::default()
    };
    for ty in Metered::iter() {
      let (current, max) = ty.columns();
      row.set(current, 0.into());
      row.set(max, plan.max(ty).into());
    }

    let sub = row.insert(&txn).await?;
    txn.commit().await?;

    info!(
      "Opened `{}` subscription for {owner_id} until {} (replaced {replaced})",
      plan.name,
      utils::format_date(end_date)
    );
    Ok(sub)
  }

  /// Expires every active subscription past its end date.
  pub async fn expire_overdue(&self) -> Result<u64> {
    let now = self.clock.now();

    let expired = subscription::Entity::update_many()
      .col_expr(subscription::Column::Status, Expr::value(Status::Expired))
      .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
      .filter(subscription::Column::Status.eq(Status::Active))
      .filter(subscription::Column::EndDate.lt(now))
      .exec(self.db)
      .await?
      .rows_affected;

    Ok(expired)
  }

  /// Opens a transaction on the owner's active subscription. A subscription
  /// found past its end date is flipped to expired and committed before the
  /// error is returned, so no later read sees it as active.
  async fn active(
    &self,
    owner_id: &str,
    now: DateTime,
  ) -> Result<(DatabaseTransaction, subscription::Model)> {
    let txn = self.db.begin().await?;

    let sub = subscription::Entity::find()
      .filter(subscription::Column::OwnerId.eq(owner_id))
      .filter(subscription::Column::Status.eq(Status::Active))
      .order_by_desc(subscription::Column::EndDate)
      .one(&txn)
      .await?
      .ok_or(Error::NoSubscription)?;

    if sub.end_date < now {
      subscription::Entity::update_many()
        .col_expr(subscription::Column::Status, Expr::value(Status::Expired))
        .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
        .filter(subscription::Column::Id.eq(&sub.id))
        .filter(subscription::Column::Status.eq(Status::Active))
        .exec(&txn)
        .await?;
      txn.commit().await?;

      info!(
        "Subscription {} of {owner_id} expired at {}",
        sub.id,
        utils::format_date(sub.end_date)
      );
      return Err(Error::SubscriptionExpired);
    }

    Ok((txn, sub))
  }

  /// `current += 1` guarded in SQL by the limit, so two racing increments
  /// cannot both pass. False when the guard rejected the update.
  async fn bump(
    txn: &DatabaseTransaction,
    id: &str,
    ty: Metered,
    now: DateTime,
  ) -> Result<bool> {
    let (current, max) = ty.columns();

    let updated = subscription::Entity::update_many()
      .col_expr(current, Expr::col(current).add(1))
      .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
      .filter(subscription::Column::Id.eq(id))
      .filter(
        Condition::any()
          .add(max.eq(UNLIMITED))
          .add(Expr::col(current).lt(Expr::col(max))),
      )
      .exec(txn)
      .await?;

    Ok(updated.rows_affected == 1)
  }

  /// `current = max(0, current - 1)`.
  async fn drain(
    txn: &DatabaseTransaction,
    id: &str,
    ty: Metered,
    now: DateTime,
  ) -> Result<()> {
    let (current, _) = ty.columns();

    subscription::Entity::update_many()
      .col_expr(current, Expr::col(current).sub(1))
      .col_expr(subscription::Column::UpdatedAt, Expr::value(now))
      .filter(subscription::Column::Id.eq(id))
      .filter(current.gt(0))
      .exec(txn)
      .await?;

    Ok(())
  }

  async fn reload(
    txn: &DatabaseTransaction,
    id: &str,
  ) -> Result<subscription::Model> {
    subscription::Entity::find_by_id(id)
      .one(txn)
      .await?
      .ok_or(Error::NoSubscription)
  }
}
