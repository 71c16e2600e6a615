use uuid::Uuid;

use crate::{
  entity::{Metered, UsageAction, subscription, usage_log},
  prelude::*,
};

pub struct UsageLog<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> UsageLog<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Records a counter mutation. Runs on the caller's transaction so the
  /// entry commits or rolls back together with the counter.
  pub async fn append<C: ConnectionTrait>(
    conn: &C,
    subscription: &subscription::Model,
    ty: Metered,
    action: UsageAction,
    metadata: Option<&json::Value>,
    now: DateTime,
  ) -> Result<usage_log::Model> {
    let entry = usage_log::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      subscription_id: Set(subscription.id.clone()),
      owner_id: Set(subscription.owner_id.clone()),
      usage_type: Set(ty),
      action: Set(action),
      metadata: Set(metadata.cloned()),
      occurred_at: Set(now),
    };

    Ok(entry.insert(conn).await?)
  }

  /// Newest first.
  pub async fn by_subscription(
    &self,
    subscription_id: &str,
  ) -> Result<Vec<usage_log::Model>> {
    let entries = usage_log::Entity::find()
      .filter(usage_log::Column::SubscriptionId.eq(subscription_id))
      .order_by_desc(usage_log::Column::OccurredAt)
      .all(self.db)
      .await?;
    Ok(entries)
  }
}
