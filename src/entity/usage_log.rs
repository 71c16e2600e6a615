//! Append-only audit trail of quota mutations

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Metered, subscription};

#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum UsageAction {
  #[sea_orm(string_value = "use")]
  Use,
  #[sea_orm(string_value = "delete")]
  Delete,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "usage_logs")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub subscription_id: String,
  pub owner_id: String,
  pub usage_type: Metered,
  pub action: UsageAction,
  pub metadata: Option<Json>,
  pub occurred_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "subscription::Entity",
    from = "Column::SubscriptionId",
    to = "subscription::Column::Id"
  )]
  Subscription,
}

impl Related<subscription::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Subscription.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
