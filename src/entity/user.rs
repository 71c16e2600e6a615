use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Position in the academy hierarchy. Declared top to bottom.
#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
  #[sea_orm(string_value = "SUPER_ADMIN")]
  SuperAdmin,
  #[sea_orm(string_value = "ADMIN")]
  Admin,
  #[sea_orm(string_value = "DIRECTOR")]
  Director,
  #[sea_orm(string_value = "TEACHER")]
  Teacher,
  #[sea_orm(string_value = "STUDENT")]
  Student,
}

impl Role {
  pub fn is_admin(self) -> bool {
    matches!(self, Self::SuperAdmin | Self::Admin)
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub name: String,
  pub role: Role,
  /// Academy the user belongs to, none for platform admins
  pub academy_id: Option<i64>,
  #[serde(skip_serializing)]
  pub token: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::grant::Entity")]
  Grants,
  #[sea_orm(has_many = "super::subscription::Entity")]
  Subscriptions,
}

impl Related<super::grant::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Grants.def()
  }
}

impl Related<super::subscription::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Subscriptions.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
