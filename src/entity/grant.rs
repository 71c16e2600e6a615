use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Role, capability, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entitlement_grants")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub grantee_id: String,
  #[sea_orm(primary_key, auto_increment = false)]
  pub capability_id: String,
  pub grantor_id: String,
  pub grantor_role: Role,
  pub is_active: bool,
  /// `None` never expires
  pub expires_at: Option<DateTime>,
  pub granted_at: DateTime,
  pub updated_at: DateTime,
}

impl Model {
  pub fn is_effective(&self, now: DateTime) -> bool {
    self.is_active && self.expires_at.is_none_or(|at| at > now)
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::GranteeId",
    to = "user::Column::Id"
  )]
  Grantee,
  #[sea_orm(
    belongs_to = "capability::Entity",
    from = "Column::CapabilityId",
    to = "capability::Column::Id"
  )]
  Capability,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Grantee.def()
  }
}

impl Related<capability::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Capability.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
