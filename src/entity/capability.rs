//! Grantable AI bots

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "capabilities")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub name: String,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::grant::Entity")]
  Grants,
}

impl Related<super::grant::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Grants.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
