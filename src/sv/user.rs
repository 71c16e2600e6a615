//! Principal directory backed by the `users` table

use serde::Serialize;

use crate::{
  entity::{Role, user},
  prelude::*,
};

/// The facts about a user the engine decides on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
  pub id: String,
  pub role: Role,
  pub tenant_id: Option<i64>,
}

impl Principal {
  /// Users without an academy never share one.
  pub fn same_tenant(&self, other: &Principal) -> bool {
    self.tenant_id.is_some() && self.tenant_id == other.tenant_id
  }
}

impl From<user::Model> for Principal {
  fn from(user: user::Model) -> Self {
    Self { id: user.id, role: user.role, tenant_id: user.academy_id }
  }
}

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  #[cfg(test)]
  pub async fn create(
    &self,
    id: &str,
    name: &str,
    role: Role,
    academy_id: Option<i64>,
    token: Option<String>,
  ) -> Result<user::Model> {
    let user = user::ActiveModel {
      id: Set(id.to_string()),
      name: Set(name.to_string()),
      role: Set(role),
      academy_id: Set(academy_id),
      token: Set(token),
      created_at: Set(Utc::now().naive_utc()),
    };

    Ok(user.insert(self.db).await?)
  }

  pub async fn by_id(&self, id: &str) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn principal(&self, id: &str) -> Result<Principal> {
    self.by_id(id).await?.map(Principal::from).ok_or(Error::NotFound("user"))
  }

  pub async fn resolve(&self, token: &str) -> Result<Principal> {
    let user = user::Entity::find()
      .filter(user::Column::Token.eq(token))
      .one(self.db)
      .await?
      .ok_or(Error::InvalidToken)?;

    Ok(user.into())
  }
}
