use crate::{entity::capability, prelude::*};

pub struct Catalog<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Catalog<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    id: &str,
    name: &str,
  ) -> Result<capability::Model> {
    if self.by_id(id).await?.is_some() {
      return Err(Error::InvalidRequest(format!("`{id}` already exists")));
    }

    let capability = capability::ActiveModel {
      id: Set(id.to_string()),
      name: Set(name.to_string()),
      created_at: Set(Utc::now().naive_utc()),
    };

    let capability = capability.insert(self.db).await?;
    info!("Registered capability `{id}` ({name})");
    Ok(capability)
  }

  pub async fn by_id(&self, id: &str) -> Result<Option<capability::Model>> {
    Ok(capability::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn require(&self, id: &str) -> Result<capability::Model> {
    self.by_id(id).await?.ok_or(Error::NotFound("capability"))
  }

  pub async fn all(&self) -> Result<Vec<capability::Model>> {
    let capabilities = capability::Entity::find()
      .order_by_asc(capability::Column::Name)
      .all(self.db)
      .await?;
    Ok(capabilities)
  }
}
