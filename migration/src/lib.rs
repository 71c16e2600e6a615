pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_users;
mod m20261001_000002_create_capabilities;
mod m20261001_000003_create_entitlement_grants;
mod m20261001_000004_create_subscriptions;
mod m20261001_000005_create_usage_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20261001_000001_create_users::Migration),
      Box::new(m20261001_000002_create_capabilities::Migration),
      Box::new(m20261001_000003_create_entitlement_grants::Migration),
      Box::new(m20261001_000004_create_subscriptions::Migration),
      Box::new(m20261001_000005_create_usage_logs::Migration),
    ]
  }
}
