use sea_orm_migration::prelude::*;

use super::{
  m20261001_000001_create_users::Users,
  m20261001_000002_create_capabilities::Capabilities,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(EntitlementGrants::Table)
          .if_not_exists()
          .col(ColumnDef::new(EntitlementGrants::GranteeId).string().not_null())
          .col(
            ColumnDef::new(EntitlementGrants::CapabilityId).string().not_null(),
          )
          .col(ColumnDef::new(EntitlementGrants::GrantorId).string().not_null())
          .col(
            ColumnDef::new(EntitlementGrants::GrantorRole).string().not_null(),
          )
          .col(
            ColumnDef::new(EntitlementGrants::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(ColumnDef::new(EntitlementGrants::ExpiresAt).date_time().null())
          .col(
            ColumnDef::new(EntitlementGrants::GrantedAt).date_time().not_null(),
          )
          .col(
            ColumnDef::new(EntitlementGrants::UpdatedAt).date_time().not_null(),
          )
          .primary_key(
            Index::create()
              .col(EntitlementGrants::GranteeId)
              .col(EntitlementGrants::CapabilityId),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_entitlement_grants_grantee")
              .from(EntitlementGrants::Table, EntitlementGrants::GranteeId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_entitlement_grants_capability")
              .from(EntitlementGrants::Table, EntitlementGrants::CapabilityId)
              .to(Capabilities::Table, Capabilities::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_entitlement_grants_grantor")
          .table(EntitlementGrants::Table)
          .col(EntitlementGrants::GrantorId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(EntitlementGrants::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum EntitlementGrants {
  Table,
  GranteeId,
  CapabilityId,
  GrantorId,
  GrantorRole,
  IsActive,
  ExpiresAt,
  GrantedAt,
  UpdatedAt,
}
