use sea_orm_migration::prelude::*;

use super::m20261001_000004_create_subscriptions::Subscriptions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(UsageLogs::Table)
          .if_not_exists()
          .col(ColumnDef::new(UsageLogs::Id).string().not_null().primary_key())
          .col(ColumnDef::new(UsageLogs::SubscriptionId).string().not_null())
          .col(ColumnDef::new(UsageLogs::OwnerId).string().not_null())
          .col(ColumnDef::new(UsageLogs::UsageType).string().not_null())
          .col(ColumnDef::new(UsageLogs::Action).string().not_null())
          .col(ColumnDef::new(UsageLogs::Metadata).json().null())
          .col(ColumnDef::new(UsageLogs::OccurredAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_usage_logs_subscription")
              .from(UsageLogs::Table, UsageLogs::SubscriptionId)
              .to(Subscriptions::Table, Subscriptions::Id)
              .on_delete(ForeignKeyAction::Restrict),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_usage_logs_subscription")
          .table(UsageLogs::Table)
          .col(UsageLogs::SubscriptionId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(UsageLogs::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum UsageLogs {
  Table,
  Id,
  SubscriptionId,
  OwnerId,
  UsageType,
  Action,
  Metadata,
  OccurredAt,
}
