use sea_orm_migration::prelude::*;

use super::m20261001_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn counter(col: Subscriptions) -> ColumnDef {
  ColumnDef::new(col).integer().not_null().default(0).to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Subscriptions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Subscriptions::Id).string().not_null().primary_key(),
          )
          .col(ColumnDef::new(Subscriptions::OwnerId).string().not_null())
          .col(ColumnDef::new(Subscriptions::Plan).string().not_null())
          .col(
            ColumnDef::new(Subscriptions::Status)
              .string()
              .not_null()
              .default("active"),
          )
          .col(ColumnDef::new(Subscriptions::StartDate).date_time().not_null())
          .col(ColumnDef::new(Subscriptions::EndDate).date_time().not_null())
          .col(counter(Subscriptions::CurrentStudents))
          .col(counter(Subscriptions::MaxStudents))
          .col(counter(Subscriptions::CurrentTeachers))
          .col(counter(Subscriptions::MaxTeachers))
          .col(counter(Subscriptions::CurrentHomeworkChecks))
          .col(counter(Subscriptions::MaxHomeworkChecks))
          .col(counter(Subscriptions::CurrentAiGrading))
          .col(counter(Subscriptions::MaxAiGrading))
          .col(counter(Subscriptions::CurrentCapabilityAnalysis))
          .col(counter(Subscriptions::MaxCapabilityAnalysis))
          .col(counter(Subscriptions::CurrentConceptAnalysis))
          .col(counter(Subscriptions::MaxConceptAnalysis))
          .col(counter(Subscriptions::CurrentSimilarProblems))
          .col(counter(Subscriptions::MaxSimilarProblems))
          .col(counter(Subscriptions::CurrentLandingPages))
          .col(counter(Subscriptions::MaxLandingPages))
          .col(ColumnDef::new(Subscriptions::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Subscriptions::UpdatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_subscriptions_owner")
              .from(Subscriptions::Table, Subscriptions::OwnerId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_subscriptions_owner_status")
          .table(Subscriptions::Table)
          .col(Subscriptions::OwnerId)
          .col(Subscriptions::Status)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Subscriptions {
  Table,
  Id,
  OwnerId,
  Plan,
  Status,
  StartDate,
  EndDate,
  CurrentStudents,
  MaxStudents,
  CurrentTeachers,
  MaxTeachers,
  CurrentHomeworkChecks,
  MaxHomeworkChecks,
  CurrentAiGrading,
  MaxAiGrading,
  CurrentCapabilityAnalysis,
  MaxCapabilityAnalysis,
  CurrentConceptAnalysis,
  MaxConceptAnalysis,
  CurrentSimilarProblems,
  MaxSimilarProblems,
  CurrentLandingPages,
  MaxLandingPages,
  CreatedAt,
  UpdatedAt,
}
