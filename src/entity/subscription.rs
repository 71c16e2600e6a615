use std::{fmt, str::FromStr};

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;
use crate::error::Error;

#[derive(
  Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Status {
  #[sea_orm(string_value = "active")]
  Active,
  #[sea_orm(string_value = "expired")]
  Expired,
}

/// Quota dimension of a subscription.
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
#[serde(rename_all = "snake_case")]
pub enum Metered {
  #[sea_orm(string_value = "student")]
  Student,
  #[sea_orm(string_value = "teacher")]
  Teacher,
  #[sea_orm(string_value = "homework_check")]
  HomeworkCheck,
  #[sea_orm(string_value = "ai_grading")]
  AiGrading,
  #[sea_orm(string_value = "capability_analysis")]
  CapabilityAnalysis,
  #[sea_orm(string_value = "concept_analysis")]
  ConceptAnalysis,
  #[sea_orm(string_value = "similar_problem")]
  SimilarProblem,
  #[sea_orm(string_value = "landing_page")]
  LandingPage,
}

impl Metered {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Student => "student",
      Self::Teacher => "teacher",
      Self::HomeworkCheck => "homework_check",
      Self::AiGrading => "ai_grading",
      Self::CapabilityAnalysis => "capability_analysis",
      Self::ConceptAnalysis => "concept_analysis",
      Self::SimilarProblem => "similar_problem",
      Self::LandingPage => "landing_page",
    }
  }

  /// `(current, max)` columns backing this dimension.
  pub fn columns(self) -> (Column, Column) {
    match self {
      Self::Student => (Column::CurrentStudents, Column::MaxStudents),
      Self::Teacher => (Column::CurrentTeachers, Column::MaxTeachers),
      Self::HomeworkCheck => {
        (Column::CurrentHomeworkChecks, Column::MaxHomeworkChecks)
      }
      Self::AiGrading => (Column::CurrentAiGrading, Column::MaxAiGrading),
      Self::CapabilityAnalysis => {
        (Column::CurrentCapabilityAnalysis, Column::MaxCapabilityAnalysis)
      }
      Self::ConceptAnalysis => {
        (Column::CurrentConceptAnalysis, Column::MaxConceptAnalysis)
      }
      Self::SimilarProblem => {
        (Column::CurrentSimilarProblems, Column::MaxSimilarProblems)
      }
      Self::LandingPage => {
        (Column::CurrentLandingPages, Column::MaxLandingPages)
      }
    }
  }
}

impl fmt::Display for Metered {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Metered {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "student" => Self::Student,
      "teacher" => Self::Teacher,
      "homework_check" => Self::HomeworkCheck,
      "ai_grading" => Self::AiGrading,
      // older clients still send the pre-split name
      "capability_analysis" | "ai_analysis" => Self::CapabilityAnalysis,
      "concept_analysis" => Self::ConceptAnalysis,
      "similar_problem" => Self::SimilarProblem,
      "landing_page" => Self::LandingPage,
      other => return Err(Error::InvalidType(other.to_string())),
    })
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "subscriptions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  pub owner_id: String,
  pub plan: String,
  pub status: Status,
  pub start_date: DateTime,
  pub end_date: DateTime,
  pub current_students: i32,
  pub max_students: i32,
  pub current_teachers: i32,
  pub max_teachers: i32,
  pub current_homework_checks: i32,
  pub max_homework_checks: i32,
  pub current_ai_grading: i32,
  pub max_ai_grading: i32,
  pub current_capability_analysis: i32,
  pub max_capability_analysis: i32,
  pub current_concept_analysis: i32,
  pub max_concept_analysis: i32,
  pub current_similar_problems: i32,
  pub max_similar_problems: i32,
  pub current_landing_pages: i32,
  pub max_landing_pages: i32,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

impl Model {
  /// Raw `(current, max)` pair for `ty`; `max` may be the unlimited sentinel.
  pub fn counter(&self, ty: Metered) -> (i32, i32) {
    match ty {
      Metered::Student => (self.current_students, self.max_students),
      Metered::Teacher => (self.current_teachers, self.max_teachers),
      Metered::HomeworkCheck => {
        (self.current_homework_checks, self.max_homework_checks)
      }
      Metered::AiGrading => (self.current_ai_grading, self.max_ai_grading),
      Metered::CapabilityAnalysis => {
        (self.current_capability_analysis, self.max_capability_analysis)
      }
      Metered::ConceptAnalysis => {
        (self.current_concept_analysis, self.max_concept_analysis)
      }
      Metered::SimilarProblem => {
        (self.current_similar_problems, self.max_similar_problems)
      }
      Metered::LandingPage => {
        (self.current_landing_pages, self.max_landing_pages)
      }
    }
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::OwnerId",
    to = "user::Column::Id"
  )]
  Owner,
  #[sea_orm(has_many = "super::usage_log::Entity")]
  UsageLogs,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Owner.def()
  }
}

impl Related<super::usage_log::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::UsageLogs.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
