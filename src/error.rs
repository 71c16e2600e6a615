use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::DbErr;

use crate::{entity::Metered, policy::Denied};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Database error: {0}")]
  Database(#[from] DbErr),

  #[error("Invalid or expired token")]
  InvalidToken,

  #[error("{0}")]
  Forbidden(#[from] Denied),

  #[error("{0} not found")]
  NotFound(&'static str),

  #[error("No active subscription")]
  NoSubscription,

  #[error("Subscription expired")]
  SubscriptionExpired,

  #[error("{ty} limit exceeded ({current}/{max})")]
  LimitExceeded { current: i32, max: i32, ty: Metered },

  #[error("Invalid usage type: {0}")]
  InvalidType(String),

  #[error("Invalid request: {0}")]
  InvalidRequest(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  /// Stable key clients localize against.
  pub fn code(&self) -> &'static str {
    match self {
      Error::Database(_) | Error::Internal(_) => "INTERNAL",
      Error::InvalidToken => "UNAUTHORIZED",
      Error::Forbidden(_) => "FORBIDDEN",
      Error::NotFound(_) => "NOT_FOUND",
      Error::NoSubscription => "NO_SUBSCRIPTION",
      Error::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
      Error::LimitExceeded { .. } => "LIMIT_EXCEEDED",
      Error::InvalidType(_) => "INVALID_TYPE",
      Error::InvalidRequest(_) => "INVALID_REQUEST",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::Database(_) | Error::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::InvalidToken => StatusCode::UNAUTHORIZED,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Forbidden(_)
      | Error::NoSubscription
      | Error::SubscriptionExpired
      | Error::LimitExceeded { .. } => StatusCode::FORBIDDEN,
      Error::InvalidType(_) | Error::InvalidRequest(_) => {
        StatusCode::BAD_REQUEST
      }
    }
  }

  /// Lock contention and dropped connections; safe to retry a whole
  /// transaction on these.
  pub fn is_transient(&self) -> bool {
    let Error::Database(err) = self else { return false };

    match err {
      DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
      other => {
        let msg = other.to_string();
        msg.contains("database is locked") || msg.contains("(code: 5)")
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let message = match &self {
      Error::Database(err) => {
        tracing::error!("Database failure: {err}");
        "Database error".to_string()
      }
      Error::Internal(err) => {
        tracing::error!("Internal failure: {err}");
        "Internal error".to_string()
      }
      other => other.to_string(),
    };

    let mut body = json::json!({
      "success": false,
      "code": self.code(),
      "error": message,
    });

    match &self {
      Error::Forbidden(denied) => {
        body["reason"] = denied.code().into();
      }
      Error::LimitExceeded { current, max, ty } => {
        body["current"] = (*current).into();
        body["limit"] = (*max).into();
        body["type"] = ty.as_str().into();
      }
      _ => {}
    }

    (self.status(), Json(body)).into_response()
  }
}

impl From<JsonRejection> for Error {
  fn from(rejection: JsonRejection) -> Self {
    Error::InvalidRequest(rejection.body_text())
  }
}

impl From<QueryRejection> for Error {
  fn from(rejection: QueryRejection) -> Self {
    Error::InvalidRequest(rejection.body_text())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_are_distinct() {
    let errors = [
      Error::InvalidToken,
      Error::Forbidden(Denied::StudentCannotGrant),
      Error::NotFound("grant"),
      Error::NoSubscription,
      Error::SubscriptionExpired,
      Error::LimitExceeded { current: 1, max: 1, ty: Metered::Student },
      Error::InvalidType("x".into()),
      Error::InvalidRequest("x".into()),
      Error::Internal("x".into()),
    ];

    let mut codes: Vec<_> = errors.iter().map(Error::code).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), errors.len());
  }

  #[test]
  fn limit_message_reads_as_fraction() {
    let err = Error::LimitExceeded {
      current: 12,
      max: 12,
      ty: Metered::HomeworkCheck,
    };
    assert_eq!(err.to_string(), "homework_check limit exceeded (12/12)");
  }

  #[test]
  fn only_store_errors_are_transient() {
    assert!(!Error::NoSubscription.is_transient());
    assert!(
      Error::Database(DbErr::Custom("database is locked".into()))
        .is_transient()
    );
    assert!(!Error::Database(DbErr::Custom("syntax".into())).is_transient());
  }
}
